//! # Minerva - Hand-Derived Neural Network Layer Primitives
//!
//! Minerva provides the forward and backward passes of the building blocks of
//! feed-forward and convolutional networks. Every gradient is derived by hand;
//! there is no autodiff. Assembling layers into a model, the training loop and
//! the optimizer are left to the caller.
//!
//! ## Key Features
//!
//! - **Affine & ReLU**: dense transform on inputs of any rank, rectified linear unit
//! - **Normalization**: batch norm (with two backward variants), layer norm,
//!   spatial batch norm and spatial group norm
//! - **Dropout**: inverted dropout with an optional seed
//! - **Spatial**: naive convolution and max pooling
//! - **Losses**: multiclass SVM and softmax cross-entropy
//! - **Gradient checking**: central-difference estimates to validate backward passes
//!
//! ## Quick Start
//!
//! ```rust
//! use minerva::layers::{affine_forward, affine_backward};
//! use minerva::activations::{relu_forward, relu_backward};
//! use minerva::loss::softmax_loss;
//! use ndarray::array;
//!
//! let x = array![[1.0, 2.0], [-1.0, 0.5]];
//! let w = array![[0.1, -0.2, 0.3], [0.4, 0.0, -0.1]];
//! let b = array![0.0, 0.1, 0.0];
//! let y = array![2usize, 0];
//!
//! let (a, affine_cache) = affine_forward(x.view(), w.view(), b.view()).unwrap();
//! let (scores, relu_cache) = relu_forward(a.view());
//! let (loss, dscores) = softmax_loss(scores.view(), y.view()).unwrap();
//!
//! let da = relu_backward(dscores.view(), &relu_cache).unwrap();
//! let (dx, dw, db) = affine_backward(da.view(), &affine_cache).unwrap();
//! assert!(loss > 0.0);
//! assert_eq!(dx.dim(), x.dim());
//! assert_eq!(dw.dim(), w.dim());
//! assert_eq!(db.len(), 3);
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - ReLU forward/backward
//! - [`debug`] - Gradient checking and numerical sanity checks
//! - [`error`] - Error types and result handling
//! - [`layers`] - Affine, normalization, dropout, convolution and pooling layers
//! - [`loss`] - Classification losses
//! - [`params`] - Hyperparameter records and batch-norm running statistics

pub mod activations;
pub mod debug;
pub mod error;
pub mod layers;
pub mod loss;
pub mod params;

pub use error::{LayerError, Result};
pub use params::{BatchNormParam, ConvParam, DropoutParam, Mode, NormParam, PoolParam};

#[cfg(test)]
mod tests;
