//! # Activation Functions Module
//!
//! Elementwise nonlinearities with their paired backward passes.
//!
//! ## Usage Example
//!
//! ```rust
//! use minerva::activations::{relu_forward, relu_backward};
//! use ndarray::array;
//!
//! let x = array![[1.0, -0.5], [0.0, 2.0]];
//! let (out, cache) = relu_forward(x.view());
//! assert_eq!(out, array![[1.0, 0.0], [0.0, 2.0]]);
//!
//! let dx = relu_backward(array![[1.0, 1.0], [1.0, 1.0]].view(), &cache).unwrap();
//! // The gradient passes through at exactly zero
//! assert_eq!(dx, array![[1.0, 0.0], [1.0, 1.0]]);
//! ```

pub mod relu;

pub use relu::{relu_backward, relu_forward, ReluCache};
