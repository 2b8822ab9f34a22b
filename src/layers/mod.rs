//! Layer primitives.
//!
//! Every layer is a pair of free functions: a forward pass returning
//! `(output, cache)` and a backward pass that takes the upstream gradient and
//! the cache of the matching forward call. Caches are dedicated types per
//! layer, so a backward pass can only receive what its own forward produced.

pub mod affine;
pub mod batch_norm;
pub mod conv;
pub mod dropout;
pub mod layer_norm;
mod normalization;
pub mod pooling;
pub mod sandwich;
pub mod spatial_norm;

pub use affine::{affine_backward, affine_forward, AffineCache};
pub use batch_norm::{batchnorm_backward, batchnorm_backward_alt, batchnorm_forward, BatchNormCache};
pub use conv::{conv_backward_naive, conv_forward_naive, ConvCache};
pub use dropout::{dropout_backward, dropout_forward, dropout_forward_with_rng, DropoutCache};
pub use layer_norm::{layernorm_backward, layernorm_forward, LayerNormCache};
pub use pooling::{max_pool_backward_naive, max_pool_forward_naive, PoolCache};
pub use sandwich::{
    affine_batchnorm_relu_backward, affine_batchnorm_relu_forward, affine_relu_backward,
    affine_relu_forward, conv_relu_backward, conv_relu_forward, conv_relu_pool_backward,
    conv_relu_pool_forward, AffineBatchNormReluCache, AffineReluCache, ConvReluCache,
    ConvReluPoolCache,
};
pub use spatial_norm::{
    spatial_batchnorm_backward, spatial_batchnorm_forward, spatial_groupnorm_backward,
    spatial_groupnorm_forward, GroupNormCache, SpatialBatchNormCache,
};
