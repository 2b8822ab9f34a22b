//! Composite layers that chain primitives which commonly appear together.
//!
//! Each composite keeps the caches of its parts and runs their backward passes
//! in reverse order.

use ndarray::{
    Array, Array1, Array2, Array4, ArrayView, ArrayView1, ArrayView2, ArrayView4, Dimension, Ix2,
    Ix4,
};

use super::affine::{affine_backward, affine_forward, AffineCache};
use super::batch_norm::{batchnorm_backward, batchnorm_forward, BatchNormCache};
use super::conv::{conv_backward_naive, conv_forward_naive, ConvCache};
use super::pooling::{max_pool_backward_naive, max_pool_forward_naive, PoolCache};
use crate::activations::{relu_backward, relu_forward, ReluCache};
use crate::error::{LayerError, Result};
use crate::params::{BatchNormParam, ConvParam, PoolParam};

/// Cache of [`affine_relu_forward`].
#[derive(Clone, Debug)]
pub struct AffineReluCache<D: Dimension> {
    affine: AffineCache<D>,
    relu: ReluCache<Ix2>,
}

/// Affine transform followed by a ReLU.
pub fn affine_relu_forward<D: Dimension>(
    x: ArrayView<f64, D>,
    w: ArrayView2<f64>,
    b: ArrayView1<f64>,
) -> Result<(Array2<f64>, AffineReluCache<D>)> {
    let (a, affine) = affine_forward(x, w, b)?;
    let (out, relu) = relu_forward(a.view());
    Ok((out, AffineReluCache { affine, relu }))
}

pub fn affine_relu_backward<D: Dimension>(
    dout: ArrayView2<f64>,
    cache: &AffineReluCache<D>,
) -> Result<(Array<f64, D>, Array2<f64>, Array1<f64>)> {
    let da = relu_backward(dout, &cache.relu)?;
    affine_backward(da.view(), &cache.affine)
}

/// Cache of [`affine_batchnorm_relu_forward`].
#[derive(Clone, Debug)]
pub struct AffineBatchNormReluCache<D: Dimension> {
    affine: AffineCache<D>,
    norm: Option<BatchNormCache>,
    relu: ReluCache<Ix2>,
}

/// Affine transform, batch normalization, then ReLU.
///
/// In test mode the batch-norm step produces no cache and the composite
/// cannot be differentiated.
pub fn affine_batchnorm_relu_forward<D: Dimension>(
    x: ArrayView<f64, D>,
    w: ArrayView2<f64>,
    b: ArrayView1<f64>,
    gamma: ArrayView1<f64>,
    beta: ArrayView1<f64>,
    bn_param: &mut BatchNormParam,
) -> Result<(Array2<f64>, AffineBatchNormReluCache<D>)> {
    let (a, affine) = affine_forward(x, w, b)?;
    let (normed, norm) = batchnorm_forward(a.view(), gamma, beta, bn_param)?;
    let (out, relu) = relu_forward(normed.view());
    Ok((out, AffineBatchNormReluCache { affine, norm, relu }))
}

/// Returns `(dx, dw, db, dgamma, dbeta)`.
pub fn affine_batchnorm_relu_backward<D: Dimension>(
    dout: ArrayView2<f64>,
    cache: &AffineBatchNormReluCache<D>,
) -> Result<(Array<f64, D>, Array2<f64>, Array1<f64>, Array1<f64>, Array1<f64>)> {
    let norm = cache.norm.as_ref().ok_or_else(|| {
        LayerError::invalid_parameter("mode", "backward pass requires a training-mode forward pass")
    })?;
    let dnormed = relu_backward(dout, &cache.relu)?;
    let (da, dgamma, dbeta) = batchnorm_backward(dnormed.view(), norm)?;
    let (dx, dw, db) = affine_backward(da.view(), &cache.affine)?;
    Ok((dx, dw, db, dgamma, dbeta))
}

/// Cache of [`conv_relu_forward`].
#[derive(Clone, Debug)]
pub struct ConvReluCache {
    conv: ConvCache,
    relu: ReluCache<Ix4>,
}

/// Convolution followed by a ReLU.
pub fn conv_relu_forward(
    x: ArrayView4<f64>,
    w: ArrayView4<f64>,
    b: ArrayView1<f64>,
    conv_param: &ConvParam,
) -> Result<(Array4<f64>, ConvReluCache)> {
    let (a, conv) = conv_forward_naive(x, w, b, conv_param)?;
    let (out, relu) = relu_forward(a.view());
    Ok((out, ConvReluCache { conv, relu }))
}

pub fn conv_relu_backward(
    dout: ArrayView4<f64>,
    cache: &ConvReluCache,
) -> Result<(Array4<f64>, Array4<f64>, Array1<f64>)> {
    let da = relu_backward(dout, &cache.relu)?;
    conv_backward_naive(da.view(), &cache.conv)
}

/// Cache of [`conv_relu_pool_forward`].
#[derive(Clone, Debug)]
pub struct ConvReluPoolCache {
    conv: ConvCache,
    relu: ReluCache<Ix4>,
    pool: PoolCache,
}

/// Convolution, ReLU, then max pooling.
pub fn conv_relu_pool_forward(
    x: ArrayView4<f64>,
    w: ArrayView4<f64>,
    b: ArrayView1<f64>,
    conv_param: &ConvParam,
    pool_param: &PoolParam,
) -> Result<(Array4<f64>, ConvReluPoolCache)> {
    let (a, conv) = conv_forward_naive(x, w, b, conv_param)?;
    let (s, relu) = relu_forward(a.view());
    let (out, pool) = max_pool_forward_naive(s.view(), pool_param)?;
    Ok((out, ConvReluPoolCache { conv, relu, pool }))
}

pub fn conv_relu_pool_backward(
    dout: ArrayView4<f64>,
    cache: &ConvReluPoolCache,
) -> Result<(Array4<f64>, Array4<f64>, Array1<f64>)> {
    let ds = max_pool_backward_naive(dout, &cache.pool)?;
    let da = relu_backward(ds.view(), &cache.relu)?;
    conv_backward_naive(da.view(), &cache.conv)
}
