//! Statistics and chain-rule steps shared by batch and layer normalization.
//!
//! Both layers compute `x̂ = (x - μ) / sqrt(σ² + eps)` on a 2-D input and
//! differ only in the axis the moments are taken along: axis 0 (across the
//! batch) for batch norm, axis 1 (across features) for layer norm. The scale
//! and shift are always per feature.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{ensure_shape, LayerError, Result};

/// Biased moments of `x` along `axis` and the normalized input.
pub(crate) struct Moments {
    pub mean: Array1<f64>,
    pub var: Array1<f64>,
    pub x_hat: Array2<f64>,
}

pub(crate) fn moments(x: ArrayView2<f64>, axis: Axis, eps: f64) -> Result<Moments> {
    if x.len_of(axis) == 0 {
        return Err(LayerError::dimension_mismatch(
            format!("at least one element along axis {}", axis.index()),
            format!("input of shape {:?}", x.shape()),
        ));
    }
    let mean = x
        .mean_axis(axis)
        .ok_or_else(|| LayerError::NumericalError("mean of an empty axis".to_string()))?;
    let var = x.var_axis(axis, 0.0);
    let x_hat = normalize(x, mean.view(), var.view(), axis, eps);
    Ok(Moments { mean, var, x_hat })
}

/// `(x - mean) / sqrt(var + eps)` with the statistics broadcast along `axis`.
pub(crate) fn normalize(
    x: ArrayView2<f64>,
    mean: ArrayView1<f64>,
    var: ArrayView1<f64>,
    axis: Axis,
    eps: f64,
) -> Array2<f64> {
    let std = var.mapv(|v| (v + eps).sqrt());
    (&x - &mean.insert_axis(axis)) / &std.insert_axis(axis)
}

/// `gamma * x̂ + beta` with per-feature parameters.
pub(crate) fn scale_shift(
    x_hat: &Array2<f64>,
    gamma: ArrayView1<f64>,
    beta: ArrayView1<f64>,
) -> Array2<f64> {
    x_hat * &gamma.insert_axis(Axis(0)) + &beta.insert_axis(Axis(0))
}

pub(crate) fn check_affine_params(
    num_features: usize,
    gamma: ArrayView1<f64>,
    beta: ArrayView1<f64>,
) -> Result<()> {
    ensure_shape(&[num_features], gamma.shape())?;
    ensure_shape(&[num_features], beta.shape())
}

/// Forward-pass values needed by the backward pass.
pub(crate) struct NormState<'a> {
    pub x: &'a Array2<f64>,
    pub mean: &'a Array1<f64>,
    pub var: &'a Array1<f64>,
    pub eps: f64,
    pub x_hat: &'a Array2<f64>,
    pub gamma: &'a Array1<f64>,
}

/// `(dgamma, dbeta)`, always reduced over the batch axis.
pub(crate) fn param_grads(
    dout: ArrayView2<f64>,
    x_hat: &Array2<f64>,
) -> (Array1<f64>, Array1<f64>) {
    let dgamma = (&dout * x_hat).sum_axis(Axis(0));
    let dbeta = dout.sum_axis(Axis(0));
    (dgamma, dbeta)
}

/// Step-by-step backprop through the normalization graph.
///
/// Walks the nodes in reverse: scale, normalization, variance, mean. The
/// reduction count `m` enters twice, once through the mean's fan-out and
/// once through the variance's.
pub(crate) fn graph_backward(
    dout: ArrayView2<f64>,
    state: &NormState<'_>,
    axis: Axis,
) -> Array2<f64> {
    let m = state.x.len_of(axis) as f64;
    let std = state.var.mapv(|v| (v + state.eps).sqrt());
    let std_b = std.view().insert_axis(axis);

    let dx_hat = &dout * &state.gamma.view().insert_axis(Axis(0));
    let centered = state.x - &state.mean.view().insert_axis(axis);

    let dvar = (&centered * &dx_hat).sum_axis(axis) * &std.mapv(|s| -0.5 / s.powi(3));
    let dmean = -dx_hat.sum_axis(axis) / &std
        + &dvar * &centered.mapv(|c| -2.0 * c).sum_axis(axis) / m;

    &dx_hat / &std_b
        + &(dmean.insert_axis(axis) / m)
        + &(&dvar.insert_axis(axis) * &centered * 2.0 / m)
}

/// Closed form of [`graph_backward`]:
/// `dx = gamma / (m·std) · (m·dout - Σdout - x̂·Σ(dout·x̂))`.
///
/// Only valid when the reduction runs across the batch axis, where the
/// per-feature `gamma` is constant along the reduction.
pub(crate) fn closed_form_backward(
    dout: ArrayView2<f64>,
    state: &NormState<'_>,
    dgamma: &Array1<f64>,
    dbeta: &Array1<f64>,
) -> Array2<f64> {
    let m = state.x.nrows() as f64;
    let coeff = state.gamma / &state.var.mapv(|v| m * (v + state.eps).sqrt());

    let centered_grad = &dout * m
        - &dbeta.view().insert_axis(Axis(0))
        - &(state.x_hat * &dgamma.view().insert_axis(Axis(0)));
    centered_grad * &coeff.insert_axis(Axis(0))
}
