//! Layer Normalization
//!
//! Same transform as batch normalization, but the statistics of each example
//! are taken across its own features. There is no train/test distinction and
//! no running statistics.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::normalization::{self, NormState};
use crate::error::{ensure_shape, Result};
use crate::params::NormParam;

/// Values saved by [`layernorm_forward`]; `mean` and `var` are per example.
#[derive(Clone, Debug)]
pub struct LayerNormCache {
    x: Array2<f64>,
    mean: Array1<f64>,
    var: Array1<f64>,
    eps: f64,
    x_hat: Array2<f64>,
    gamma: Array1<f64>,
    beta: Array1<f64>,
}

impl LayerNormCache {
    pub fn normalized(&self) -> &Array2<f64> {
        &self.x_hat
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn var(&self) -> &Array1<f64> {
        &self.var
    }

    pub fn beta(&self) -> &Array1<f64> {
        &self.beta
    }

    fn state(&self) -> NormState<'_> {
        NormState {
            x: &self.x,
            mean: &self.mean,
            var: &self.var,
            eps: self.eps,
            x_hat: &self.x_hat,
            gamma: &self.gamma,
        }
    }
}

/// Forward pass for layer normalization on an (N, D) input.
pub fn layernorm_forward(
    x: ArrayView2<f64>,
    gamma: ArrayView1<f64>,
    beta: ArrayView1<f64>,
    ln_param: &NormParam,
) -> Result<(Array2<f64>, LayerNormCache)> {
    normalization::check_affine_params(x.ncols(), gamma, beta)?;

    let moments = normalization::moments(x, Axis(1), ln_param.eps)?;
    let out = normalization::scale_shift(&moments.x_hat, gamma, beta);

    let cache = LayerNormCache {
        x: x.to_owned(),
        mean: moments.mean,
        var: moments.var,
        eps: ln_param.eps,
        x_hat: moments.x_hat,
        gamma: gamma.to_owned(),
        beta: beta.to_owned(),
    };
    Ok((out, cache))
}

/// Backward pass for layer normalization. Returns `(dx, dgamma, dbeta)`.
///
/// The chain rule runs along the feature axis and divides by D; `dgamma` and
/// `dbeta` are still summed over the batch.
pub fn layernorm_backward(
    dout: ArrayView2<f64>,
    cache: &LayerNormCache,
) -> Result<(Array2<f64>, Array1<f64>, Array1<f64>)> {
    ensure_shape(cache.x.shape(), dout.shape())?;

    let (dgamma, dbeta) = normalization::param_grads(dout, &cache.x_hat);
    let dx = normalization::graph_backward(dout, &cache.state(), Axis(1));
    Ok((dx, dgamma, dbeta))
}
