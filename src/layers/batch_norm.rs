//! Batch Normalization
//!
//! Normalizes each feature across the batch to zero mean and unit variance,
//! then scales and shifts with the learnable `gamma` and `beta`.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

use super::normalization::{self, NormState};
use crate::error::{ensure_shape, Result};
use crate::params::{BatchNormParam, Mode};

/// Values saved by a training-mode [`batchnorm_forward`].
#[derive(Clone, Debug)]
pub struct BatchNormCache {
    x: Array2<f64>,
    mean: Array1<f64>,
    var: Array1<f64>,
    eps: f64,
    x_hat: Array2<f64>,
    gamma: Array1<f64>,
    beta: Array1<f64>,
}

impl BatchNormCache {
    /// Normalized input before scale and shift
    pub fn normalized(&self) -> &Array2<f64> {
        &self.x_hat
    }

    /// Per-feature batch mean
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Per-feature biased batch variance
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

/// Current running statistics of `bn_param`, zeros on first use.
fn running_stats(
    bn_param: &BatchNormParam,
    num_features: usize,
) -> Result<(Array1<f64>, Array1<f64>)> {
    let running_mean = match &bn_param.running_mean {
        Some(mean) => mean.clone(),
        None => {
            log::warn!(
                "batchnorm: initializing running_mean with zeros for {} features",
                num_features
            );
            Array1::zeros(num_features)
        }
    };
    let running_var = match &bn_param.running_var {
        Some(var) => var.clone(),
        None => {
            log::warn!(
                "batchnorm: initializing running_var with zeros for {} features",
                num_features
            );
            Array1::zeros(num_features)
        }
    };
    ensure_shape(&[num_features], running_mean.shape())?;
    ensure_shape(&[num_features], running_var.shape())?;
    Ok((running_mean, running_var))
}

/// Forward pass for batch normalization on an (N, D) input.
///
/// In [`Mode::Train`] the batch mean and biased variance are used and the
/// running statistics are blended in with `momentum`; the returned cache feeds
/// [`batchnorm_backward`]. In [`Mode::Test`] the running statistics normalize
/// the input and no cache is produced. Running statistics are written back to
/// `bn_param` in both modes.
pub fn batchnorm_forward(
    x: ArrayView2<f64>,
    gamma: ArrayView1<f64>,
    beta: ArrayView1<f64>,
    bn_param: &mut BatchNormParam,
) -> Result<(Array2<f64>, Option<BatchNormCache>)> {
    let num_features = x.ncols();
    normalization::check_affine_params(num_features, gamma, beta)?;

    let eps = bn_param.eps;
    let momentum = bn_param.momentum;
    let (running_mean, running_var) = running_stats(bn_param, num_features)?;

    let (out, cache, running_mean, running_var) = match bn_param.mode {
        Mode::Train => {
            let moments = normalization::moments(x, Axis(0), eps)?;
            let out = normalization::scale_shift(&moments.x_hat, gamma, beta);

            let running_mean = running_mean * momentum + &moments.mean * (1.0 - momentum);
            let running_var = running_var * momentum + &moments.var * (1.0 - momentum);
            log::debug!(
                "batchnorm: updated running statistics over {} samples (momentum {})",
                x.nrows(),
                momentum
            );

            let cache = BatchNormCache {
                x: x.to_owned(),
                mean: moments.mean,
                var: moments.var,
                eps,
                x_hat: moments.x_hat,
                gamma: gamma.to_owned(),
                beta: beta.to_owned(),
            };
            (out, Some(cache), running_mean, running_var)
        }
        Mode::Test => {
            let x_hat =
                normalization::normalize(x, running_mean.view(), running_var.view(), Axis(0), eps);
            let out = normalization::scale_shift(&x_hat, gamma, beta);
            (out, None, running_mean, running_var)
        }
    };

    bn_param.running_mean = Some(running_mean);
    bn_param.running_var = Some(running_var);

    Ok((out, cache))
}

/// Backward pass for batch normalization, following the computation graph
/// node by node. Returns `(dx, dgamma, dbeta)`.
pub fn batchnorm_backward(
    dout: ArrayView2<f64>,
    cache: &BatchNormCache,
) -> Result<(Array2<f64>, Array1<f64>, Array1<f64>)> {
    ensure_shape(cache.x.shape(), dout.shape())?;

    let (dgamma, dbeta) = normalization::param_grads(dout, &cache.x_hat);
    let dx = normalization::graph_backward(dout, &cache.state(), Axis(0));
    Ok((dx, dgamma, dbeta))
}

/// Backward pass for batch normalization using the simplified closed form
/// for `dx`. Agrees with [`batchnorm_backward`] up to rounding.
pub fn batchnorm_backward_alt(
    dout: ArrayView2<f64>,
    cache: &BatchNormCache,
) -> Result<(Array2<f64>, Array1<f64>, Array1<f64>)> {
    ensure_shape(cache.x.shape(), dout.shape())?;

    let (dgamma, dbeta) = normalization::param_grads(dout, &cache.x_hat);
    let dx = normalization::closed_form_backward(dout, &cache.state(), &dgamma, &dbeta);
    Ok((dx, dgamma, dbeta))
}
