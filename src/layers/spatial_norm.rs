//! Spatial batch and group normalization for (N, C, H, W) inputs.
//!
//! Neither layer carries its own gradient formulas. Both reshape the input to
//! the 2-D case, call the vanilla batch or layer normalization, and reshape the
//! results back.

use ndarray::{Array1, Array2, Array4, ArrayView1, ArrayView4, Axis};

use super::batch_norm::{batchnorm_backward, batchnorm_forward, BatchNormCache};
use super::layer_norm::{layernorm_backward, layernorm_forward, LayerNormCache};
use crate::error::{ensure_shape, LayerError, Result};
use crate::params::{BatchNormParam, NormParam};

type Dim4 = (usize, usize, usize, usize);

/// (N, C, H, W) -> (N·H·W, C): one row per spatial position, one column per channel.
fn channels_last_rows(x: ArrayView4<f64>) -> Result<Array2<f64>> {
    let (n, c, h, w) = x.dim();
    let channels_last = x.permuted_axes([0, 2, 3, 1]);
    Ok(channels_last.as_standard_layout().into_owned().into_shape((n * h * w, c))?)
}

/// Inverse of [`channels_last_rows`].
fn channels_first(rows: Array2<f64>, (n, c, h, w): Dim4) -> Result<Array4<f64>> {
    let channels_last = rows.as_standard_layout().into_owned().into_shape((n, h, w, c))?;
    Ok(channels_last.permuted_axes([0, 3, 1, 2]).as_standard_layout().into_owned())
}

/// (N, C, H, W) -> (N·G, C/G·H·W): one row per (example, group).
fn group_rows(x: ArrayView4<f64>, groups: usize) -> Result<Array2<f64>> {
    let (n, c, h, w) = x.dim();
    Ok(x.as_standard_layout().into_owned().into_shape((n * groups, c / groups * h * w))?)
}

fn ungroup(rows: Array2<f64>, dim: Dim4) -> Result<Array4<f64>> {
    Ok(rows.as_standard_layout().into_owned().into_shape(dim)?)
}

/// View a per-channel vector as (1, C, 1, 1) for broadcasting.
fn per_channel(v: ArrayView1<f64>) -> ArrayView4<f64> {
    v.insert_axis(Axis(1)).insert_axis(Axis(2)).insert_axis(Axis(0))
}

/// Sum over every axis except the channel axis.
fn sum_per_channel(a: &Array4<f64>) -> Array1<f64> {
    a.sum_axis(Axis(3)).sum_axis(Axis(2)).sum_axis(Axis(0))
}

/// Cache of [`spatial_batchnorm_forward`]: the flattened batch-norm cache.
#[derive(Clone, Debug)]
pub struct SpatialBatchNormCache {
    inner: BatchNormCache,
    dim: Dim4,
}

impl SpatialBatchNormCache {
    pub fn batchnorm_cache(&self) -> &BatchNormCache {
        &self.inner
    }
}

/// Batch normalization with per-channel statistics over N, H and W.
///
/// The running statistics in `bn_param` have length C.
pub fn spatial_batchnorm_forward(
    x: ArrayView4<f64>,
    gamma: ArrayView1<f64>,
    beta: ArrayView1<f64>,
    bn_param: &mut BatchNormParam,
) -> Result<(Array4<f64>, Option<SpatialBatchNormCache>)> {
    let dim = x.dim();
    let rows = channels_last_rows(x)?;
    let (out_rows, cache) = batchnorm_forward(rows.view(), gamma, beta, bn_param)?;
    let out = channels_first(out_rows, dim)?;
    Ok((out, cache.map(|inner| SpatialBatchNormCache { inner, dim })))
}

/// Returns `(dx, dgamma, dbeta)` with `dgamma` and `dbeta` of length C.
pub fn spatial_batchnorm_backward(
    dout: ArrayView4<f64>,
    cache: &SpatialBatchNormCache,
) -> Result<(Array4<f64>, Array1<f64>, Array1<f64>)> {
    let (n, c, h, w) = cache.dim;
    ensure_shape(&[n, c, h, w], dout.shape())?;

    let dout_rows = channels_last_rows(dout)?;
    let (dx_rows, dgamma, dbeta) = batchnorm_backward(dout_rows.view(), &cache.inner)?;
    Ok((channels_first(dx_rows, cache.dim)?, dgamma, dbeta))
}

/// Cache of [`spatial_groupnorm_forward`].
#[derive(Clone, Debug)]
pub struct GroupNormCache {
    inner: LayerNormCache,
    gamma: Array1<f64>,
    beta: Array1<f64>,
    groups: usize,
    dim: Dim4,
}

impl GroupNormCache {
    pub fn groups(&self) -> usize {
        self.groups
    }

    pub fn layernorm_cache(&self) -> &LayerNormCache {
        &self.inner
    }

    pub fn beta(&self) -> &Array1<f64> {
        &self.beta
    }
}

/// Group normalization: channels are split into `groups` contiguous groups
/// and each (example, group) is normalized on its own.
///
/// The normalization itself is layer norm with unit scale and zero shift on
/// the (N·G, C/G·H·W) view; the per-channel `gamma` and `beta` are applied
/// afterwards.
pub fn spatial_groupnorm_forward(
    x: ArrayView4<f64>,
    gamma: ArrayView1<f64>,
    beta: ArrayView1<f64>,
    groups: usize,
    gn_param: &NormParam,
) -> Result<(Array4<f64>, GroupNormCache)> {
    let dim = x.dim();
    let channels = dim.1;
    if groups == 0 {
        return Err(LayerError::invalid_parameter("groups", "must be positive"));
    }
    if channels % groups != 0 {
        return Err(LayerError::dimension_mismatch(
            format!("channel count divisible by {} groups", groups),
            format!("{} channels", channels),
        ));
    }
    ensure_shape(&[channels], gamma.shape())?;
    ensure_shape(&[channels], beta.shape())?;

    let rows = group_rows(x, groups)?;
    let width = rows.ncols();
    let (normalized_rows, inner) = layernorm_forward(
        rows.view(),
        Array1::ones(width).view(),
        Array1::zeros(width).view(),
        gn_param,
    )?;
    let normalized = ungroup(normalized_rows, dim)?;
    let out = &normalized * &per_channel(gamma) + &per_channel(beta);

    let cache = GroupNormCache {
        inner,
        gamma: gamma.to_owned(),
        beta: beta.to_owned(),
        groups,
        dim,
    };
    Ok((out, cache))
}

/// Returns `(dx, dgamma, dbeta)` with `dgamma` and `dbeta` of length C.
pub fn spatial_groupnorm_backward(
    dout: ArrayView4<f64>,
    cache: &GroupNormCache,
) -> Result<(Array4<f64>, Array1<f64>, Array1<f64>)> {
    let (n, c, h, w) = cache.dim;
    ensure_shape(&[n, c, h, w], dout.shape())?;

    let x_hat = ungroup(cache.inner.normalized().clone(), cache.dim)?;
    let dgamma = sum_per_channel(&(&x_hat * &dout));
    let dbeta = sum_per_channel(&dout.to_owned());

    let scaled = &dout * &per_channel(cache.gamma.view());
    let scaled_rows = group_rows(scaled.view(), cache.groups)?;
    let (dx_rows, _, _) = layernorm_backward(scaled_rows.view(), &cache.inner)?;
    Ok((ungroup(dx_rows, cache.dim)?, dgamma, dbeta))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Mode;
    use approx::assert_abs_diff_eq;

    fn sample_input() -> Array4<f64> {
        Array4::from_shape_fn((2, 4, 3, 2), |(n, c, h, w)| {
            ((n * 7 + c * 5 + h * 3 + w) % 11) as f64 * 0.5 - 2.0 + c as f64
        })
    }

    #[test]
    fn test_channel_reshape_round_trips() {
        let x = sample_input();
        let rows = channels_last_rows(x.view()).unwrap();
        assert_eq!(rows.dim(), (2 * 3 * 2, 4));
        assert_eq!(rows[[1, 2]], x[[0, 2, 0, 1]]);
        assert_eq!(channels_first(rows, x.dim()).unwrap(), x);
    }

    #[test]
    fn test_spatial_batchnorm_normalizes_channels() {
        let x = sample_input();
        let gamma = Array1::ones(4);
        let beta = Array1::zeros(4);
        let mut bn_param = BatchNormParam::new(Mode::Train);
        let (out, cache) =
            spatial_batchnorm_forward(x.view(), gamma.view(), beta.view(), &mut bn_param).unwrap();

        assert!(cache.is_some());
        assert_eq!(out.dim(), x.dim());
        for c in 0..4 {
            let channel = out.index_axis(Axis(1), c);
            assert_abs_diff_eq!(channel.mean().unwrap(), 0.0, epsilon = 1e-10);
        }
        assert_eq!(bn_param.running_mean.unwrap().len(), 4);
    }

    #[test]
    fn test_spatial_batchnorm_test_mode_has_no_cache() {
        let x = sample_input();
        let mut bn_param = BatchNormParam::new(Mode::Test);
        let (gamma, beta) = (Array1::ones(4), Array1::zeros(4));
        let (_, cache) =
            spatial_batchnorm_forward(x.view(), gamma.view(), beta.view(), &mut bn_param).unwrap();
        assert!(cache.is_none());
    }

    #[test]
    fn test_groupnorm_normalizes_each_group() {
        let x = sample_input();
        let gamma = Array1::ones(4);
        let beta = Array1::zeros(4);
        let gn_param = NormParam::default();
        let (out, cache) =
            spatial_groupnorm_forward(x.view(), gamma.view(), beta.view(), 2, &gn_param).unwrap();
        assert_eq!(cache.groups(), 2);

        for n in 0..2 {
            for g in 0..2 {
                let group = out.slice(ndarray::s![n, g * 2..g * 2 + 2, .., ..]);
                assert_abs_diff_eq!(group.mean().unwrap(), 0.0, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_groupnorm_rejects_indivisible_groups() {
        let x = sample_input();
        let gamma = Array1::ones(4);
        let beta = Array1::zeros(4);
        let gn_param = NormParam::default();
        let result = spatial_groupnorm_forward(x.view(), gamma.view(), beta.view(), 3, &gn_param);
        assert!(result.is_err());
        let result = spatial_groupnorm_forward(x.view(), gamma.view(), beta.view(), 0, &gn_param);
        assert!(result.is_err());
    }

    #[test]
    fn test_groupnorm_parameter_gradients() {
        let x = sample_input();
        let gamma = Array1::from_vec(vec![1.0, 2.0, 0.5, -1.0]);
        let beta = Array1::from_vec(vec![0.0, 0.1, 0.2, 0.3]);
        let gn_param = NormParam::default();
        let (_, cache) =
            spatial_groupnorm_forward(x.view(), gamma.view(), beta.view(), 2, &gn_param).unwrap();

        let dout = Array4::from_elem(x.dim(), 1.0);
        let (dx, dgamma, dbeta) = spatial_groupnorm_backward(dout.view(), &cache).unwrap();
        assert_eq!(dx.dim(), x.dim());
        assert_eq!(dgamma.len(), 4);
        // 2 examples x 3 x 2 positions per channel
        assert_eq!(dbeta, Array1::from_elem(4, 12.0));
    }
}
