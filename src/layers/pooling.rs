//! Naive max pooling over (N, C, H, W) inputs.

use ndarray::{s, Array4, ArrayView2, ArrayView4, Zip};

use super::conv::output_size;
use crate::error::{ensure_shape, Result};
use crate::params::PoolParam;

/// Values saved by [`max_pool_forward_naive`].
#[derive(Clone, Debug)]
pub struct PoolCache {
    x: Array4<f64>,
    param: PoolParam,
}

impl PoolCache {
    pub fn input(&self) -> &Array4<f64> {
        &self.x
    }

    pub fn param(&self) -> &PoolParam {
        &self.param
    }
}

/// Maximum of a window. A NaN anywhere in the window makes the result NaN.
fn window_max(window: ArrayView2<f64>) -> f64 {
    window.fold(f64::NEG_INFINITY, |m, &v| {
        if m.is_nan() || v.is_nan() {
            f64::NAN
        } else {
            m.max(v)
        }
    })
}

fn pooled_dims(x_dim: (usize, usize, usize, usize), param: &PoolParam) -> Result<(usize, usize)> {
    let (_, _, height, width) = x_dim;
    let out_height = output_size(height, 0, param.pool_height, param.stride)?;
    let out_width = output_size(width, 0, param.pool_width, param.stride)?;
    Ok((out_height, out_width))
}

/// Forward pass for a max-pooling layer. No padding is applied.
pub fn max_pool_forward_naive(
    x: ArrayView4<f64>,
    pool_param: &PoolParam,
) -> Result<(Array4<f64>, PoolCache)> {
    pool_param.validate()?;
    let (batch_size, channels, _, _) = x.dim();
    let (out_height, out_width) = pooled_dims(x.dim(), pool_param)?;
    let PoolParam { pool_height, pool_width, stride } = *pool_param;

    let mut out = Array4::<f64>::zeros((batch_size, channels, out_height, out_width));

    for b in 0..batch_size {
        for c in 0..channels {
            for oh in 0..out_height {
                let h_start = oh * stride;
                for ow in 0..out_width {
                    let w_start = ow * stride;
                    let (h_end, w_end) = (h_start + pool_height, w_start + pool_width);
                    let window = x.slice(s![b, c, h_start..h_end, w_start..w_end]);
                    out[[b, c, oh, ow]] = window_max(window);
                }
            }
        }
    }

    let cache = PoolCache {
        x: x.to_owned(),
        param: *pool_param,
    };
    Ok((out, cache))
}

/// Backward pass for a max-pooling layer.
///
/// Each upstream gradient goes to the positions of its window that equal the
/// window maximum. When several positions tie, every one of them receives the
/// full gradient.
pub fn max_pool_backward_naive(dout: ArrayView4<f64>, cache: &PoolCache) -> Result<Array4<f64>> {
    let (batch_size, channels, _, _) = cache.x.dim();
    let (out_height, out_width) = pooled_dims(cache.x.dim(), &cache.param)?;
    ensure_shape(&[batch_size, channels, out_height, out_width], dout.shape())?;
    let PoolParam { pool_height, pool_width, stride } = cache.param;

    let mut dx = Array4::<f64>::zeros(cache.x.raw_dim());

    for b in 0..batch_size {
        for c in 0..channels {
            for oh in 0..out_height {
                let h_start = oh * stride;
                let h_end = h_start + pool_height;
                for ow in 0..out_width {
                    let w_start = ow * stride;
                    let w_end = w_start + pool_width;

                    let window = cache.x.slice(s![b, c, h_start..h_end, w_start..w_end]);
                    let max_val = window_max(window);
                    let grad = dout[[b, c, oh, ow]];

                    Zip::from(dx.slice_mut(s![b, c, h_start..h_end, w_start..w_end]))
                        .and(&window)
                        .for_each(|d, &v| {
                            if v == max_val {
                                *d += grad;
                            }
                        });
                }
            }
        }
    }

    Ok(dx)
}
