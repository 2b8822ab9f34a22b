//! Naive 2-D convolution
//!
//! Straightforward sliding-window loops over a zero-padded copy of the input.
//! Inputs are (N, C, H, W), filters are (F, C, HH, WW), biases have length F.

use ndarray::{s, Array1, Array4, ArrayView1, ArrayView4, Zip};

use crate::error::{ensure_shape, LayerError, Result};
use crate::params::ConvParam;

/// Values saved by [`conv_forward_naive`].
#[derive(Clone, Debug)]
pub struct ConvCache {
    x: Array4<f64>,
    w: Array4<f64>,
    b: Array1<f64>,
    param: ConvParam,
}

impl ConvCache {
    pub fn input(&self) -> &Array4<f64> {
        &self.x
    }

    pub fn filters(&self) -> &Array4<f64> {
        &self.w
    }

    pub fn biases(&self) -> &Array1<f64> {
        &self.b
    }

    pub fn param(&self) -> &ConvParam {
        &self.param
    }
}

/// Number of window positions along one axis: `⌊(size + 2·pad - kernel) / stride⌋ + 1`.
///
/// Truncates when the window does not tile the padded input exactly.
pub fn output_size(size: usize, pad: usize, kernel: usize, stride: usize) -> Result<usize> {
    let padded = size + 2 * pad;
    if kernel == 0 || kernel > padded {
        return Err(LayerError::dimension_mismatch(
            format!("window of size 1..={}", padded),
            format!("window of size {}", kernel),
        ));
    }
    if stride == 0 {
        return Err(LayerError::invalid_parameter("stride", "must be positive"));
    }
    Ok((padded - kernel) / stride + 1)
}

/// Pad input with zeros on both sides of the height and width axes
fn pad_input(x: ArrayView4<f64>, pad: usize) -> Array4<f64> {
    let (batch_size, channels, height, width) = x.dim();
    if pad == 0 {
        return x.to_owned();
    }

    let mut padded =
        Array4::<f64>::zeros((batch_size, channels, height + 2 * pad, width + 2 * pad));
    padded
        .slice_mut(s![.., .., pad..pad + height, pad..pad + width])
        .assign(&x);
    padded
}

/// Forward pass of a convolutional layer.
///
/// Each output element is the full-depth dot product of one filter with one
/// receptive field of the padded input, plus the filter's bias. The input
/// itself is never modified. Output is (N, F, H', W').
pub fn conv_forward_naive(
    x: ArrayView4<f64>,
    w: ArrayView4<f64>,
    b: ArrayView1<f64>,
    conv_param: &ConvParam,
) -> Result<(Array4<f64>, ConvCache)> {
    conv_param.validate()?;
    let (batch_size, channels, height, width) = x.dim();
    let (num_filters, filter_channels, kernel_h, kernel_w) = w.dim();
    if filter_channels != channels {
        return Err(LayerError::dimension_mismatch(
            format!("filters with {} channels", channels),
            format!("filters of shape {:?}", w.shape()),
        ));
    }
    ensure_shape(&[num_filters], b.shape())?;

    let ConvParam { stride, pad } = *conv_param;
    let out_height = output_size(height, pad, kernel_h, stride)?;
    let out_width = output_size(width, pad, kernel_w, stride)?;

    let padded = pad_input(x, pad);
    let mut out = Array4::<f64>::zeros((batch_size, num_filters, out_height, out_width));

    for n in 0..batch_size {
        for f in 0..num_filters {
            let filter = w.slice(s![f, .., .., ..]);
            for i in 0..out_height {
                let h_start = i * stride;
                for j in 0..out_width {
                    let w_start = j * stride;
                    let (h_end, w_end) = (h_start + kernel_h, w_start + kernel_w);
                    let window = padded.slice(s![n, .., h_start..h_end, w_start..w_end]);
                    let sum = Zip::from(&window)
                        .and(&filter)
                        .fold(0.0, |acc, &a, &k| acc + a * k);
                    out[[n, f, i, j]] = sum + b[f];
                }
            }
        }
    }

    let cache = ConvCache {
        x: x.to_owned(),
        w: w.to_owned(),
        b: b.to_owned(),
        param: *conv_param,
    };
    Ok((out, cache))
}

/// Backward pass of a convolutional layer. Returns `(dx, dw, db)`.
///
/// Receptive fields overlap whenever the stride is smaller than the kernel, so
/// every contribution is accumulated. `dx` is computed on the padded grid and
/// the border is stripped at the end.
pub fn conv_backward_naive(
    dout: ArrayView4<f64>,
    cache: &ConvCache,
) -> Result<(Array4<f64>, Array4<f64>, Array1<f64>)> {
    let (batch_size, _, height, width) = cache.x.dim();
    let (num_filters, _, kernel_h, kernel_w) = cache.w.dim();
    let ConvParam { stride, pad } = cache.param;
    let out_height = output_size(height, pad, kernel_h, stride)?;
    let out_width = output_size(width, pad, kernel_w, stride)?;
    ensure_shape(&[batch_size, num_filters, out_height, out_width], dout.shape())?;

    let padded = pad_input(cache.x.view(), pad);
    let mut dx_padded = Array4::<f64>::zeros(padded.raw_dim());
    let mut dw = Array4::<f64>::zeros(cache.w.raw_dim());
    let mut db = Array1::<f64>::zeros(num_filters);

    for n in 0..batch_size {
        for f in 0..num_filters {
            let filter = cache.w.slice(s![f, .., .., ..]);
            for i in 0..out_height {
                let h_start = i * stride;
                for j in 0..out_width {
                    let w_start = j * stride;
                    let (h_end, w_end) = (h_start + kernel_h, w_start + kernel_w);
                    let grad = dout[[n, f, i, j]];

                    dx_padded
                        .slice_mut(s![n, .., h_start..h_end, w_start..w_end])
                        .scaled_add(grad, &filter);
                    dw.slice_mut(s![f, .., .., ..])
                        .scaled_add(grad, &padded.slice(s![n, .., h_start..h_end, w_start..w_end]));
                    db[f] += grad;
                }
            }
        }
    }

    let dx = dx_padded
        .slice(s![.., .., pad..pad + height, pad..pad + width])
        .to_owned();
    Ok((dx, dw, db))
}
