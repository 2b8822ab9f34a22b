use ndarray::{Array, ArrayView, Dimension, Zip};

use crate::error::{ensure_shape, Result};

/// Input saved by [`relu_forward`].
#[derive(Clone, Debug)]
pub struct ReluCache<D: Dimension> {
    x: Array<f64, D>,
}

impl<D: Dimension> ReluCache<D> {
    pub fn input(&self) -> &Array<f64, D> {
        &self.x
    }
}

/// Rectified linear unit, `max(x, 0)` elementwise, for inputs of any shape.
///
/// NaN inputs stay NaN.
pub fn relu_forward<D: Dimension>(x: ArrayView<f64, D>) -> (Array<f64, D>, ReluCache<D>) {
    let out = x.mapv(|v| if v > 0.0 || v.is_nan() { v } else { 0.0 });
    (out, ReluCache { x: x.to_owned() })
}

/// Routes `dout` through every position where the input was `>= 0`.
///
/// The sub-gradient at exactly zero is 1, not 0.
pub fn relu_backward<D: Dimension>(
    dout: ArrayView<f64, D>,
    cache: &ReluCache<D>,
) -> Result<Array<f64, D>> {
    ensure_shape(cache.x.shape(), dout.shape())?;

    let mut dx = Array::<f64, D>::zeros(dout.raw_dim());
    Zip::from(&mut dx)
        .and(&dout)
        .and(&cache.x)
        .for_each(|d, &g, &x| {
            if x >= 0.0 {
                *d = g;
            }
        });
    Ok(dx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, Array3};

    #[test]
    fn test_relu_forward_clamps_negatives() {
        let x = arr2(&[[-1.0, 0.5], [0.0, -3.0]]);
        let (out, cache) = relu_forward(x.view());
        assert_eq!(out, arr2(&[[0.0, 0.5], [0.0, 0.0]]));
        assert_eq!(cache.input(), &x);
    }

    #[test]
    fn test_relu_backward_passes_through_at_zero() {
        let x = arr1(&[-1.0, 0.0, 2.0]);
        let (_, cache) = relu_forward(x.view());
        let dx = relu_backward(arr1(&[5.0, 6.0, 7.0]).view(), &cache).unwrap();
        assert_eq!(dx, arr1(&[0.0, 6.0, 7.0]));
    }

    #[test]
    fn test_relu_propagates_nan() {
        let x = arr1(&[f64::NAN, -1.0, 2.0]);
        let (out, cache) = relu_forward(x.view());
        assert!(out[0].is_nan());
        assert_eq!(out[1], 0.0);
        assert_eq!(out[2], 2.0);

        // NaN fails the `>= 0` test, so no gradient flows back through it
        let dx = relu_backward(arr1(&[1.0, 1.0, 1.0]).view(), &cache).unwrap();
        assert_eq!(dx, arr1(&[0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_relu_backward_shape_mismatch() {
        let x = Array3::<f64>::zeros((2, 3, 4));
        let (_, cache) = relu_forward(x.view());
        let dout = Array3::<f64>::zeros((2, 4, 3));
        assert!(relu_backward(dout.view(), &cache).is_err());
    }
}
