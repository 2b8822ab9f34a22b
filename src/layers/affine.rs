//! Fully connected (affine) transform.

use ndarray::{Array, Array1, Array2, ArrayView, ArrayView1, ArrayView2, Axis, Dimension};

use crate::error::{ensure_shape, LayerError, Result};

/// Operands saved by [`affine_forward`].
#[derive(Clone, Debug)]
pub struct AffineCache<D: Dimension> {
    x: Array<f64, D>,
    w: Array2<f64>,
    b: Array1<f64>,
}

impl<D: Dimension> AffineCache<D> {
    pub fn input(&self) -> &Array<f64, D> {
        &self.x
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.w
    }

    pub fn biases(&self) -> &Array1<f64> {
        &self.b
    }
}

/// Collapse every axis after the first: (N, d_1, ..., d_k) -> (N, D).
fn flatten_rows<D: Dimension>(x: &ArrayView<f64, D>) -> Result<Array2<f64>> {
    let shape = x.shape();
    if shape.is_empty() {
        return Err(LayerError::dimension_mismatch("input with a batch axis", "a scalar"));
    }
    let n = shape[0];
    let d: usize = shape[1..].iter().product();
    Ok(x.as_standard_layout().into_owned().into_shape((n, d))?)
}

/// Computes `out = X·W + b` where `X` is `x` reshaped to (N, D).
///
/// `x` may have any rank; every example's trailing axes are flattened into a
/// single vector of length D. `w` is (D, M) and `b` has length M.
pub fn affine_forward<D: Dimension>(
    x: ArrayView<f64, D>,
    w: ArrayView2<f64>,
    b: ArrayView1<f64>,
) -> Result<(Array2<f64>, AffineCache<D>)> {
    let rows = flatten_rows(&x)?;
    if rows.ncols() != w.nrows() {
        return Err(LayerError::dimension_mismatch(
            format!("weights with {} rows", rows.ncols()),
            format!("weights of shape {:?}", w.shape()),
        ));
    }
    ensure_shape(&[w.ncols()], b.shape())?;

    let out = rows.dot(&w) + &b.insert_axis(Axis(0));
    let cache = AffineCache {
        x: x.to_owned(),
        w: w.to_owned(),
        b: b.to_owned(),
    };
    Ok((out, cache))
}

/// Returns `(dx, dw, db)`; `dx` has the original (unflattened) shape of `x`.
pub fn affine_backward<D: Dimension>(
    dout: ArrayView2<f64>,
    cache: &AffineCache<D>,
) -> Result<(Array<f64, D>, Array2<f64>, Array1<f64>)> {
    let rows = flatten_rows(&cache.x.view())?;
    ensure_shape(&[rows.nrows(), cache.w.ncols()], dout.shape())?;

    let dx = dout.dot(&cache.w.t()).into_shape(cache.x.raw_dim())?;
    let dw = rows.t().dot(&dout);
    let db = dout.sum_axis(Axis(0));
    Ok((dx, dw, db))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2, Array3};

    #[test]
    fn test_affine_forward_flattens_trailing_axes() {
        let x = Array3::from_shape_vec((2, 2, 2), (0..8).map(f64::from).collect()).unwrap();
        let w = Array2::from_elem((4, 3), 1.0);
        let b = arr1(&[0.0, 1.0, 2.0]);

        let (out, _) = affine_forward(x.view(), w.view(), b.view()).unwrap();
        assert_eq!(out, arr2(&[[6.0, 7.0, 8.0], [22.0, 23.0, 24.0]]));
    }

    #[test]
    fn test_affine_backward_restores_input_shape() {
        let x = Array3::from_shape_vec((2, 3, 1), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let w = arr2(&[[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]]);
        let b = arr1(&[0.5, -0.5]);
        let (_, cache) = affine_forward(x.view(), w.view(), b.view()).unwrap();

        let dout = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let (dx, dw, db) = affine_backward(dout.view(), &cache).unwrap();

        assert_eq!(dx.dim(), (2, 3, 1));
        assert_abs_diff_eq!(dx[[0, 2, 0]], 3.0);
        assert_eq!(dw, arr2(&[[13.0, 18.0], [17.0, 24.0], [21.0, 30.0]]));
        assert_eq!(db, arr1(&[4.0, 6.0]));
    }

    #[test]
    fn test_affine_forward_rejects_mismatched_weights() {
        let x = Array2::<f64>::zeros((2, 5));
        let w = Array2::<f64>::zeros((4, 3));
        let b = Array1::<f64>::zeros(3);
        assert!(affine_forward(x.view(), w.view(), b.view()).is_err());

        let w = Array2::<f64>::zeros((5, 3));
        let b = Array1::<f64>::zeros(2);
        assert!(affine_forward(x.view(), w.view(), b.view()).is_err());
    }
}
