//! Central-difference gradient estimates for checking backward passes.

use ndarray::{Array, ArrayBase, Data, Dimension};

use crate::error::{LayerError, Result};

fn flat_mut<D: Dimension>(a: &mut Array<f64, D>) -> Result<&mut [f64]> {
    a.as_slice_mut()
        .ok_or_else(|| LayerError::NumericalError("array is not contiguous".to_string()))
}

/// Numerical gradient of a scalar function `f` at `x`.
///
/// Each element is nudged by `±h` in turn and `(f(x+h) - f(x-h)) / 2h`
/// recorded. `f` receives the perturbed copy of `x`.
pub fn eval_numerical_gradient<D, F>(mut f: F, x: &Array<f64, D>, h: f64) -> Result<Array<f64, D>>
where
    D: Dimension,
    F: FnMut(&Array<f64, D>) -> Result<f64>,
{
    let mut probe = x.as_standard_layout().into_owned();
    let mut grad = Array::zeros(probe.raw_dim());

    for i in 0..probe.len() {
        let original = flat_mut(&mut probe)?[i];

        flat_mut(&mut probe)?[i] = original + h;
        let pos = f(&probe)?;
        flat_mut(&mut probe)?[i] = original - h;
        let neg = f(&probe)?;
        flat_mut(&mut probe)?[i] = original;

        flat_mut(&mut grad)?[i] = (pos - neg) / (2.0 * h);
    }

    Ok(grad)
}

/// Numerical gradient of an array-valued function `f` at `x`, contracted with
/// the upstream gradient `df`: element `i` is `Σ (f(x+h) - f(x-h)) · df / 2h`.
pub fn eval_numerical_gradient_array<D, E, F>(
    mut f: F,
    x: &Array<f64, D>,
    df: &Array<f64, E>,
    h: f64,
) -> Result<Array<f64, D>>
where
    D: Dimension,
    E: Dimension,
    F: FnMut(&Array<f64, D>) -> Result<Array<f64, E>>,
{
    let mut probe = x.as_standard_layout().into_owned();
    let mut grad = Array::zeros(probe.raw_dim());

    for i in 0..probe.len() {
        let original = flat_mut(&mut probe)?[i];

        flat_mut(&mut probe)?[i] = original + h;
        let pos = f(&probe)?;
        flat_mut(&mut probe)?[i] = original - h;
        let neg = f(&probe)?;
        flat_mut(&mut probe)?[i] = original;

        if pos.shape() != df.shape() || neg.shape() != df.shape() {
            return Err(LayerError::dimension_mismatch(
                format!("{:?}", df.shape()),
                format!("{:?}", pos.shape()),
            ));
        }
        flat_mut(&mut grad)?[i] = ((pos - neg) * df).sum() / (2.0 * h);
    }

    Ok(grad)
}

/// Maximum relative error `|a - b| / max(1e-8, |a| + |b|)` over all elements.
pub fn rel_error<S1, S2, D>(a: &ArrayBase<S1, D>, b: &ArrayBase<S2, D>) -> f64
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x - y).abs() / (x.abs() + y.abs()).max(1e-8))
        .fold(0.0, f64::max)
}
