use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{LayerError, Result};

/// Labels must have one entry per row of `x`, each a valid column index.
fn check_labels(x: &ArrayView2<f64>, y: &ArrayView1<usize>) -> Result<()> {
    let (num_examples, num_classes) = x.dim();
    if y.len() != num_examples {
        return Err(LayerError::dimension_mismatch(
            format!("{} labels", num_examples),
            format!("{} labels", y.len()),
        ));
    }
    if num_examples == 0 {
        return Err(LayerError::dimension_mismatch("at least one example", "an empty batch"));
    }
    if let Some(&label) = y.iter().find(|&&label| label >= num_classes) {
        return Err(LayerError::dimension_mismatch(
            format!("labels in 0..{}", num_classes),
            format!("label {}", label),
        ));
    }
    Ok(())
}

/// Multiclass SVM (hinge) loss with margin 1.
///
/// `x` holds (N, C) class scores and `y` the correct class of each row.
/// Returns the mean over examples of the summed positive margins, and the
/// gradient with respect to `x`.
pub fn svm_loss(x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<(f64, Array2<f64>)> {
    check_labels(&x, &y)?;
    let n = x.nrows() as f64;

    let mut margins = Array2::zeros(x.raw_dim());
    let rows = x.rows().into_iter().zip(margins.rows_mut()).zip(y.iter());
    for ((row, mut margin_row), &label) in rows {
        let correct = row[label];
        margin_row.zip_mut_with(&row, |m, &score| *m = (score - correct + 1.0).max(0.0));
        margin_row[label] = 0.0;
    }
    let loss = margins.sum() / n;

    let mut dx = margins.mapv(|m| if m > 0.0 { 1.0 } else { 0.0 });
    for (mut dx_row, &label) in dx.rows_mut().into_iter().zip(y.iter()) {
        let num_positive = dx_row.sum();
        dx_row[label] -= num_positive;
    }
    dx /= n;

    Ok((loss, dx))
}

/// Softmax cross-entropy loss.
///
/// Each row's maximum is subtracted before exponentiating. Returns the mean
/// negative log-probability of the correct classes and the gradient
/// `(softmax(x) - one_hot(y)) / N`.
pub fn softmax_loss(x: ArrayView2<f64>, y: ArrayView1<usize>) -> Result<(f64, Array2<f64>)> {
    check_labels(&x, &y)?;
    let n = x.nrows() as f64;

    let row_max = x.fold_axis(Axis(1), f64::NEG_INFINITY, |&m, &v| m.max(v));
    let shifted = &x - &row_max.insert_axis(Axis(1));
    let log_z = shifted.mapv(f64::exp).sum_axis(Axis(1)).mapv(f64::ln);
    let log_probs = shifted - &log_z.insert_axis(Axis(1));

    let loss = -y
        .iter()
        .enumerate()
        .map(|(i, &label)| log_probs[[i, label]])
        .sum::<f64>()
        / n;

    let mut dx = log_probs.mapv(f64::exp);
    for (i, &label) in y.iter().enumerate() {
        dx[[i, label]] -= 1.0;
    }
    dx /= n;

    Ok((loss, dx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_svm_loss_known_values() {
        let x = arr2(&[[1.0, 2.0, 0.5], [3.0, 1.0, 2.5]]);
        let y = arr1(&[0usize, 2]);
        let (loss, dx) = svm_loss(x.view(), y.view()).unwrap();

        // Row 0: margins 2.0 and 0.5; row 1: margins 1.5 and 0.0
        assert_abs_diff_eq!(loss, 2.0, epsilon = 1e-12);
        assert_eq!(dx, arr2(&[[-1.0, 0.5, 0.5], [0.5, 0.0, -0.5]]));
    }

    #[test]
    fn test_svm_loss_zero_when_margin_satisfied() {
        let x = arr2(&[[5.0, 1.0, 2.0]]);
        let (loss, dx) = svm_loss(x.view(), arr1(&[0usize]).view()).unwrap();
        assert_eq!(loss, 0.0);
        assert_eq!(dx.sum(), 0.0);
    }

    #[test]
    fn test_softmax_loss_uniform_scores() {
        let x = Array2::zeros((2, 3));
        let y = arr1(&[0usize, 2]);
        let (loss, dx) = softmax_loss(x.view(), y.view()).unwrap();
        assert_abs_diff_eq!(loss, 3.0f64.ln(), epsilon = 1e-12);
        for row in dx.rows() {
            assert_abs_diff_eq!(row.sum(), 0.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(dx[[0, 0]], (1.0 / 3.0 - 1.0) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_softmax_loss_is_stable_for_large_scores() {
        let x = arr2(&[[1000.0, 1000.0], [-1000.0, 0.0]]);
        let (loss, dx) = softmax_loss(x.view(), arr1(&[0usize, 1]).view()).unwrap();
        assert!(loss.is_finite());
        assert!(dx.iter().all(|v| v.is_finite()));
        assert_abs_diff_eq!(loss, 2.0f64.ln() / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_labels_are_validated() {
        let x = Array2::zeros((2, 3));
        assert!(svm_loss(x.view(), arr1(&[0usize, 3]).view()).is_err());
        assert!(softmax_loss(x.view(), arr1(&[0usize]).view()).is_err());
    }
}
