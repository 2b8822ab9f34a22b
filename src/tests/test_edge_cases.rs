use ndarray::{arr1, arr2, Array1, Array2, Array4};
use crate::debug::{check_values, NumericalIssue};
use crate::error::LayerError;
use crate::layers::*;
use crate::loss::softmax_loss;
use crate::params::{BatchNormParam, ConvParam, Mode, NormParam, PoolParam};

#[test]
fn test_batchnorm_constant_feature_stays_finite() {
    // Zero variance is handled only by eps
    let x = arr2(&[[3.0, 1.0], [3.0, 2.0], [3.0, 4.0]]);
    let gamma = arr1(&[1.0, 1.0]);
    let beta = arr1(&[0.0, 0.0]);
    let mut bn_param = BatchNormParam::new(Mode::Train);
    let (out, cache) =
        batchnorm_forward(x.view(), gamma.view(), beta.view(), &mut bn_param).unwrap();
    assert!(check_values("bn out", &out).is_empty());
    assert_eq!(out[[0, 0]], 0.0);

    let dout = arr2(&[[1.0, 0.0], [-1.0, 0.5], [0.3, 0.2]]);
    let (dx, _, _) = batchnorm_backward(dout.view(), &cache.unwrap()).unwrap();
    let issues = check_values("bn dx", &dx);
    assert!(!issues.iter().any(|issue| matches!(issue, NumericalIssue::NaN { .. })));
}

#[test]
fn test_batchnorm_single_example_batch() {
    let x = arr2(&[[1.0, -2.0, 5.0]]);
    let gamma = arr1(&[2.0, 2.0, 2.0]);
    let beta = arr1(&[0.5, 0.5, 0.5]);
    let mut bn_param = BatchNormParam::new(Mode::Train);
    let (out, _) = batchnorm_forward(x.view(), gamma.view(), beta.view(), &mut bn_param).unwrap();
    // Every feature equals its own mean
    assert_eq!(out, arr2(&[[0.5, 0.5, 0.5]]));
}

#[test]
fn test_batchnorm_empty_batch_is_an_error() {
    let x = Array2::<f64>::zeros((0, 2));
    let gamma = arr1(&[1.0, 1.0]);
    let beta = arr1(&[0.0, 0.0]);
    let mut bn_param = BatchNormParam::new(Mode::Train);
    assert!(matches!(
        batchnorm_forward(x.view(), gamma.view(), beta.view(), &mut bn_param),
        Err(LayerError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_gamma_length_mismatch() {
    let x = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
    let gamma = arr1(&[1.0]);
    let beta = arr1(&[0.0, 0.0]);
    assert!(layernorm_forward(x.view(), gamma.view(), beta.view(), &NormParam::default()).is_err());
}

#[test]
fn test_backward_rejects_wrong_gradient_shape() {
    let x = arr2(&[[1.0, 2.0], [3.0, 5.0]]);
    let gamma = arr1(&[1.0, 1.0]);
    let beta = arr1(&[0.0, 0.0]);
    let mut bn_param = BatchNormParam::new(Mode::Train);
    let (_, cache) = batchnorm_forward(x.view(), gamma.view(), beta.view(), &mut bn_param).unwrap();
    let cache = cache.unwrap();
    let dout = Array2::<f64>::zeros((3, 2));
    assert!(batchnorm_backward(dout.view(), &cache).is_err());
    assert!(batchnorm_backward_alt(dout.view(), &cache).is_err());

    let (_, affine_cache) =
        affine_forward(x.view(), Array2::eye(2).view(), Array1::zeros(2).view()).unwrap();
    assert!(affine_backward(Array2::zeros((2, 3)).view(), &affine_cache).is_err());
}

#[test]
fn test_conv_kernel_larger_than_padded_input() {
    let x = Array4::<f64>::zeros((1, 1, 2, 2));
    let w = Array4::<f64>::zeros((1, 1, 5, 5));
    let b = arr1(&[0.0]);
    assert!(conv_forward_naive(x.view(), w.view(), b.view(), &ConvParam::new(1, 0)).is_err());
    // Two pixels of padding on each side make the window fit
    assert!(conv_forward_naive(x.view(), w.view(), b.view(), &ConvParam::new(1, 2)).is_ok());
}

#[test]
fn test_pool_window_larger_than_input() {
    let x = Array4::<f64>::zeros((1, 1, 2, 2));
    assert!(max_pool_forward_naive(x.view(), &PoolParam::new(3, 3, 1)).is_err());
}

#[test]
fn test_softmax_with_extreme_scores_has_no_numerical_issues() {
    let x = arr2(&[[1e4, -1e4, 0.0], [-1e4, 1e4, 1e4]]);
    let (loss, dx) = softmax_loss(x.view(), arr1(&[0usize, 2]).view()).unwrap();
    assert!(loss.is_finite());
    let issues = check_values("softmax dx", &dx);
    let non_finite = |issue: &NumericalIssue| {
        matches!(issue, NumericalIssue::NaN { .. } | NumericalIssue::Infinity { .. })
    };
    assert!(!issues.iter().any(non_finite));
}
