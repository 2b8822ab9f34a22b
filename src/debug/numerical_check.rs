use ndarray::{ArrayBase, Data, DataMut, Dimension};

/// Types of numerical issues
#[derive(Debug, Clone, PartialEq)]
pub enum NumericalIssue {
    NaN { count: usize },
    Infinity { count: usize },
    Underflow { count: usize },
    Overflow { count: usize },
}

/// Magnitudes below this (other than exact zero) count as vanishing.
const UNDERFLOW_THRESHOLD: f64 = 1e-12;
/// Magnitudes above this count as exploding.
const OVERFLOW_THRESHOLD: f64 = 1e6;

/// Scan an output or gradient array for values that usually signal a broken
/// forward or backward pass. Each issue found is also logged under `name`.
pub fn check_values<S, D>(name: &str, values: &ArrayBase<S, D>) -> Vec<NumericalIssue>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    let mut nan_count = 0;
    let mut inf_count = 0;
    let mut underflow_count = 0;
    let mut overflow_count = 0;

    for &value in values.iter() {
        if value.is_nan() {
            nan_count += 1;
        } else if value.is_infinite() {
            inf_count += 1;
        } else if value != 0.0 && value.abs() < UNDERFLOW_THRESHOLD {
            underflow_count += 1;
        } else if value.abs() > OVERFLOW_THRESHOLD {
            overflow_count += 1;
        }
    }

    let mut issues = Vec::new();
    if nan_count > 0 {
        log::warn!("{}: found {} NaN values", name, nan_count);
        issues.push(NumericalIssue::NaN { count: nan_count });
    }
    if inf_count > 0 {
        log::warn!("{}: found {} infinite values", name, inf_count);
        issues.push(NumericalIssue::Infinity { count: inf_count });
    }
    if underflow_count > 0 {
        log::warn!("{}: found {} vanishing values", name, underflow_count);
        issues.push(NumericalIssue::Underflow { count: underflow_count });
    }
    if overflow_count > 0 {
        log::warn!("{}: found {} exploding values", name, overflow_count);
        issues.push(NumericalIssue::Overflow { count: overflow_count });
    }
    issues
}

/// Sanitize an array by replacing NaN and Inf values
pub fn sanitize<S, D>(array: &mut ArrayBase<S, D>, nan_replacement: f64, inf_replacement: f64)
where
    S: DataMut<Elem = f64>,
    D: Dimension,
{
    array.mapv_inplace(|x| {
        if x.is_nan() {
            nan_replacement
        } else if x.is_infinite() {
            if x.is_sign_positive() {
                inf_replacement
            } else {
                -inf_replacement
            }
        } else {
            x
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_check_values_reports_each_kind() {
        let values = arr1(&[f64::NAN, f64::INFINITY, 1e-20, 1e9, 0.0, 1.0]);
        let issues = check_values("dx", &values);
        assert_eq!(
            issues,
            vec![
                NumericalIssue::NaN { count: 1 },
                NumericalIssue::Infinity { count: 1 },
                NumericalIssue::Underflow { count: 1 },
                NumericalIssue::Overflow { count: 1 },
            ]
        );
        assert!(check_values("ok", &arr1(&[0.0, -2.0, 3.5])).is_empty());
    }

    #[test]
    fn test_sanitize() {
        let mut values = arr1(&[f64::NAN, f64::NEG_INFINITY, 2.0]);
        sanitize(&mut values, 0.0, 1e3);
        assert_eq!(values, arr1(&[0.0, -1e3, 2.0]));
    }
}
