pub mod gradient_check;
pub mod numerical_check;

pub use gradient_check::{eval_numerical_gradient, eval_numerical_gradient_array, rel_error};
pub use numerical_check::{check_values, sanitize, NumericalIssue};
