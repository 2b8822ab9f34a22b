//! Classification losses. Each takes (N, C) scores and N labels and returns
//! the scalar loss together with its gradient with respect to the scores.

pub mod functions;

pub use functions::{softmax_loss, svm_loss};
