use std::fmt;

/// Result type for layer operations
pub type Result<T> = std::result::Result<T, LayerError>;

/// Main error type for the layer primitives
#[derive(Debug, Clone)]
pub enum LayerError {
    /// Shapes of the operands do not satisfy the op's contract
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid hyperparameter value
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Mode string other than "train" or "test"
    InvalidMode(String),

    /// IO errors (file operations)
    IoError(String),

    /// Serialization/deserialization errors
    SerializationError(String),

    /// Numerical computation errors
    NumericalError(String),
}

impl fmt::Display for LayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            LayerError::InvalidParameter { name, reason } => {
                write!(f, "Invalid parameter '{}': {}", name, reason)
            }
            LayerError::InvalidMode(mode) => {
                write!(f, "Invalid forward mode \"{}\": expected \"train\" or \"test\"", mode)
            }
            LayerError::IoError(msg) => write!(f, "IO error: {}", msg),
            LayerError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            LayerError::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
        }
    }
}

impl std::error::Error for LayerError {}

// Conversion from std::io::Error
impl From<std::io::Error> for LayerError {
    fn from(err: std::io::Error) -> Self {
        LayerError::IoError(err.to_string())
    }
}

// Conversion from bincode::Error
impl From<bincode::Error> for LayerError {
    fn from(err: bincode::Error) -> Self {
        LayerError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for LayerError {
    fn from(err: serde_json::Error) -> Self {
        LayerError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for LayerError {
    fn from(err: ndarray::ShapeError) -> Self {
        LayerError::NumericalError(err.to_string())
    }
}

// Helper functions for common error patterns
impl LayerError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        LayerError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        LayerError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Fail with `DimensionMismatch` unless `actual` equals `expected`.
pub(crate) fn ensure_shape(expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(LayerError::dimension_mismatch(
            format!("{:?}", expected),
            format!("{:?}", actual),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = LayerError::invalid_parameter("stride", "must be positive");
        assert_eq!(err.to_string(), "Invalid parameter 'stride': must be positive");

        let err = LayerError::InvalidMode("eval".to_string());
        assert!(err.to_string().contains("eval"));
    }

    #[test]
    fn test_ensure_shape() {
        assert!(ensure_shape(&[2, 3], &[2, 3]).is_ok());
        match ensure_shape(&[2, 3], &[3, 2]) {
            Err(LayerError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, "[2, 3]");
                assert_eq!(actual, "[3, 2]");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
