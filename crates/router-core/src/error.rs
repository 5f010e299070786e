//! Error types for routing operations.

use thiserror::Error;

/// Result type for routing operations
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors that can occur during routing operations.
///
/// The router favors graceful numeric degradation over raising: a routing
/// decision is always produced under degraded precision. The variants here
/// cover caller programming errors only.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The candidate list passed to `select` was empty
    #[error("no candidates supplied for selection")]
    EmptyCandidates,

    /// The configured feature dimension is invalid
    #[error("invalid feature dimension {0}: must be greater than zero")]
    InvalidDimension(usize),

    /// Contextual-only mode was requested without a usable feature vector
    #[error("contextual-only mode requires features of dimension {expected}, got {actual:?}")]
    ContextualUnavailable {
        /// Dimension the router was configured with
        expected: usize,
        /// Length of the feature vector actually supplied, if any
        actual: Option<usize>,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl RouterError {
    /// Create a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a contextual-unavailable error
    pub fn contextual_unavailable(expected: usize, actual: Option<usize>) -> Self {
        Self::ContextualUnavailable { expected, actual }
    }

    /// Check whether this error indicates a caller programming error
    /// (as opposed to a configuration problem)
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::EmptyCandidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RouterError::EmptyCandidates;
        assert_eq!(err.to_string(), "no candidates supplied for selection");

        let err = RouterError::InvalidDimension(0);
        assert!(err.to_string().contains("greater than zero"));

        let err = RouterError::contextual_unavailable(10, Some(4));
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn test_caller_error_classification() {
        assert!(RouterError::EmptyCandidates.is_caller_error());
        assert!(!RouterError::configuration("bad").is_caller_error());
    }
}
