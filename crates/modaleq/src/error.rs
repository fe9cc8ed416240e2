//! Error types for the modaleq crate.
//!
//! The numerical core never fails: invalid intermediate values are replaced
//! with neutral ones. Errors are reserved for configuration validation and
//! for reading or writing files.

use thiserror::Error;

/// Error type for modaleq operations.
#[derive(Debug, Error)]
pub enum ModalEqError {
    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {}", .errors.join("; "))]
    InvalidConfig {
        /// Every validation error found.
        errors: Vec<String>,
    },

    /// A directivity table is malformed.
    #[error("invalid directivity table '{curve_name}': {message}")]
    InvalidDirectivity {
        /// Name of the offending curve.
        curve_name: String,
        /// Error message describing the failure.
        message: String,
    },

    /// A file operation failed (create, write, read).
    #[error("file operation failed for '{path}': {message}")]
    FileOperation {
        /// Path to the file.
        path: String,
        /// Error message describing the failure.
        message: String,
    },

    /// I/O error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for modaleq operations.
pub type Result<T> = std::result::Result<T, ModalEqError>;

impl ModalEqError {
    /// Returns true if this is a configuration error.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ModalEqError::InvalidConfig { .. } | ModalEqError::InvalidDirectivity { .. }
        )
    }

    /// Returns true if this is a file/IO error.
    pub fn is_io_error(&self) -> bool {
        matches!(
            self,
            ModalEqError::FileOperation { .. } | ModalEqError::Io(_) | ModalEqError::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_message_lists_errors() {
        let err = ModalEqError::InvalidConfig {
            errors: vec!["min_q must be positive".to_string(), "bad".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "invalid configuration: min_q must be positive; bad"
        );
        assert!(err.is_config_error());
        assert!(!err.is_io_error());
    }
}
