//! Error types for squall.

use thiserror::Error;

/// The main error type for squall operations.
#[derive(Debug, Error)]
pub enum SquallError {
    /// Malformed expression tree, unregistered node kind, or a
    /// placeholder/parameter count mismatch.
    #[error("Compile error: {0}")]
    Compile(String),

    /// A variable was handed a value outside its semantic category.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// A non-nullable variable was set to null.
    #[error("Null value not allowed: {0}")]
    NoneValue(String),

    /// The link to the backend was lost.
    #[error("Disconnected: {0}")]
    Disconnection(String),

    /// Any other failure reported by the backend.
    #[error("Operational error{}: {message}", format_code(.code))]
    Operational {
        code: Option<String>,
        message: String,
    },

    /// The requested backend driver is unknown or was not compiled in.
    #[error("Database module error: {0}")]
    DatabaseModule(String),

    /// The connection was closed with `close()`.
    #[error("Connection is closed")]
    Closed,

    /// `get_unique()` found more than one row.
    #[error("Expected at most one row, found more")]
    NotOne,

    /// Nothing identifies the row an insert just created.
    #[error("Missing insert identity: {0}")]
    MissingIdentity(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SquallError {
    /// Create a compile error.
    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile(message.into())
    }

    /// Create a type mismatch error naming the expected category and the value received.
    pub fn type_mismatch(expected: &str, got: impl std::fmt::Debug) -> Self {
        Self::TypeMismatch(format!("expected {expected}, got {got:?}"))
    }

    /// True when the error reports a lost backend link.
    pub fn is_disconnection(&self) -> bool {
        matches!(self, Self::Disconnection(_))
    }
}

fn format_code(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default()
}

/// Result type alias for squall operations.
pub type SquallResult<T> = Result<T, SquallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SquallError::compile("no renderer for Select");
        assert_eq!(err.to_string(), "Compile error: no renderer for Select");

        let err = SquallError::Operational {
            code: Some("23505".into()),
            message: "duplicate key".into(),
        };
        assert_eq!(err.to_string(), "Operational error [23505]: duplicate key");

        let err = SquallError::Operational {
            code: None,
            message: "locked".into(),
        };
        assert_eq!(err.to_string(), "Operational error: locked");
    }

    #[test]
    fn test_type_mismatch_message() {
        let err = SquallError::type_mismatch("integer", "abc");
        assert_eq!(err.to_string(), "Type mismatch: expected integer, got \"abc\"");
        assert!(!err.is_disconnection());
    }
}
