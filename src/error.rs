//! Error Taxonomy
//!
//! One error enum for the whole persistence surface, with explicit kinds
//! instead of stringly-typed failures. Absence is never an error: `load`
//! reports a miss as `false`, `get` as `None`.

use thiserror::Error;

/// Errors surfaced by the persistence contract.
///
/// Backend failures are wrapped, never swallowed, and always carry the
/// originating operation and entity identity.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    /// Insert of a primary key that already exists.
    #[error("duplicate key in table {table}: {key}")]
    DuplicateKey {
        /// Table the insert targeted
        table: String,
        /// Rendered primary key value
        key: String,
    },

    /// Metadata or record violates a declared constraint.
    #[error("validation error: {message}")]
    Validation {
        /// What was violated
        message: String,
    },

    /// A coercion or decode crossed type families.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type or byte layout
        expected: String,
        /// What was actually found
        actual: String,
    },

    /// A value could not be parsed or rendered in the requested form.
    #[error("format error: {message}")]
    Format {
        /// Parse failure detail
        message: String,
    },

    /// The backend lacks a capability the contract exposes.
    ///
    /// Reported explicitly, never silently degraded.
    #[error("operation {operation} not supported by engine {engine}")]
    Unsupported {
        /// Engine identifier
        engine: String,
        /// The unsupported operation
        operation: String,
    },

    /// A failure surfaced by the underlying engine.
    #[error("backend error in {engine} during {operation} on {entity}: {message}")]
    Backend {
        /// Engine identifier
        engine: String,
        /// Operation that was in flight
        operation: String,
        /// Table, bucket, or object the operation targeted
        entity: String,
        /// Engine-reported detail
        message: String,
    },

    /// Missing or malformed configuration.
    #[error("configuration error: {message}")]
    Config {
        /// What is missing or malformed
        message: String,
    },

    /// An operation was issued against a closed handle.
    #[error("handle already closed: {operation}")]
    HandleClosed {
        /// Operation that was attempted
        operation: String,
    },
}

impl DataError {
    /// Create a duplicate key error.
    #[must_use]
    pub fn duplicate_key(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a format error.
    #[must_use]
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Create an unsupported operation error.
    #[must_use]
    pub fn unsupported(engine: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            engine: engine.into(),
            operation: operation.into(),
        }
    }

    /// Wrap a backend failure with its operation and entity identity.
    #[must_use]
    pub fn backend(
        engine: impl Into<String>,
        operation: impl Into<String>,
        entity: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Backend {
            engine: engine.into(),
            operation: operation.into(),
            entity: entity.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a closed-handle error.
    #[must_use]
    pub fn handle_closed(operation: impl Into<String>) -> Self {
        Self::HandleClosed {
            operation: operation.into(),
        }
    }

    /// Check if this error came from the point of misuse (caller side),
    /// as opposed to the backend.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::TypeMismatch { .. }
                | Self::Format { .. }
                | Self::Config { .. }
                | Self::HandleClosed { .. }
        )
    }

    /// Check if this is a transient error worth retrying.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

/// Result type for persistence operations.
pub type DataResult<T> = Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = DataError::duplicate_key("student", "7");
        assert!(matches!(err, DataError::DuplicateKey { table, key } if table == "student" && key == "7"));

        let err = DataError::validation("unknown column");
        assert!(matches!(err, DataError::Validation { message } if message == "unknown column"));

        let err = DataError::unsupported("memory", "transactions");
        assert!(
            matches!(err, DataError::Unsupported { engine, operation } if engine == "memory" && operation == "transactions")
        );
    }

    #[test]
    fn test_backend_error_carries_identity() {
        let err = DataError::backend("s3", "store", "invoices", "quota exceeded");
        let rendered = err.to_string();
        assert!(rendered.contains("s3"));
        assert!(rendered.contains("store"));
        assert!(rendered.contains("invoices"));
    }

    #[test]
    fn test_is_caller_error() {
        assert!(DataError::validation("bad").is_caller_error());
        assert!(DataError::config("missing uri").is_caller_error());
        assert!(!DataError::backend("x", "y", "z", "boom").is_caller_error());
        assert!(!DataError::duplicate_key("t", "1").is_caller_error());
    }

    #[test]
    fn test_is_transient() {
        assert!(DataError::backend("jdbc", "load", "t", "timeout").is_transient());
        assert!(!DataError::validation("bad").is_transient());
    }
}
