//! Error types and result handling for event capture and storage.
//!
//! Two layers: `CoreError` is what storage backends report, `HookbinError`
//! is the request-level taxonomy with stable codes that the HTTP layer maps
//! onto status codes and structured error bodies.

use thiserror::Error;

use crate::EventId;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error reported by an event store backend.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An event with this id is already stored. Stores never overwrite.
    #[error("Duplicate key: event {0} already exists")]
    DuplicateKey(EventId),

    /// Backend I/O, encoding or constraint failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("requested event not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Storage(format!("unique constraint violation: {db_err}"))
            },
            _ => Self::Storage(err.to_string()),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(format!("I/O error: {err}"))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("encoding error: {err}"))
    }
}

/// Request-level error taxonomy with codes for client disambiguation.
#[derive(Debug, Error)]
pub enum HookbinError {
    /// Ingestion body exceeds the payload bound (E1001).
    #[error("[E1001] Payload too large: size {size_bytes} bytes exceeds {limit_bytes} byte limit")]
    PayloadTooLarge {
        /// Size of the rejected payload in bytes
        size_bytes: usize,
        /// Configured upper bound in bytes
        limit_bytes: usize,
    },

    /// Unknown event id (E1002).
    #[error("[E1002] Event not found: {id}")]
    NotFound {
        /// The id that was looked up, as supplied by the caller
        id: String,
    },

    /// Malformed request input (E1003).
    ///
    /// Numeric query parameters are clamped rather than rejected, so this is
    /// only produced for requests axum itself cannot decode.
    #[error("[E1003] Invalid request: {0}")]
    Validation(String),

    /// Any backend failure (E3001).
    #[error("[E3001] Storage failure: {0}")]
    Storage(CoreError),
}

impl HookbinError {
    /// Returns the stable error code.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::PayloadTooLarge { .. } => "E1001",
            Self::NotFound { .. } => "E1002",
            Self::Validation(_) => "E1003",
            Self::Storage(_) => "E3001",
        }
    }
}

impl From<CoreError> for HookbinError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(id) => Self::NotFound { id },
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(HookbinError::PayloadTooLarge { size_bytes: 1, limit_bytes: 0 }.code(), "E1001");
        assert_eq!(HookbinError::NotFound { id: "x".into() }.code(), "E1002");
        assert_eq!(HookbinError::Validation("bad".into()).code(), "E1003");
        assert_eq!(HookbinError::Storage(CoreError::Storage("disk".into())).code(), "E3001");
    }

    #[test]
    fn store_not_found_becomes_request_not_found() {
        let err = HookbinError::from(CoreError::NotFound("abc".to_string()));
        assert!(matches!(err, HookbinError::NotFound { ref id } if id == "abc"));
    }

    #[test]
    fn storage_failures_keep_underlying_message() {
        let err = HookbinError::from(CoreError::Storage("disk full".to_string()));
        assert_eq!(err.code(), "E3001");
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn duplicate_key_is_a_storage_failure() {
        let err = HookbinError::from(CoreError::DuplicateKey(EventId::new()));
        assert!(matches!(err, HookbinError::Storage(CoreError::DuplicateKey(_))));
    }
}
