//! Error types for the retail data pipeline
//!
//! Every failure kind an operator can see maps to exactly one variant, so a
//! failed run reports one diagnosable error: a rejected credential is never
//! mistaken for a flaky network, and a broken upstream contract is never
//! retried as if it were transient.

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RdpError>;

/// Main error type for the retail data pipeline
#[derive(Error, Debug)]
pub enum RdpError {
    /// Missing or invalid startup configuration. Fatal, never retried.
    #[error("Configuration error: {0}. Check your environment variables (.env).")]
    Config(String),

    /// The upstream API rejected the credential. Fatal and distinct from
    /// transport failures so operators don't blindly retry a bad key.
    #[error("Authentication failed: {0}. Verify API_KEY and the 'Authorization' header value.")]
    Authentication(String),

    /// Network or HTTP failure. Retryable by the external scheduler.
    #[error("Transport error: {0}. Check connectivity and the API base URL.")]
    Transport(String),

    /// Underlying HTTP client failure (connect, timeout, body read).
    /// Transport-class: retryable by the external scheduler.
    #[error("Network request failed: {0}. Check connectivity and the API base URL.")]
    Http(#[from] reqwest::Error),

    /// The upstream response did not match the documented contract.
    /// Fatal: signals an upstream contract break, not a transient fault.
    #[error("Unexpected response shape: {0}")]
    ShapeValidation(String),

    /// Checkpoint or merge transaction failure. Fatal for the run, but safe
    /// to retry: snapshots are immutable and merges are idempotent.
    #[error("Storage error: {0}. Check the database connection settings.")]
    Storage(#[from] sqlx::Error),

    /// Applying embedded schema migrations failed.
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// File system operation failed (bronze snapshot read/write).
    #[error("File operation failed: {0}. Check permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failed.
    #[error("Failed to parse JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RdpError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an authentication error
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a shape-validation error
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::ShapeValidation(msg.into())
    }

    /// Whether the external scheduler may retry the failed run as-is.
    ///
    /// Transport failures are transient; storage failures are safe to retry
    /// because the merge step is idempotent. Everything else needs an
    /// operator (bad config, bad credential, broken upstream contract).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Http(_) | Self::Storage(_) | Self::Migrate(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RdpError::transport("connection reset").is_retryable());
        assert!(!RdpError::config("API_KEY missing").is_retryable());
        assert!(!RdpError::authentication("401").is_retryable());
        assert!(!RdpError::shape("'items' is not a list").is_retryable());
    }

    #[test]
    fn test_messages_carry_context() {
        let err = RdpError::shape("'items' is not a list (source: sales, cursor: 51)");
        assert!(err.to_string().contains("sales"));
        assert!(err.to_string().contains("51"));
    }
}
