//! Error taxonomy for docbind.
//!
//! Every failure surfaces to the immediate caller. Nothing in this crate
//! retries, logs, or swallows an [`Error`].

use serde_json::Value;
use thiserror::Error;

/// Result type alias for docbind operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by contexts, collection handles and the provisioner.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing connection / schema configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A partition could not be created or deleted.
    #[error("failed to provision index {index}: {message}")]
    Provisioning {
        index: String,
        message: String,
        /// Engine reply (and request, when diagnostics are enabled).
        diagnostics: Value,
    },

    /// An operation that requires an existing document found none.
    #[error("document {id} not found in index {index}")]
    NotFound { index: String, id: String },

    /// Network or engine-side failure during a round trip.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
        body: Option<Value>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A query that cannot be expressed as requested.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl Error {
    /// Engine failure carrying the HTTP status and reply body.
    pub fn engine(message: impl Into<String>, status: u16, body: Value) -> Self {
        Self::Transport {
            message: message.into(),
            status: Some(status),
            body: Some(body),
        }
    }

    /// Failure before any reply was received (connect, timeout, I/O).
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    /// HTTP status of the engine reply, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn engine_error_keeps_status_and_body() {
        let err = Error::engine("search failed", 400, json!({"error": "boom"}));
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.to_string(), "transport error: search failed");
    }

    #[test]
    fn connection_error_has_no_status() {
        let err = Error::connection("connection refused");
        assert_eq!(err.status(), None);
        assert!(!err.is_not_found());
    }

    #[test]
    fn not_found_display_names_index_and_id() {
        let err = Error::NotFound {
            index: "local-examples".to_string(),
            id: "a1".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "document a1 not found in index local-examples"
        );
    }
}
