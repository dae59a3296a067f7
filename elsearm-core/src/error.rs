//! Error types for model mapping and indexer operations.

use crate::response::{ErrorCause, ErrorResponse};
use thiserror::Error;

/// Elsearm error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The record has nothing to encode.
    #[error("empty document")]
    EmptyDocument,

    /// A custom document id reported that the id is not known yet.
    ///
    /// Records whose id is assigned by the store use this to signal that they
    /// have not been persisted.
    #[error("document id is unknown: {0}")]
    UnknownDocumentId(String),

    /// A read or delete was attempted on a record without an id.
    #[error("document in index {index} has no id")]
    MissingDocumentId {
        /// Index name.
        index: String,
    },

    /// The store answered a get without a `_source`.
    #[error("document {index}/{id} has no source")]
    MissingSource {
        /// Index name.
        index: String,
        /// Document ID.
        id: String,
    },

    /// A custom body codec rejected the document.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Default codec or envelope (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store answered with an error envelope.
    #[error(transparent)]
    Response(Box<ErrorResponse>),

    /// The transport failed before a response was produced.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The operation's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// Some items of a bulk request failed.
    #[error("bulk operation failed: {succeeded} succeeded, {failed} failed")]
    Bulk {
        /// Number of successful items.
        succeeded: usize,
        /// Number of failed items.
        failed: usize,
        /// Causes reported for the failed items.
        errors: Vec<ErrorCause>,
    },
}

impl Error {
    /// Wrap a transport-level failure.
    pub fn transport(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Transport(err.into())
    }

    /// The structured store error, if this is one.
    pub fn response(&self) -> Option<&ErrorResponse> {
        match self {
            Error::Response(res) => Some(res),
            _ => None,
        }
    }

    /// Whether the store reported a missing index or document.
    pub fn is_not_found(&self) -> bool {
        self.response().is_some_and(ErrorResponse::is_not_found)
    }

    /// Whether the store reported that the resource already exists.
    pub fn is_resource_already_exists(&self) -> bool {
        self.response()
            .is_some_and(ErrorResponse::is_resource_already_exists)
    }
}

impl From<ErrorResponse> for Error {
    fn from(res: ErrorResponse) -> Self {
        Error::Response(Box::new(res))
    }
}

/// Result type alias for elsearm operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_error_display_is_reason() {
        let res: ErrorResponse = serde_json::from_str(
            r#"{"status":400,"error":{"type":"resource_already_exists_exception","reason":"index [user/abc] already exists"}}"#,
        )
        .unwrap();
        let err = Error::from(res);

        assert_eq!(err.to_string(), "index [user/abc] already exists");
        assert!(err.is_resource_already_exists());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_transport_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = Error::transport(io);

        assert!(err.to_string().contains("refused"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.response().is_none());
    }
}
