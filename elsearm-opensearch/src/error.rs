//! Error types for building the OpenSearch transport.

use thiserror::Error;

/// Transport construction error.
#[derive(Error, Debug)]
pub enum OpenSearchError {
    /// Invalid configuration.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The client could not be built.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A certificate file could not be read.
    #[error("Certificate error: {0}")]
    Certificate(#[from] std::io::Error),

    /// Client error from opensearch crate.
    #[error("Client error: {0}")]
    Client(#[from] opensearch::Error),
}

/// Result type alias for transport construction.
pub type Result<T> = std::result::Result<T, OpenSearchError>;
