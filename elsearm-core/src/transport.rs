//! Transport abstraction.
//!
//! The indexer never talks HTTP itself. It hands a [`TransportRequest`] to a
//! [`Transport`] and interprets the [`TransportResponse`].

use crate::{error::Result, request::TransportRequest};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// A raw response from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Bytes,
}

impl TransportResponse {
    /// Create a response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is an error (greater than 299).
    pub fn is_error(&self) -> bool {
        self.status > 299
    }
}

/// Executes requests against a search cluster.
///
/// Implementations return `Ok` for every response the cluster produced,
/// including error statuses. `Err` is reserved for failures where no
/// response exists (connection refused, timeouts, TLS errors).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a request.
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        (**self).execute(request).await
    }
}
