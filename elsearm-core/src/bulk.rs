//! Bulk operations.
//!
//! [`BulkIndexer`] turns models into [`BulkItem`]s and hands them to a
//! [`BulkQueue`]. When and how items reach the cluster is up to the queue;
//! [`BufferedBulkQueue`] collects them and submits `_bulk` requests.

use crate::{
    codec,
    error::{Error, Result},
    indexer::Indexer,
    model::Model,
    naming,
    request::{BulkRequest, Refresh},
    response::ErrorCause,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Bulk action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    /// Create or replace a document.
    Index,
    /// Delete a document.
    Delete,
}

impl BulkAction {
    /// Action name in the bulk format.
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Index => "index",
            BulkAction::Delete => "delete",
        }
    }
}

/// A single queued bulk action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItem {
    /// Action.
    pub action: BulkAction,
    /// Target index.
    pub index: String,
    /// Document id; assigned by the store when absent.
    pub document_id: Option<String>,
    /// Document body, for index actions.
    pub body: Option<Vec<u8>>,
}

impl BulkItem {
    /// Encode as newline-delimited bulk lines.
    pub fn to_lines(&self) -> Result<Vec<u8>> {
        let mut meta = json!({ "_index": self.index });
        if let Some(id) = &self.document_id {
            meta["_id"] = id.clone().into();
        }

        let mut lines = serde_json::to_vec(&json!({ self.action.as_str(): meta }))?;
        lines.push(b'\n');
        if let Some(body) = &self.body {
            lines.extend_from_slice(body);
            lines.push(b'\n');
        }
        Ok(lines)
    }
}

/// Accepts bulk items for later submission.
#[async_trait]
pub trait BulkQueue: Send + Sync {
    /// Enqueue an item.
    async fn add(&self, item: BulkItem) -> Result<()>;
}

/// Queues model writes as bulk actions.
pub struct BulkIndexer<Q> {
    queue: Q,
}

impl<Q: BulkQueue> BulkIndexer<Q> {
    /// Create a bulk indexer over a queue.
    pub fn new(queue: Q) -> Self {
        Self { queue }
    }

    /// Get the queue.
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Queue a new document with a store-assigned id.
    pub async fn create_without_id<M: Model>(&self, model: &M) -> Result<()> {
        let item = BulkItem {
            action: BulkAction::Index,
            index: naming::index_name(model),
            document_id: None,
            body: Some(codec::document_body(Some(model))?),
        };
        self.queue.add(item).await
    }

    /// Queue a create-or-replace of the model's document.
    pub async fn update<M: Model>(&self, model: &M) -> Result<()> {
        let item = BulkItem {
            action: BulkAction::Index,
            index: naming::index_name(model),
            document_id: naming::document_id(model)?,
            body: Some(codec::document_body(Some(model))?),
        };
        self.queue.add(item).await
    }

    /// Queue a delete of the model's document.
    pub async fn delete<M: Model>(&self, model: &M) -> Result<()> {
        let index = naming::index_name(model);
        let Some(id) = naming::document_id(model)? else {
            return Err(Error::MissingDocumentId { index });
        };
        let item = BulkItem {
            action: BulkAction::Delete,
            index,
            document_id: Some(id),
            body: None,
        };
        self.queue.add(item).await
    }
}

/// Bulk API response.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkResponse {
    /// Whether any item failed.
    #[serde(default)]
    pub errors: bool,
    /// Per-item results, in request order.
    #[serde(default)]
    pub items: Vec<BulkItemResult>,
}

/// Result of one bulk item, keyed by its action.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkItemResult {
    /// Index result.
    Index(BulkItemStatus),
    /// Create result.
    Create(BulkItemStatus),
    /// Update result.
    Update(BulkItemStatus),
    /// Delete result.
    Delete(BulkItemStatus),
}

impl BulkItemResult {
    /// The item's status, whatever its action.
    pub fn status(&self) -> &BulkItemStatus {
        match self {
            BulkItemResult::Index(s)
            | BulkItemResult::Create(s)
            | BulkItemResult::Update(s)
            | BulkItemResult::Delete(s) => s,
        }
    }
}

/// Status of a bulk item.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkItemStatus {
    /// Index name.
    #[serde(default, rename = "_index")]
    pub index: Option<String>,
    /// Document ID.
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
    /// HTTP status code.
    pub status: u16,
    /// Error details.
    #[serde(default)]
    pub error: Option<ErrorCause>,
}

impl BulkItemStatus {
    /// Whether the item failed. A delete of a missing document answers 404
    /// without an error and is not a failure.
    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

/// A queue that buffers items and submits them as `_bulk` requests.
///
/// Items are submitted when the buffer reaches the flush threshold and on
/// [`flush`](Self::flush). Failed items are reported as [`Error::Bulk`] from
/// the call that submitted them.
pub struct BufferedBulkQueue {
    indexer: Indexer,
    items: Mutex<Vec<BulkItem>>,
    flush_threshold: usize,
    refresh: Option<Refresh>,
}

impl BufferedBulkQueue {
    /// Default number of buffered items that triggers a submission.
    pub const DEFAULT_FLUSH_THRESHOLD: usize = 500;

    /// Create a queue submitting through an indexer.
    pub fn new(indexer: Indexer) -> Self {
        Self {
            indexer,
            items: Mutex::new(Vec::new()),
            flush_threshold: Self::DEFAULT_FLUSH_THRESHOLD,
            refresh: None,
        }
    }

    /// Set the number of buffered items that triggers a submission.
    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold.max(1);
        self
    }

    /// Set the refresh policy of submitted requests.
    pub fn with_refresh(mut self, refresh: Refresh) -> Self {
        self.refresh = Some(refresh);
        self
    }

    /// Number of buffered items.
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Whether nothing is buffered.
    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Submit all buffered items. Returns the number submitted.
    pub async fn flush(&self) -> Result<usize> {
        let batch = std::mem::take(&mut *self.items.lock().await);
        self.submit(batch).await
    }

    async fn submit(&self, batch: Vec<BulkItem>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut body = Vec::new();
        for item in &batch {
            body.extend(item.to_lines()?);
        }
        let request = BulkRequest {
            body,
            refresh: self.refresh,
            ..Default::default()
        };

        debug!("Submitting {} bulk items", batch.len());
        let response: BulkResponse = self.indexer.execute_into(&request).await?;

        let mut errors = Vec::new();
        for result in &response.items {
            let status = result.status();
            if !status.is_failure() {
                continue;
            }
            warn!(
                "Bulk item {} in index {} failed with status {}",
                status.id.as_deref().unwrap_or("<auto>"),
                status.index.as_deref().unwrap_or_default(),
                status.status
            );
            errors.extend(status.error.clone());
        }

        if !errors.is_empty() {
            return Err(Error::Bulk {
                succeeded: response.items.len() - errors.len(),
                failed: errors.len(),
                errors,
            });
        }
        Ok(batch.len())
    }
}

#[async_trait]
impl BulkQueue for BufferedBulkQueue {
    async fn add(&self, item: BulkItem) -> Result<()> {
        let batch = {
            let mut items = self.items.lock().await;
            items.push(item);
            if items.len() < self.flush_threshold {
                return Ok(());
            }
            std::mem::take(&mut *items)
        };
        self.submit(batch).await?;
        Ok(())
    }
}
