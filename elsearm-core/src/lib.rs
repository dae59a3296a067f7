//! Model-to-document mapping for Elasticsearch and OpenSearch.
//!
//! This crate maps typed records to search index documents:
//! - Index names and document ids derived from the record type, with
//!   per-type overrides
//! - Pluggable document body encoding
//! - Binding of search hits into single records, arrays and lists
//! - Index lifecycle, document, count, search and scroll operations over any
//!   [`Transport`]
//! - Bulk submission through a [`BulkQueue`]
//!
//! # Example
//!
//! ```rust,no_run
//! use elsearm_core::{Destination, Indexer, Model, Transport};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Article {
//!     id: u64,
//!     title: String,
//! }
//!
//! impl Model for Article {}
//!
//! async fn run(transport: impl Transport + 'static) -> elsearm_core::Result<()> {
//!     let indexer = Indexer::new(transport);
//!     indexer.create_index_if_not_exists(&Article::default()).await?;
//!
//!     let article = Article { id: 1, title: "Hello".into() };
//!     indexer.update(&article).await?;
//!
//!     let mut articles: Vec<Article> = Vec::new();
//!     let result = indexer.search(Destination::list(&mut articles)).await?;
//!     println!("{} of {} articles", articles.len(), result.total);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binder;
pub mod bulk;
pub mod codec;
pub mod config;
pub mod error;
pub mod indexer;
pub mod model;
pub mod naming;
pub mod request;
pub mod response;
pub mod transport;

pub use binder::{Destination, RawDocument, Shape, bind};
pub use bulk::{BufferedBulkQueue, BulkAction, BulkIndexer, BulkItem, BulkQueue};
pub use config::{NamingConfig, global_config, set_global_config};
pub use error::{Error, Result};
pub use indexer::Indexer;
pub use model::Model;
pub use request::{Method, Refresh, Request, TransportRequest};
pub use response::{ErrorCause, ErrorResponse, SearchResult, TotalRelation};
pub use transport::{Transport, TransportResponse};

/// Re-exports for `use elsearm_core::prelude::*`.
pub mod prelude {
    pub use crate::binder::Destination;
    pub use crate::bulk::{BulkIndexer, BulkQueue};
    pub use crate::error::{Error, Result};
    pub use crate::indexer::Indexer;
    pub use crate::model::Model;
    pub use crate::transport::Transport;
}
