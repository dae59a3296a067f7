//! OpenSearch transport for elsearm.
//!
//! Executes elsearm requests with the `opensearch` client crate, adding
//! basic auth, timeouts, TLS backend selection and retries of requests that
//! failed without a response.
//!
//! # Example
//!
//! ```rust,no_run
//! use elsearm_core::{Indexer, Model};
//! use elsearm_opensearch::{OpenSearchConfig, OpenSearchTransport};
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
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OpenSearchConfig::new("http://localhost:9200")
//!         .with_basic_auth("admin", "admin");
//!     let indexer = Indexer::new(OpenSearchTransport::new(config)?);
//!
//!     indexer.create_index_if_not_exists(&Article::default()).await?;
//!     indexer.update(&Article { id: 1, title: "Hello".into() }).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod client;
mod config;
mod error;

pub use client::OpenSearchTransport;
pub use config::{
    DEFAULT_URL, OpenSearchConfig, PASSWORD_ENV, TlsConfig, URL_ENV, USERNAME_ENV,
};
pub use error::{OpenSearchError, Result};
