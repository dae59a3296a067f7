//! Testing utilities for elsearm applications.
//!
//! [`MemoryTransport`] stands in for a search cluster so indexer code can be
//! exercised without one.
//!
//! ```
//! use elsearm_core::{Indexer, Model};
//! use elsearm_testing::MemoryTransport;
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct User {
//!     id: u32,
//!     name: String,
//! }
//!
//! impl Model for User {}
//!
//! # tokio_test::block_on(async {
//! let transport = Arc::new(MemoryTransport::new());
//! let indexer = Indexer::from_arc(transport.clone());
//!
//! indexer.update(&User { id: 1, name: "Alice".into() }).await.unwrap();
//! assert_eq!(transport.document_count("user"), 1);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod memory;

pub use memory::{DEFAULT_SEARCH_SIZE, MemoryTransport, TransportFailure};
