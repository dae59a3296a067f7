//! Bulk indexing against the in-memory store.

use elsearm_core::{
    BufferedBulkQueue, BulkIndexer, Error, Indexer, Model, bulk::BulkQueue, request::Refresh,
};
use elsearm_testing::MemoryTransport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: u32,
    name: String,
}

impl Model for User {}

fn setup() -> (Arc<MemoryTransport>, Indexer, BulkIndexer<BufferedBulkQueue>) {
    let transport = Arc::new(MemoryTransport::new());
    let indexer = Indexer::from_arc(transport.clone());
    let queue = BufferedBulkQueue::new(indexer.clone()).with_refresh(Refresh::True);
    (transport, indexer, BulkIndexer::new(queue))
}

#[tokio::test]
async fn test_bulk_create_without_id() {
    let (transport, indexer, bulk) = setup();
    indexer.create_index_if_not_exists(&User::default()).await.unwrap();

    bulk.create_without_id(&User {
        id: 0,
        name: "Bob".into(),
    })
    .await
    .unwrap();
    assert_eq!(transport.document_count("user"), 0);

    assert_eq!(bulk.queue().flush().await.unwrap(), 1);
    assert_eq!(transport.document_count("user"), 1);
}

#[tokio::test]
async fn test_bulk_update_then_delete() {
    let (_transport, indexer, bulk) = setup();
    indexer.create_index_if_not_exists(&User::default()).await.unwrap();

    let user = User {
        id: 1,
        name: "Alice".into(),
    };
    bulk.update(&user).await.unwrap();
    bulk.delete(&user).await.unwrap();
    assert_eq!(bulk.queue().flush().await.unwrap(), 2);

    let mut fetched = User {
        id: 1,
        ..Default::default()
    };
    let err = indexer.get(&mut fetched).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_bulk_reports_rejected_documents() {
    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Raw {
        id: u32,
    }

    impl Model for Raw {
        fn document_body(&self) -> elsearm_core::Result<Vec<u8>> {
            Ok(b"not json".to_vec())
        }
    }

    let transport = Arc::new(MemoryTransport::new());
    let queue = BufferedBulkQueue::new(Indexer::from_arc(transport.clone()));
    let bulk = BulkIndexer::new(queue);

    bulk.update(&User {
        id: 1,
        name: "ok".into(),
    })
    .await
    .unwrap();
    bulk.update(&Raw { id: 2 }).await.unwrap();

    match bulk.queue().flush().await.unwrap_err() {
        Error::Bulk {
            succeeded, failed, ..
        } => {
            assert_eq!(succeeded, 1);
            assert_eq!(failed, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(transport.document_count("user"), 1);
}

#[tokio::test]
async fn test_queue_trait_object() {
    let transport = Arc::new(MemoryTransport::new());
    let queue: Arc<dyn BulkQueue> = Arc::new(
        BufferedBulkQueue::new(Indexer::from_arc(transport.clone())).with_flush_threshold(1),
    );

    let item = elsearm_core::BulkItem {
        action: elsearm_core::BulkAction::Index,
        index: "user".into(),
        document_id: Some("7".into()),
        body: Some(br#"{"id":7,"name":"Gus"}"#.to_vec()),
    };
    queue.add(item).await.unwrap();

    assert_eq!(
        transport.document("user", "7").unwrap()["name"],
        serde_json::json!("Gus")
    );
}
