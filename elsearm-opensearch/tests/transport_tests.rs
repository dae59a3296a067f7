//! OpenSearch transport against a mock HTTP server.

use elsearm_core::{Destination, Error, Indexer, Model, request::Refresh};
use elsearm_opensearch::{OpenSearchConfig, OpenSearchTransport};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path, query_param},
};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: u32,
    name: String,
}

impl Model for User {}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    text: String,
}

impl Model for Note {}

fn slow_indexer(server: &MockServer, retries: u32) -> Indexer {
    let config = OpenSearchConfig::new(server.uri())
        .with_request_timeout(Duration::from_millis(200))
        .with_max_retries(retries)
        .with_retry_backoff(Duration::from_millis(1));
    Indexer::new(OpenSearchTransport::new(config).unwrap())
}

fn indexer(server: &MockServer) -> Indexer {
    let config = OpenSearchConfig::new(server.uri()).with_max_retries(0);
    Indexer::new(OpenSearchTransport::new(config).unwrap())
}

#[tokio::test]
async fn test_create_index_if_not_exists() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "acknowledged": true })))
        .expect(1)
        .mount(&server)
        .await;

    indexer(&server)
        .create_index_if_not_exists(&User::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_sends_json_body_and_params() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/user/_doc/1"))
        .and(query_param("refresh", "true"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "id": 1, "name": "Alice" })))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({ "_id": "1", "result": "created" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let user = User {
        id: 1,
        name: "Alice".into(),
    };
    indexer(&server)
        .update_with(&user, |req| req.refresh = Some(Refresh::True))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_error_envelope_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "root_cause": [{ "type": "resource_already_exists_exception", "reason": "index [user/abc] already exists" }],
                "type": "resource_already_exists_exception",
                "reason": "index [user/abc] already exists"
            },
            "status": 400
        })))
        .mount(&server)
        .await;

    let err = indexer(&server)
        .create_index(&User::default())
        .await
        .unwrap_err();

    assert!(err.is_resource_already_exists());
    let res = err.response().unwrap();
    assert_eq!(res.status(), 400);
    assert_eq!(res.root_causes().len(), 1);
}

#[tokio::test]
async fn test_search_binds_hits() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/user/_search"))
        .and(query_param("size", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": {
                "total": { "value": 10000, "relation": "gte" },
                "hits": [
                    { "_id": "1", "_source": { "id": 1, "name": "Alice" } },
                    { "_id": "2", "_source": { "id": 2, "name": "Bob" } }
                ]
            }
        })))
        .mount(&server)
        .await;

    let mut users: [User; 2] = Default::default();
    let result = indexer(&server)
        .search(Destination::array(&mut users))
        .await
        .unwrap();

    assert_eq!(users[1].name, "Bob");
    assert_eq!(result.total, 10000);
    assert!(!result.is_exact());
}

#[tokio::test]
async fn test_bulk_uses_ndjson() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .and(header("content-type", "application/x-ndjson"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": false,
            "items": [{ "index": { "_index": "user", "_id": "1", "status": 201 } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let queue = elsearm_core::BufferedBulkQueue::new(indexer(&server));
    let bulk = elsearm_core::BulkIndexer::new(queue);
    bulk.update(&User {
        id: 1,
        name: "Alice".into(),
    })
    .await
    .unwrap();
    assert_eq!(bulk.queue().flush().await.unwrap(), 1);
}

#[tokio::test]
async fn test_unreachable_cluster_is_transport_error() {
    let config = OpenSearchConfig::new("http://127.0.0.1:1")
        .with_max_retries(1)
        .with_retry_backoff(Duration::from_millis(1))
        .with_request_timeout(Duration::from_secs(2));
    let indexer = Indexer::new(OpenSearchTransport::new(config).unwrap());

    let err = indexer.count(&User::default()).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn test_timed_out_create_is_not_resent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/note/_doc"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({ "_id": "n1", "result": "created" }))
                .set_delay(Duration::from_millis(800)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut note = Note {
        text: "once".into(),
    };
    let err = slow_indexer(&server, 3)
        .create_without_id(&mut note)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn test_timed_out_read_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/note/_count"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "count": 1 }))
                .set_delay(Duration::from_millis(800)),
        )
        .expect(3)
        .mount(&server)
        .await;

    let err = slow_indexer(&server, 2)
        .count(&Note::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[test]
fn test_invalid_url_is_rejected() {
    let err = OpenSearchTransport::new(OpenSearchConfig::new("not a url"))
        .err()
        .unwrap();
    assert!(err.to_string().contains("Invalid URL"));
}
