//! In-memory search engine.

use async_trait::async_trait;
use elsearm_core::{Method, Result, Transport, TransportRequest, TransportResponse};
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value, json};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Hits returned by a search without a `size` parameter.
pub const DEFAULT_SEARCH_SIZE: usize = 10;

/// Error returned for injected transport failures.
#[derive(Debug, thiserror::Error)]
#[error("injected transport failure: {0}")]
pub struct TransportFailure(pub String);

enum Injected {
    Response(TransportResponse),
    Transport(String),
}

/// A [`Transport`] backed by an in-memory document store.
///
/// Emulates the part of the REST API the indexer uses: index create, exists
/// and delete; document index, get and delete; count; search with `size`,
/// `from` and `scroll`; scroll and clear-scroll; bulk. Queries are not
/// evaluated, every search matches all documents. Writes are visible
/// immediately and create missing indices.
///
/// Hits are returned in index order, then in document insertion order.
#[derive(Default)]
pub struct MemoryTransport {
    store: Mutex<Store>,
    requests: Mutex<Vec<TransportRequest>>,
    injected: Mutex<VecDeque<Injected>>,
}

impl MemoryTransport {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next request with `status` and `body` instead of handling it.
    pub fn fail_next(&self, status: u16, body: impl Into<String>) {
        self.injected
            .lock()
            .push_back(Injected::Response(TransportResponse::new(status, body.into())));
    }

    /// Fail the next request at the transport level.
    pub fn fail_next_with_transport_error(&self, message: impl Into<String>) {
        self.injected
            .lock()
            .push_back(Injected::Transport(message.into()));
    }

    /// All requests received, in order.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Forget recorded requests.
    pub fn clear_requests(&self) {
        self.requests.lock().clear();
    }

    /// Names of existing indices, in creation order.
    pub fn index_names(&self) -> Vec<String> {
        self.store
            .lock()
            .indices
            .iter()
            .map(|index| index.name.clone())
            .collect()
    }

    /// Whether an index exists.
    pub fn has_index(&self, name: &str) -> bool {
        self.store.lock().position(name).is_some()
    }

    /// Number of documents in an index; zero when it does not exist.
    pub fn document_count(&self, index: &str) -> usize {
        let store = self.store.lock();
        store
            .position(index)
            .map_or(0, |i| store.indices[i].documents.len())
    }

    /// A stored document source.
    pub fn document(&self, index: &str, id: &str) -> Option<Value> {
        let store = self.store.lock();
        let i = store.position(index)?;
        store.indices[i]
            .documents
            .iter()
            .find(|(doc_id, _)| doc_id == id)
            .map(|(_, source)| source.clone())
    }

    /// Number of open scroll contexts.
    pub fn open_scrolls(&self) -> usize {
        self.store.lock().scrolls.len()
    }

    fn handle(&self, request: &TransportRequest) -> TransportResponse {
        let segments: Vec<String> = request
            .path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
            .collect();
        let parts: Vec<&str> = segments.iter().map(String::as_str).collect();

        let mut store = self.store.lock();
        let result = match (request.method, parts.as_slice()) {
            (Method::Post | Method::Put, ["_bulk"]) => store.bulk(None, request),
            (Method::Post | Method::Put, [index, "_bulk"]) => store.bulk(Some(*index), request),
            (Method::Get | Method::Post, ["_search", "scroll"]) => store.scroll(request),
            (Method::Delete, ["_search", "scroll"]) => store.clear_scroll(request),
            (Method::Get | Method::Post, ["_search"]) => store.search(None, request),
            (Method::Get | Method::Post, [indices, "_search"]) => {
                store.search(Some(*indices), request)
            }
            (Method::Get | Method::Post, ["_count"]) => store.count(None),
            (Method::Get | Method::Post, [indices, "_count"]) => store.count(Some(*indices)),
            (Method::Head, [indices]) => store.exists(indices),
            (Method::Put, [index]) => store.create_index(index),
            (Method::Delete, [indices]) => store.delete_index(indices, request),
            (Method::Put | Method::Post, [index, "_doc", id]) => {
                store.index_document(index, Some(*id), request)
            }
            (Method::Post, [index, "_doc"]) => store.index_document(index, None, request),
            (Method::Get, [index, "_doc", id]) => store.get_document(index, id),
            (Method::Delete, [index, "_doc", id]) => store.delete_document(index, id),
            _ => Err(StoreError::new(
                400,
                "illegal_argument_exception",
                format!(
                    "no handler found for uri [{}] and method [{}]",
                    request.path,
                    request.method.as_str()
                ),
            )),
        };

        result.unwrap_or_else(StoreError::into_response)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn execute(&self, request: TransportRequest) -> Result<TransportResponse> {
        debug!("{} {}", request.method.as_str(), request.path);
        self.requests.lock().push(request.clone());

        let injected = self.injected.lock().pop_front();
        match injected {
            Some(Injected::Response(response)) => Ok(response),
            Some(Injected::Transport(message)) => {
                Err(elsearm_core::Error::transport(TransportFailure(message)))
            }
            None => Ok(self.handle(&request)),
        }
    }
}

type Handled = std::result::Result<TransportResponse, StoreError>;

/// An error answer, as the engine renders it.
struct StoreError {
    status: u16,
    error_type: &'static str,
    reason: String,
    index: Option<String>,
}

impl StoreError {
    fn new(status: u16, error_type: &'static str, reason: impl Into<String>) -> Self {
        Self {
            status,
            error_type,
            reason: reason.into(),
            index: None,
        }
    }

    fn index_not_found(index: &str) -> Self {
        Self {
            index: Some(index.to_string()),
            ..Self::new(404, "index_not_found_exception", format!("no such index [{index}]"))
        }
    }

    fn cause(&self) -> Value {
        let mut cause = json!({ "type": self.error_type, "reason": self.reason });
        if let Some(index) = &self.index {
            cause["index"] = index.clone().into();
        }
        cause
    }

    fn into_response(self) -> TransportResponse {
        let mut error = self.cause();
        error["root_cause"] = json!([self.cause()]);
        respond(self.status, json!({ "error": error, "status": self.status }))
    }
}

fn respond(status: u16, body: Value) -> TransportResponse {
    TransportResponse::new(status, body.to_string())
}

fn param<T: std::str::FromStr>(request: &TransportRequest, key: &str) -> Option<T> {
    request.get_param(key).and_then(|v| v.parse().ok())
}

fn parse_source(index: &str, body: &[u8]) -> std::result::Result<Value, StoreError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(source @ Value::Object(_)) => Ok(source),
        _ => Err(StoreError {
            index: Some(index.to_string()),
            ..StoreError::new(400, "mapper_parsing_exception", "failed to parse")
        }),
    }
}

struct Index {
    name: String,
    documents: Vec<(String, Value)>,
}

struct Cursor {
    remaining: VecDeque<Value>,
    size: usize,
    total: usize,
}

#[derive(Default)]
struct Store {
    indices: Vec<Index>,
    scrolls: HashMap<String, Cursor>,
}

enum Written {
    Created,
    Updated,
}

impl Written {
    fn status(&self) -> u16 {
        match self {
            Written::Created => 201,
            Written::Updated => 200,
        }
    }

    fn result(&self) -> &'static str {
        match self {
            Written::Created => "created",
            Written::Updated => "updated",
        }
    }
}

impl Store {
    fn position(&self, name: &str) -> Option<usize> {
        self.indices.iter().position(|index| index.name == name)
    }

    fn ensure_index(&mut self, name: &str) -> usize {
        match self.position(name) {
            Some(i) => i,
            None => {
                self.indices.push(Index {
                    name: name.to_string(),
                    documents: Vec::new(),
                });
                self.indices.len() - 1
            }
        }
    }

    /// Resolve a comma-separated index expression. `_all`, `*` and trailing
    /// wildcards match existing indices; other names must exist.
    fn resolve(&self, expr: Option<&str>) -> std::result::Result<Vec<usize>, StoreError> {
        let Some(expr) = expr else {
            return Ok((0..self.indices.len()).collect());
        };

        let mut targets = Vec::new();
        for name in expr.split(',').filter(|s| !s.is_empty()) {
            if name == "_all" || name == "*" {
                targets.extend(0..self.indices.len());
            } else if let Some(prefix) = name.strip_suffix('*') {
                targets.extend(
                    self.indices
                        .iter()
                        .enumerate()
                        .filter(|(_, index)| index.name.starts_with(prefix))
                        .map(|(i, _)| i),
                );
            } else {
                targets.push(
                    self.position(name)
                        .ok_or_else(|| StoreError::index_not_found(name))?,
                );
            }
        }

        let mut seen = Vec::with_capacity(targets.len());
        targets.retain(|i| {
            if seen.contains(i) {
                false
            } else {
                seen.push(*i);
                true
            }
        });
        Ok(targets)
    }

    fn exists(&self, indices: &str) -> Handled {
        match self.resolve(Some(indices)) {
            Ok(_) => Ok(TransportResponse::new(200, "")),
            Err(_) => Ok(TransportResponse::new(404, "")),
        }
    }

    fn create_index(&mut self, index: &str) -> Handled {
        if self.position(index).is_some() {
            return Err(StoreError {
                index: Some(index.to_string()),
                ..StoreError::new(
                    400,
                    "resource_already_exists_exception",
                    format!("index [{index}] already exists"),
                )
            });
        }
        self.ensure_index(index);
        Ok(respond(
            200,
            json!({ "acknowledged": true, "shards_acknowledged": true, "index": index }),
        ))
    }

    fn delete_index(&mut self, indices: &str, request: &TransportRequest) -> Handled {
        let targets = match self.resolve(Some(indices)) {
            Ok(targets) => targets,
            Err(_) if param(request, "ignore_unavailable") == Some(true) => Vec::new(),
            Err(err) => return Err(err),
        };

        let names: Vec<String> = targets
            .iter()
            .map(|&i| self.indices[i].name.clone())
            .collect();
        self.indices.retain(|index| !names.contains(&index.name));
        Ok(respond(200, json!({ "acknowledged": true })))
    }

    fn write(
        &mut self,
        index: &str,
        id: Option<&str>,
        source: Value,
        create_only: bool,
    ) -> std::result::Result<(String, Written), StoreError> {
        let i = self.ensure_index(index);
        let documents = &mut self.indices[i].documents;
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        match documents.iter_mut().find(|(doc_id, _)| *doc_id == id) {
            Some(_) if create_only => Err(StoreError {
                index: Some(index.to_string()),
                ..StoreError::new(
                    409,
                    "version_conflict_engine_exception",
                    format!("[{id}]: version conflict, document already exists"),
                )
            }),
            Some(existing) => {
                existing.1 = source;
                Ok((id, Written::Updated))
            }
            None => {
                documents.push((id.clone(), source));
                Ok((id, Written::Created))
            }
        }
    }

    fn index_document(
        &mut self,
        index: &str,
        id: Option<&str>,
        request: &TransportRequest,
    ) -> Handled {
        let source = parse_source(index, request.body.as_deref().unwrap_or_default())?;
        let create_only = request.get_param("op_type") == Some("create");
        let (id, written) = self.write(index, id, source, create_only)?;
        Ok(respond(
            written.status(),
            json!({ "_index": index, "_id": id, "result": written.result() }),
        ))
    }

    fn get_document(&self, index: &str, id: &str) -> Handled {
        let i = self
            .position(index)
            .ok_or_else(|| StoreError::index_not_found(index))?;
        let found = self.indices[i]
            .documents
            .iter()
            .find(|(doc_id, _)| doc_id == id);

        Ok(match found {
            Some((_, source)) => respond(
                200,
                json!({ "_index": index, "_id": id, "found": true, "_source": source }),
            ),
            None => respond(404, json!({ "_index": index, "_id": id, "found": false })),
        })
    }

    fn remove(&mut self, index: &str, id: &str) -> std::result::Result<bool, StoreError> {
        let i = self
            .position(index)
            .ok_or_else(|| StoreError::index_not_found(index))?;
        let documents = &mut self.indices[i].documents;
        let before = documents.len();
        documents.retain(|(doc_id, _)| doc_id != id);
        Ok(documents.len() != before)
    }

    fn delete_document(&mut self, index: &str, id: &str) -> Handled {
        Ok(if self.remove(index, id)? {
            respond(200, json!({ "_index": index, "_id": id, "result": "deleted" }))
        } else {
            respond(404, json!({ "_index": index, "_id": id, "result": "not_found" }))
        })
    }

    fn count(&self, indices: Option<&str>) -> Handled {
        let count: usize = self
            .resolve(indices)?
            .into_iter()
            .map(|i| self.indices[i].documents.len())
            .sum();
        Ok(respond(200, json!({ "count": count })))
    }

    fn search(&mut self, indices: Option<&str>, request: &TransportRequest) -> Handled {
        let mut hits: VecDeque<Value> = self
            .resolve(indices)?
            .into_iter()
            .flat_map(|i| {
                let index = &self.indices[i];
                index.documents.iter().map(move |(id, source)| {
                    json!({ "_index": index.name, "_id": id, "_score": 1.0, "_source": source })
                })
            })
            .collect();

        let total = hits.len();
        let size = param(request, "size").unwrap_or(DEFAULT_SEARCH_SIZE);
        let from = param(request, "from").unwrap_or(0).min(total);
        hits.drain(..from);

        let page: Vec<Value> = hits.drain(..size.min(hits.len())).collect();
        let mut body = hits_body(total, page);

        if request.get_param("scroll").is_some() {
            let scroll_id = uuid::Uuid::new_v4().simple().to_string();
            body["_scroll_id"] = scroll_id.clone().into();
            self.scrolls.insert(
                scroll_id,
                Cursor {
                    remaining: hits,
                    size,
                    total,
                },
            );
        }
        Ok(respond(200, body))
    }

    fn scroll(&mut self, request: &TransportRequest) -> Handled {
        let scroll_id = request
            .body
            .as_deref()
            .and_then(|body| serde_json::from_slice::<Value>(body).ok())
            .and_then(|body| body["scroll_id"].as_str().map(str::to_string))
            .or_else(|| request.get_param("scroll_id").map(str::to_string))
            .unwrap_or_default();

        let cursor = self.scrolls.get_mut(&scroll_id).ok_or_else(|| {
            StoreError::new(
                404,
                "search_context_missing_exception",
                format!("No search context found for id [{scroll_id}]"),
            )
        })?;

        let page: Vec<Value> = cursor
            .remaining
            .drain(..cursor.size.min(cursor.remaining.len()))
            .collect();
        let mut body = hits_body(cursor.total, page);
        body["_scroll_id"] = scroll_id.into();
        Ok(respond(200, body))
    }

    fn clear_scroll(&mut self, request: &TransportRequest) -> Handled {
        let ids: Vec<String> = match request
            .body
            .as_deref()
            .and_then(|body| serde_json::from_slice::<Value>(body).ok())
            .map(|body| body["scroll_id"].clone())
        {
            Some(Value::String(id)) if id == "_all" => self.scrolls.keys().cloned().collect(),
            Some(Value::String(id)) => vec![id],
            Some(Value::Array(ids)) => ids
                .iter()
                .filter_map(|id| id.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        let freed = ids
            .iter()
            .filter(|id| self.scrolls.remove(id.as_str()).is_some())
            .count();
        let status = if freed == 0 { 404 } else { 200 };
        Ok(respond(
            status,
            json!({ "succeeded": true, "num_freed": freed }),
        ))
    }

    fn bulk(&mut self, default_index: Option<&str>, request: &TransportRequest) -> Handled {
        let body = request.body.as_deref().unwrap_or_default();
        let mut lines = body
            .split(|b| *b == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace));

        let mut items = Vec::new();
        let mut errors = false;
        while let Some(line) = lines.next() {
            let (action, meta) = parse_action(line)?;
            let index = meta
                .get("_index")
                .and_then(Value::as_str)
                .or(default_index)
                .ok_or_else(|| {
                    StoreError::new(400, "action_request_validation_exception", "index is missing")
                })?
                .to_string();
            let id = meta.get("_id").and_then(Value::as_str).map(str::to_string);

            let outcome = match action.as_str() {
                "index" | "create" => {
                    let source = lines.next().unwrap_or_default();
                    parse_source(&index, source)
                        .and_then(|source| {
                            self.write(&index, id.as_deref(), source, action == "create")
                        })
                        .map(|(doc_id, written)| (doc_id, written.status(), written.result()))
                }
                "delete" => match id.as_deref() {
                    Some(doc_id) => self.remove(&index, doc_id).map(|removed| {
                        if removed {
                            (doc_id.to_string(), 200, "deleted")
                        } else {
                            (doc_id.to_string(), 404, "not_found")
                        }
                    }),
                    None => Err(StoreError::new(
                        400,
                        "action_request_validation_exception",
                        "id is missing",
                    )),
                },
                other => {
                    return Err(StoreError::new(
                        400,
                        "illegal_argument_exception",
                        format!("Unknown action [{other}]"),
                    ));
                }
            };

            let mut status = Map::new();
            status.insert("_index".into(), index.clone().into());
            match outcome {
                Ok((doc_id, code, result)) => {
                    status.insert("_id".into(), doc_id.into());
                    status.insert("status".into(), code.into());
                    status.insert("result".into(), result.into());
                }
                Err(err) => {
                    errors = true;
                    if let Some(id) = id {
                        status.insert("_id".into(), id.into());
                    }
                    status.insert("status".into(), err.status.into());
                    status.insert("error".into(), err.cause());
                }
            }
            items.push(json!({ action: status }));
        }

        Ok(respond(
            200,
            json!({ "took": 1, "errors": errors, "items": items }),
        ))
    }
}

fn parse_action(line: &[u8]) -> std::result::Result<(String, Map<String, Value>), StoreError> {
    let invalid = || {
        StoreError::new(
            400,
            "illegal_argument_exception",
            "Malformed action/metadata line",
        )
    };
    let Ok(Value::Object(action)) = serde_json::from_slice::<Value>(line) else {
        return Err(invalid());
    };
    let Some((name, Value::Object(meta))) = action.into_iter().next() else {
        return Err(invalid());
    };
    Ok((name, meta))
}

fn hits_body(total: usize, hits: Vec<Value>) -> Value {
    json!({
        "took": 1,
        "timed_out": false,
        "hits": {
            "total": { "value": total, "relation": "eq" },
            "max_score": 1.0,
            "hits": hits,
        }
    })
}
