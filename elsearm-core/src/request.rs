//! Request objects for the operations the indexer issues.
//!
//! Each typed request builds a [`TransportRequest`]: method, path, query
//! parameters and an optional body. Callers customize them through the
//! indexer's `*_with` methods.

use percent_encoding::{AsciiSet, CONTROLS, NON_ALPHANUMERIC, utf8_percent_encode};
use std::time::Duration;

/// Characters escaped in index names. `%` (already escaped input), `,`
/// (list separator), `*` (wildcards) and `:` (cluster prefixes) pass through.
const INDEX_NAME: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'|')
    .add(b'^')
    .add(b'+');

const DOCUMENT_ID: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// HEAD
    Head,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Method {
    /// Method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// Body content type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContentType {
    /// `application/json`
    #[default]
    Json,
    /// `application/x-ndjson`, used by the bulk API.
    NdJson,
}

impl ContentType {
    /// MIME type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::NdJson => "application/x-ndjson",
        }
    }
}

/// A request as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Path, already percent-encoded.
    pub path: String,
    /// Query string parameters.
    pub params: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// Content type of `body`.
    pub content_type: ContentType,
}

impl TransportRequest {
    /// Create a request without parameters or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
            content_type: ContentType::Json,
        }
    }

    /// Add a query parameter.
    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a query parameter when the value is present.
    pub fn param_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }

    /// Set the body.
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the body when present.
    pub fn body_opt(mut self, body: Option<Vec<u8>>) -> Self {
        self.body = body;
        self
    }

    /// Look up a query parameter.
    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether sending this request twice has the effect of sending it once.
    ///
    /// POST is idempotent only on the read endpoints `_search`, `_count` and
    /// `_search/scroll`. A POST to `_doc` or `_bulk` may create documents.
    pub fn is_idempotent(&self) -> bool {
        match self.method {
            Method::Post => {
                let path = self.path.trim_end_matches('/');
                path.ends_with("/_search")
                    || path.ends_with("/_count")
                    || path.ends_with("/_search/scroll")
            }
            Method::Get | Method::Head | Method::Put | Method::Delete => true,
        }
    }
}

/// Anything the indexer can execute.
pub trait Request {
    /// Build the transport request.
    fn to_transport(&self) -> TransportRequest;
}

impl Request for TransportRequest {
    fn to_transport(&self) -> TransportRequest {
        self.clone()
    }
}

/// Refresh policy for write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refresh {
    /// Refresh the affected shards immediately.
    True,
    /// Do not refresh.
    False,
    /// Wait for the next scheduled refresh.
    WaitFor,
}

impl Refresh {
    /// Parameter value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Refresh::True => "true",
            Refresh::False => "false",
            Refresh::WaitFor => "wait_for",
        }
    }
}

impl std::fmt::Display for Refresh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Percent-encode an index name for use in a path.
pub fn encode_index(name: &str) -> String {
    utf8_percent_encode(name, INDEX_NAME).to_string()
}

/// Percent-encode a document id for use in a path.
pub fn encode_id(id: &str) -> String {
    utf8_percent_encode(id, DOCUMENT_ID).to_string()
}

fn index_list(indices: &[String]) -> String {
    indices
        .iter()
        .map(|name| encode_index(name))
        .collect::<Vec<_>>()
        .join(",")
}

/// Format a duration as a time unit string (`30s`, `1500ms`).
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Create an index.
#[derive(Debug, Clone, Default)]
pub struct IndicesCreateRequest {
    /// Index name.
    pub index: String,
    /// Settings and mappings.
    pub body: Option<Vec<u8>>,
    /// Operation timeout.
    pub timeout: Option<Duration>,
    /// Number of active shards to wait for.
    pub wait_for_active_shards: Option<String>,
}

impl Request for IndicesCreateRequest {
    fn to_transport(&self) -> TransportRequest {
        TransportRequest::new(Method::Put, format!("/{}", encode_index(&self.index)))
            .param_opt("timeout", self.timeout.map(format_duration))
            .param_opt(
                "wait_for_active_shards",
                self.wait_for_active_shards.as_deref(),
            )
            .body_opt(self.body.clone())
    }
}

/// Check whether indices exist.
#[derive(Debug, Clone, Default)]
pub struct IndicesExistsRequest {
    /// Index names.
    pub index: Vec<String>,
    /// Whether wildcards matching nothing count as existing.
    pub allow_no_indices: Option<bool>,
}

impl Request for IndicesExistsRequest {
    fn to_transport(&self) -> TransportRequest {
        TransportRequest::new(Method::Head, format!("/{}", index_list(&self.index)))
            .param_opt("allow_no_indices", self.allow_no_indices)
    }
}

/// Delete indices.
#[derive(Debug, Clone, Default)]
pub struct IndicesDeleteRequest {
    /// Index names.
    pub index: Vec<String>,
    /// Ignore missing indices.
    pub ignore_unavailable: Option<bool>,
    /// Operation timeout.
    pub timeout: Option<Duration>,
}

impl Request for IndicesDeleteRequest {
    fn to_transport(&self) -> TransportRequest {
        TransportRequest::new(Method::Delete, format!("/{}", index_list(&self.index)))
            .param_opt("ignore_unavailable", self.ignore_unavailable)
            .param_opt("timeout", self.timeout.map(format_duration))
    }
}

/// Create or replace a document.
#[derive(Debug, Clone, Default)]
pub struct IndexRequest {
    /// Index name.
    pub index: String,
    /// Document id; the store assigns one when absent.
    pub document_id: Option<String>,
    /// Document body.
    pub body: Vec<u8>,
    /// Refresh policy.
    pub refresh: Option<Refresh>,
    /// Routing value.
    pub routing: Option<String>,
    /// Fail instead of replacing an existing document.
    pub create_only: bool,
}

impl Request for IndexRequest {
    fn to_transport(&self) -> TransportRequest {
        let index = encode_index(&self.index);
        let request = match &self.document_id {
            Some(id) => {
                TransportRequest::new(Method::Put, format!("/{index}/_doc/{}", encode_id(id)))
            }
            None => TransportRequest::new(Method::Post, format!("/{index}/_doc")),
        };
        request
            .param_opt("refresh", self.refresh)
            .param_opt("routing", self.routing.as_deref())
            .param_opt("op_type", self.create_only.then_some("create"))
            .body(self.body.clone())
    }
}

/// Fetch a document.
#[derive(Debug, Clone, Default)]
pub struct GetRequest {
    /// Index name.
    pub index: String,
    /// Document id.
    pub document_id: String,
    /// Routing value.
    pub routing: Option<String>,
    /// Shard preference.
    pub preference: Option<String>,
    /// Whether to read in realtime.
    pub realtime: Option<bool>,
}

impl Request for GetRequest {
    fn to_transport(&self) -> TransportRequest {
        TransportRequest::new(
            Method::Get,
            format!(
                "/{}/_doc/{}",
                encode_index(&self.index),
                encode_id(&self.document_id)
            ),
        )
        .param_opt("routing", self.routing.as_deref())
        .param_opt("preference", self.preference.as_deref())
        .param_opt("realtime", self.realtime)
    }
}

/// Delete a document.
#[derive(Debug, Clone, Default)]
pub struct DeleteRequest {
    /// Index name.
    pub index: String,
    /// Document id.
    pub document_id: String,
    /// Refresh policy.
    pub refresh: Option<Refresh>,
    /// Routing value.
    pub routing: Option<String>,
}

impl Request for DeleteRequest {
    fn to_transport(&self) -> TransportRequest {
        TransportRequest::new(
            Method::Delete,
            format!(
                "/{}/_doc/{}",
                encode_index(&self.index),
                encode_id(&self.document_id)
            ),
        )
        .param_opt("refresh", self.refresh)
        .param_opt("routing", self.routing.as_deref())
    }
}

/// Count documents.
#[derive(Debug, Clone, Default)]
pub struct CountRequest {
    /// Index names.
    pub index: Vec<String>,
    /// Query body.
    pub body: Option<Vec<u8>>,
    /// Query in query-string syntax.
    pub query: Option<String>,
}

impl Request for CountRequest {
    fn to_transport(&self) -> TransportRequest {
        let method = if self.body.is_some() {
            Method::Post
        } else {
            Method::Get
        };
        TransportRequest::new(method, format!("{}/_count", prefix_path(&self.index)))
            .param_opt("q", self.query.as_deref())
            .body_opt(self.body.clone())
    }
}

/// Search documents.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// Index names; all indices when empty.
    pub index: Vec<String>,
    /// Query body.
    pub body: Option<Vec<u8>>,
    /// Maximum number of hits.
    pub size: Option<usize>,
    /// Offset of the first hit.
    pub from: Option<usize>,
    /// Keep a scroll context alive for this long.
    pub scroll: Option<Duration>,
    /// Sort clauses, `field:direction`.
    pub sort: Vec<String>,
    /// Query in query-string syntax.
    pub query: Option<String>,
    /// Whether to count hits accurately.
    pub track_total_hits: Option<bool>,
}

impl Request for SearchRequest {
    fn to_transport(&self) -> TransportRequest {
        let sort = (!self.sort.is_empty()).then(|| self.sort.join(","));
        TransportRequest::new(Method::Post, format!("{}/_search", prefix_path(&self.index)))
            .param_opt("size", self.size)
            .param_opt("from", self.from)
            .param_opt("scroll", self.scroll.map(format_duration))
            .param_opt("sort", sort)
            .param_opt("q", self.query.as_deref())
            .param_opt("track_total_hits", self.track_total_hits)
            .body_opt(self.body.clone())
    }
}

/// Fetch the next page of a scroll.
#[derive(Debug, Clone, Default)]
pub struct ScrollRequest {
    /// Scroll context id.
    pub scroll_id: String,
    /// Keep the context alive for this long.
    pub scroll: Option<Duration>,
}

impl Request for ScrollRequest {
    fn to_transport(&self) -> TransportRequest {
        let mut body = serde_json::json!({ "scroll_id": self.scroll_id });
        if let Some(scroll) = self.scroll {
            body["scroll"] = format_duration(scroll).into();
        }
        TransportRequest::new(Method::Post, "/_search/scroll").body(body.to_string().into_bytes())
    }
}

/// Release scroll contexts.
#[derive(Debug, Clone, Default)]
pub struct ClearScrollRequest {
    /// Scroll context ids.
    pub scroll_id: Vec<String>,
}

impl Request for ClearScrollRequest {
    fn to_transport(&self) -> TransportRequest {
        let body = serde_json::json!({ "scroll_id": self.scroll_id });
        TransportRequest::new(Method::Delete, "/_search/scroll").body(body.to_string().into_bytes())
    }
}

/// Submit newline-delimited bulk actions.
#[derive(Debug, Clone, Default)]
pub struct BulkRequest {
    /// Default index for actions that name none.
    pub index: Option<String>,
    /// NDJSON body.
    pub body: Vec<u8>,
    /// Refresh policy.
    pub refresh: Option<Refresh>,
}

impl Request for BulkRequest {
    fn to_transport(&self) -> TransportRequest {
        let path = match &self.index {
            Some(index) => format!("/{}/_bulk", encode_index(index)),
            None => "/_bulk".to_string(),
        };
        let mut request = TransportRequest::new(Method::Post, path)
            .param_opt("refresh", self.refresh)
            .body(self.body.clone());
        request.content_type = ContentType::NdJson;
        request
    }
}

fn prefix_path(indices: &[String]) -> String {
    if indices.is_empty() {
        String::new()
    } else {
        format!("/{}", index_list(indices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_request_paths() {
        let mut req = IndexRequest {
            index: "user".into(),
            body: b"{}".to_vec(),
            ..Default::default()
        };
        let t = req.to_transport();
        assert_eq!(t.method, Method::Post);
        assert_eq!(t.path, "/user/_doc");

        req.document_id = Some("a/b".into());
        req.refresh = Some(Refresh::WaitFor);
        let t = req.to_transport();
        assert_eq!(t.method, Method::Put);
        assert_eq!(t.path, "/user/_doc/a%2Fb");
        assert_eq!(t.get_param("refresh"), Some("wait_for"));
        assert_eq!(t.body.as_deref(), Some(&b"{}"[..]));
    }

    #[test]
    fn test_date_math_index_is_encoded() {
        assert_eq!(
            encode_index("<logs-{now/d}>"),
            "%3Clogs-%7Bnow%2Fd%7D%3E"
        );
        assert_eq!(
            encode_index("%3Clogs-%7Bnow%2Fd%7D%3E"),
            "%3Clogs-%7Bnow%2Fd%7D%3E"
        );

        let req = IndicesExistsRequest {
            index: vec!["a".into(), "<b-{now/d}>".into()],
            ..Default::default()
        };
        assert_eq!(req.to_transport().path, "/a,%3Cb-%7Bnow%2Fd%7D%3E");
    }

    #[test]
    fn test_search_request_params() {
        let req = SearchRequest {
            index: vec!["user".into(), "team".into()],
            size: Some(1),
            scroll: Some(Duration::from_secs(60)),
            sort: vec!["name:asc".into()],
            ..Default::default()
        };
        let t = req.to_transport();
        assert_eq!(t.method, Method::Post);
        assert_eq!(t.path, "/user,team/_search");
        assert_eq!(t.get_param("size"), Some("1"));
        assert_eq!(t.get_param("scroll"), Some("60s"));
        assert_eq!(t.get_param("sort"), Some("name:asc"));
        assert_eq!(t.get_param("from"), None);

        assert_eq!(SearchRequest::default().to_transport().path, "/_search");
    }

    #[test]
    fn test_scroll_request_body() {
        let req = ScrollRequest {
            scroll_id: "abc".into(),
            scroll: Some(Duration::from_millis(1500)),
        };
        let t = req.to_transport();
        let body: serde_json::Value = serde_json::from_slice(t.body.as_deref().unwrap()).unwrap();
        assert_eq!(t.path, "/_search/scroll");
        assert_eq!(body["scroll_id"], "abc");
        assert_eq!(body["scroll"], "1500ms");
    }

    #[test]
    fn test_count_method_depends_on_body() {
        let mut req = CountRequest {
            index: vec!["user".into()],
            ..Default::default()
        };
        assert_eq!(req.to_transport().method, Method::Get);
        req.body = Some(br#"{"query":{"match_all":{}}}"#.to_vec());
        assert_eq!(req.to_transport().method, Method::Post);
        assert_eq!(req.to_transport().path, "/user/_count");
    }

    #[test]
    fn test_bulk_request_is_ndjson() {
        let req = BulkRequest {
            body: b"{}\n".to_vec(),
            ..Default::default()
        };
        let t = req.to_transport();
        assert_eq!(t.path, "/_bulk");
        assert_eq!(t.content_type, ContentType::NdJson);
    }

    #[test]
    fn test_idempotent_requests() {
        let search = SearchRequest {
            index: vec!["user".into()],
            ..Default::default()
        };
        assert!(search.to_transport().is_idempotent());
        assert!(ScrollRequest::default().to_transport().is_idempotent());

        let create = IndexRequest {
            index: "user".into(),
            body: b"{}".to_vec(),
            ..Default::default()
        };
        assert!(!create.to_transport().is_idempotent());

        let replace = IndexRequest {
            document_id: Some("1".into()),
            ..create
        };
        assert!(replace.to_transport().is_idempotent());

        let bulk = BulkRequest::default();
        assert!(!bulk.to_transport().is_idempotent());
    }
}
