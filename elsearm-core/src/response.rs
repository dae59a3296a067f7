//! Response envelopes returned by the search engine.
//!
//! Only the fields this crate consumes are modelled. Every field defaults so
//! that partial envelopes (for example a 404 without an `error` object) still
//! decode.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;

/// Error response envelope.
///
/// ```json
/// { "status": 400, "error": { "type": "...", "reason": "...",
///   "root_cause": [ { "type": "...", "reason": "..." } ],
///   "caused_by": { "type": "...", "reason": "..." } } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status reported by the store.
    #[serde(default)]
    pub status: u16,
    /// Error details.
    #[serde(default, rename = "error", deserialize_with = "deserialize_detail")]
    pub detail: ErrorDetail,
}

/// Body of the `error` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Error type, e.g. `resource_already_exists_exception`.
    #[serde(default, rename = "type")]
    pub error_type: String,
    /// Human readable reason.
    #[serde(default)]
    pub reason: String,
    /// Root causes.
    #[serde(default)]
    pub root_cause: Vec<ErrorCause>,
    /// Wrapped cause.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<ErrorCause>,
}

/// A single cause inside an error envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCause {
    /// Error type.
    #[serde(default, rename = "type")]
    pub error_type: String,
    /// Human readable reason.
    #[serde(default)]
    pub reason: String,
}

// Some endpoints answer `"error": "reason text"` instead of an object.
fn deserialize_detail<'de, D>(deserializer: D) -> std::result::Result<ErrorDetail, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Detail {
        Object(ErrorDetail),
        Reason(String),
    }

    Ok(match Detail::deserialize(deserializer)? {
        Detail::Object(detail) => detail,
        Detail::Reason(reason) => ErrorDetail {
            reason,
            ..Default::default()
        },
    })
}

impl ErrorResponse {
    /// Build an envelope for an error answer that carried no body.
    pub fn from_status(status: u16) -> Self {
        Self {
            status,
            detail: ErrorDetail::default(),
        }
    }

    /// User-facing message: the reason, or the status when there is none.
    pub fn message(&self) -> String {
        if self.detail.reason.is_empty() {
            format!("request failed with status {}", self.status)
        } else {
            self.detail.reason.clone()
        }
    }

    /// HTTP status.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Error type.
    pub fn error_type(&self) -> &str {
        &self.detail.error_type
    }

    /// Human readable reason.
    pub fn reason(&self) -> &str {
        &self.detail.reason
    }

    /// Root causes.
    pub fn root_causes(&self) -> &[ErrorCause] {
        &self.detail.root_cause
    }

    /// Wrapped cause.
    pub fn caused_by(&self) -> Option<&ErrorCause> {
        self.detail.caused_by.as_ref()
    }

    /// Whether the index or document does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status == 404 || self.detail.error_type == "index_not_found_exception"
    }

    /// Whether the resource (usually an index) already exists.
    pub fn is_resource_already_exists(&self) -> bool {
        self.detail.error_type == "resource_already_exists_exception"
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for ErrorResponse {}

/// Accuracy of a hit total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalRelation {
    /// The total is exact.
    #[default]
    Eq,
    /// The total is a lower bound.
    Gte,
}

impl TotalRelation {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TotalRelation::Eq => "eq",
            TotalRelation::Gte => "gte",
        }
    }
}

/// Response of the search and scroll APIs.
#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    /// Scroll context, when scrolling.
    #[serde(default, rename = "_scroll_id")]
    pub scroll_id: Option<String>,
    /// Hits envelope.
    #[serde(default)]
    pub hits: Hits,
}

/// The `hits` object of a search response.
#[derive(Debug, Default, Deserialize)]
pub struct Hits {
    /// Total matching documents.
    #[serde(default)]
    pub total: HitsTotal,
    /// Returned documents in result order.
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// Hit total and its accuracy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct HitsTotal {
    /// Total value.
    #[serde(default)]
    pub value: u64,
    /// Accuracy.
    #[serde(default)]
    pub relation: TotalRelation,
}

/// A single search hit.
#[derive(Debug, Deserialize)]
pub struct Hit {
    /// Index the document lives in.
    #[serde(default, rename = "_index")]
    pub index: Option<String>,
    /// Document ID.
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
    /// Raw document body.
    #[serde(default, rename = "_source")]
    pub source: Option<Box<RawValue>>,
}

impl Hit {
    /// Raw body bytes; empty when the hit carries no source.
    pub fn source_bytes(&self) -> &[u8] {
        self.source
            .as_deref()
            .map(|raw| raw.get().as_bytes())
            .unwrap_or_default()
    }
}

/// Response of the get API.
#[derive(Debug, Default, Deserialize)]
pub struct GetResponse {
    /// Index name.
    #[serde(default, rename = "_index")]
    pub index: Option<String>,
    /// Document ID.
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
    /// Whether the document was found.
    #[serde(default)]
    pub found: bool,
    /// Raw document body.
    #[serde(default, rename = "_source")]
    pub source: Option<Box<RawValue>>,
}

/// Response of the index API.
#[derive(Debug, Default, Deserialize)]
pub struct IndexResponse {
    /// Index name.
    #[serde(default, rename = "_index")]
    pub index: Option<String>,
    /// Document ID, assigned by the store when none was sent.
    #[serde(default, rename = "_id")]
    pub id: Option<String>,
    /// `created` or `updated`.
    #[serde(default)]
    pub result: Option<String>,
}

/// Response of the count API.
#[derive(Debug, Default, Deserialize)]
pub struct CountResponse {
    /// Number of matching documents.
    #[serde(default)]
    pub count: u64,
}

/// Metadata of a search or scroll page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    /// Scroll context to continue with, if the search was scrolled.
    pub scroll_id: Option<String>,
    /// Total number of hits.
    pub total: u64,
    /// Accuracy of `total`.
    pub total_relation: TotalRelation,
}

impl SearchResult {
    /// Whether `total` is exact rather than a lower bound.
    pub fn is_exact(&self) -> bool {
        self.total_relation == TotalRelation::Eq
    }
}

impl From<&SearchResponse> for SearchResult {
    fn from(res: &SearchResponse) -> Self {
        Self {
            scroll_id: res.scroll_id.clone(),
            total: res.hits.total.value,
            total_relation: res.hits.total.relation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_full_envelope() {
        let body = r#"{
            "error": {
                "root_cause": [
                    {
                        "type": "x_content_parse_exception",
                        "reason": "[24:30] [date_histogram] failed to parse field [calendar_interval]"
                    }
                ],
                "type": "x_content_parse_exception",
                "reason": "[24:30] [date_histogram] failed to parse field [calendar_interval]",
                "caused_by": {
                    "type": "illegal_argument_exception",
                    "reason": "The supplied interval [10d] could not be parsed as a calendar interval."
                }
            },
            "status": 400
        }"#;

        let res: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(res.status(), 400);
        assert_eq!(res.error_type(), "x_content_parse_exception");
        assert_eq!(res.root_causes().len(), 1);
        assert_eq!(
            res.caused_by().map(|c| c.error_type.as_str()),
            Some("illegal_argument_exception")
        );
        assert_eq!(
            res.to_string(),
            "[24:30] [date_histogram] failed to parse field [calendar_interval]"
        );
    }

    #[test]
    fn test_error_response_partial_envelope() {
        let res: ErrorResponse =
            serde_json::from_str(r#"{"_index":"user","_id":"1","found":false}"#).unwrap();
        assert_eq!(res.status(), 0);
        assert!(res.reason().is_empty());

        let res: ErrorResponse =
            serde_json::from_str(r#"{"error":"alias [x] missing","status":404}"#).unwrap();
        assert_eq!(res.reason(), "alias [x] missing");
        assert!(res.is_not_found());
    }

    #[test]
    fn test_error_response_message_falls_back_to_status() {
        assert_eq!(
            ErrorResponse::from_status(503).to_string(),
            "request failed with status 503"
        );
    }

    #[test]
    fn test_search_response_keeps_raw_sources() {
        let body = r#"{
            "_scroll_id": "abc",
            "hits": {
                "total": { "value": 10000, "relation": "gte" },
                "hits": [
                    { "_index": "user", "_id": "1", "_source": {"id":1,"name":"Alice"} },
                    { "_index": "user", "_id": "2" }
                ]
            }
        }"#;

        let res: SearchResponse = serde_json::from_str(body).unwrap();
        let meta = SearchResult::from(&res);
        assert_eq!(meta.scroll_id.as_deref(), Some("abc"));
        assert_eq!(meta.total, 10000);
        assert!(!meta.is_exact());

        assert_eq!(res.hits.hits[0].source_bytes(), br#"{"id":1,"name":"Alice"}"#);
        assert!(res.hits.hits[1].source_bytes().is_empty());
    }

    #[test]
    fn test_count_response_defaults_to_zero() {
        let res: CountResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(res.count, 0);
    }
}
