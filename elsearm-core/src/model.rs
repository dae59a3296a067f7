//! The model trait and its optional capabilities.

use crate::{codec, error::Result, naming};
use serde::{Serialize, de::DeserializeOwned};

/// A record that can be stored as a document.
///
/// Every method has a convention-based default, so an empty impl is enough for
/// most types. Each method is an independent capability: override only the
/// ones the type needs.
///
/// | Capability | Default |
/// |------------|---------|
/// | [`index_name`](Model::index_name) | type name in snake case |
/// | [`search_index_names`](Model::search_index_names) | `[index_name()]` |
/// | [`document_id`](Model::document_id) | the `id` or `ID` field |
/// | [`document_body`](Model::document_body) / [`parse_document`](Model::parse_document) | JSON |
/// | [`set_document_id`](Model::set_document_id) | ignored unless [`AUTOMATIC_ID`](Model::AUTOMATIC_ID) |
///
/// The global prefix and suffix are applied by the naming functions, not by
/// these methods.
///
/// # Example
///
/// ```rust
/// use elsearm_core::Model;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct UserProfile {
///     id: u64,
///     name: String,
/// }
///
/// impl Model for UserProfile {}
///
/// let user = UserProfile { id: 7, name: "Alice".into() };
/// assert_eq!(user.index_name(), "user_profile");
/// assert_eq!(user.document_id().unwrap().as_deref(), Some("7"));
/// ```
pub trait Model: Serialize + DeserializeOwned + Send + Sync {
    /// Whether the store assigns this record's id.
    ///
    /// When set, the id returned by a create-without-id, and the `_id` of
    /// fetched and searched documents, is written back through
    /// [`set_document_id`](Model::set_document_id).
    const AUTOMATIC_ID: bool = false;

    /// Index this record is stored in, before prefix and suffix.
    fn index_name(&self) -> String {
        naming::default_index_name::<Self>()
    }

    /// Indices searched for records of this type, before prefix and suffix.
    fn search_index_names(&self) -> Vec<String> {
        vec![self.index_name()]
    }

    /// Document id of this record.
    ///
    /// `Ok(None)` means the record has no id field. Return
    /// [`Error::UnknownDocumentId`](crate::Error::UnknownDocumentId) when the
    /// record has an id that is not known yet.
    fn document_id(&self) -> Result<Option<String>> {
        naming::default_document_id(self)
    }

    /// Encode this record as a document body.
    fn document_body(&self) -> Result<Vec<u8>> {
        codec::default_document_body(self)
    }

    /// Decode a document body into this record.
    ///
    /// The default keeps fields the body does not carry.
    fn parse_document(&mut self, body: &[u8]) -> Result<()> {
        codec::default_parse_document(self, body)
    }

    /// Store an id assigned by the search engine.
    fn set_document_id(&mut self, id: &str) -> Result<()> {
        let _ = id;
        Ok(())
    }
}
