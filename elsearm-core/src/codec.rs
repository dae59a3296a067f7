//! Document body encoding and decoding.

use crate::{
    error::{Error, Result},
    model::Model,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Encode a record as a document body, honoring a custom
/// [`Model::document_body`].
///
/// An absent record is an [`Error::EmptyDocument`].
pub fn document_body<M: Model>(model: Option<&M>) -> Result<Vec<u8>> {
    match model {
        Some(model) => model.document_body(),
        None => Err(Error::EmptyDocument),
    }
}

/// Decode a document body into a record, honoring a custom
/// [`Model::parse_document`].
///
/// Decoding into an absent record does nothing.
pub fn parse_document<M: Model>(model: Option<&mut M>, body: &[u8]) -> Result<()> {
    match model {
        Some(model) => model.parse_document(body),
        None => Ok(()),
    }
}

/// Default body encoding: JSON.
///
/// A record that serializes to `null` is an [`Error::EmptyDocument`].
pub fn default_document_body<M: Serialize + ?Sized>(model: &M) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(model)?;
    if body == b"null" {
        return Err(Error::EmptyDocument);
    }
    Ok(body)
}

/// Default body decoding: JSON, decoded into the existing record.
///
/// Fields the body does not carry keep their previous values, including
/// `#[serde(skip)]` fields. Nested objects are merged the same way; arrays
/// and scalars are replaced.
pub fn default_parse_document<M>(model: &mut M, body: &[u8]) -> Result<()>
where
    M: Serialize + DeserializeOwned,
{
    let incoming: Value = serde_json::from_slice(body)?;
    let merged = match (serde_json::to_value(&*model)?, incoming) {
        (Value::Object(mut current), Value::Object(incoming)) => {
            overlay(&mut current, incoming);
            Value::Object(current)
        }
        (_, incoming) => incoming,
    };
    Deserialize::deserialize_in_place(merged, model)?;
    Ok(())
}

fn overlay(current: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        match value {
            Value::Object(nested) => match current.get_mut(&key) {
                Some(Value::Object(existing)) => overlay(existing, nested),
                _ => {
                    current.insert(key, Value::Object(nested));
                }
            },
            value => {
                current.insert(key, value);
            }
        }
    }
}
