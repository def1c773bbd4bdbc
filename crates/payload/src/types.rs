//! Core payload types.
//!
//! A [`CatalogPayload`] is a JSON object holding exactly one primary items
//! collection (see [`ItemsKey`]) plus any number of metadata keys that travel
//! with it. The object is kept as a [`serde_json::Map`] so keys the platform
//! understands but this crate does not (for instance `delete`) pass through
//! untouched and in their original order.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PayloadError;

/// Accepted spellings of the document identifier field, canonical first.
pub const DOCUMENT_ID_KEYS: [&str; 2] = ["documentId", "DocumentId"];
/// Accepted spellings of the object type field, canonical first.
pub const OBJECT_TYPE_KEYS: [&str; 2] = ["objecttype", "ObjectType"];
/// Accepted spellings of the bare-identifier delete list, canonical first.
pub const DELETE_KEYS: [&str; 2] = ["delete", "Delete"];

/// The key holding the primary items collection of a payload.
///
/// Detection follows a fixed priority: `addOrUpdate`, `AddOrUpdate`,
/// `partialUpdate`, `addOrMerge`. The first key present wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ItemsKey {
    AddOrUpdate,
    /// Legacy capitalised spelling of `addOrUpdate`.
    AddOrUpdateLegacy,
    PartialUpdate,
    AddOrMerge,
}

impl ItemsKey {
    /// Detection order used by the chunker and the normalizer.
    pub const PRIORITY: [ItemsKey; 4] = [
        ItemsKey::AddOrUpdate,
        ItemsKey::AddOrUpdateLegacy,
        ItemsKey::PartialUpdate,
        ItemsKey::AddOrMerge,
    ];

    /// Keys that carry full catalog items (as opposed to partial-update operations).
    pub const CATALOG_ITEMS: [ItemsKey; 3] = [
        ItemsKey::AddOrUpdate,
        ItemsKey::AddOrUpdateLegacy,
        ItemsKey::AddOrMerge,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ItemsKey::AddOrUpdate => "addOrUpdate",
            ItemsKey::AddOrUpdateLegacy => "AddOrUpdate",
            ItemsKey::PartialUpdate => "partialUpdate",
            ItemsKey::AddOrMerge => "addOrMerge",
        }
    }

    /// The spelling the platform expects on the wire.
    pub fn canonical(self) -> ItemsKey {
        match self {
            ItemsKey::AddOrUpdateLegacy => ItemsKey::AddOrUpdate,
            other => other,
        }
    }

    pub fn is_partial_update(self) -> bool {
        matches!(self, ItemsKey::PartialUpdate)
    }

    pub(crate) fn expected_list(keys: &[ItemsKey]) -> String {
        keys.iter()
            .map(|key| key.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A catalog document as submitted to the platform.
///
/// # Examples
///
/// ```rust
/// use payload::{CatalogPayload, ItemsKey};
/// use serde_json::json;
///
/// let payload = CatalogPayload::from_value(json!({
///     "AddOrUpdate": [{"DocumentId": "product://001", "ObjectType": "Product"}],
///     "Delete": ["product://old"]
/// }))
/// .unwrap();
///
/// assert_eq!(payload.items_key(), Some(ItemsKey::AddOrUpdateLegacy));
/// assert_eq!(payload.item_count(), 1);
/// assert_eq!(payload.delete_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogPayload(Map<String, Value>);

impl CatalogPayload {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Wraps a JSON value, rejecting anything that is not an object.
    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(PayloadError::NotAnObject),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PayloadError> {
        let value: Value = serde_json::from_reader(reader)?;
        Self::from_value(value)
    }

    /// Loads a payload file from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, PayloadError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|err| PayloadError::Io(format!("{}: {err}", path.display())))?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// The primary items key, if any, following [`ItemsKey::PRIORITY`].
    pub fn items_key(&self) -> Option<ItemsKey> {
        ItemsKey::PRIORITY
            .into_iter()
            .find(|key| self.0.contains_key(key.as_str()))
    }

    /// The primary items collection when it is an array.
    pub fn items(&self) -> Option<&Vec<Value>> {
        self.items_key()
            .and_then(|key| self.0.get(key.as_str()))
            .and_then(Value::as_array)
    }

    pub fn item_count(&self) -> usize {
        self.items().map_or(0, Vec::len)
    }

    /// Number of bare identifiers under `delete`/`Delete`.
    pub fn delete_count(&self) -> usize {
        DELETE_KEYS
            .iter()
            .find_map(|key| self.0.get(*key))
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    /// True when the payload contains any recognised items key.
    pub fn is_catalog_data(&self) -> bool {
        self.items_key().is_some()
    }

    /// Compact serialization; the byte length is the basis for chunking decisions.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PayloadError> {
        Ok(serde_json::to_vec(&self.0)?)
    }

    pub fn serialized_len(&self) -> Result<usize, PayloadError> {
        self.to_bytes().map(|bytes| bytes.len())
    }

    /// Item distribution per object type; items without one count as `Unknown`.
    pub fn object_type_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for item in self.items().into_iter().flatten() {
            let object_type = item
                .as_object()
                .and_then(|obj| first_string(obj, &OBJECT_TYPE_KEYS))
                .unwrap_or("Unknown")
                .to_string();
            *counts.entry(object_type).or_insert(0) += 1;
        }
        counts
    }

    /// Operation distribution per operator for `partialUpdate` payloads.
    pub fn operator_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        let operations = self
            .0
            .get(ItemsKey::PartialUpdate.as_str())
            .and_then(Value::as_array);
        for op in operations.into_iter().flatten() {
            if let Some(operator) = op.get("operator").and_then(Value::as_str) {
                *counts.entry(operator.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }
}

impl From<CatalogPayload> for Value {
    fn from(value: CatalogPayload) -> Self {
        value.into_value()
    }
}

/// Returns the first non-empty string found under any of `keys`.
pub(crate) fn first_string<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| obj.get(*key).and_then(Value::as_str))
        .find(|value| !value.is_empty())
}

/// Returns the first value under any of `keys` that is set to something
/// other than null, `false`, zero, or an empty string, array or object.
pub(crate) fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| match value {
            Value::Null => false,
            Value::Bool(flag) => *flag,
            Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn items_key_follows_priority() {
        let payload = CatalogPayload::from_value(json!({
            "addOrMerge": [],
            "AddOrUpdate": [{"DocumentId": "a"}],
        }))
        .unwrap();
        assert_eq!(payload.items_key(), Some(ItemsKey::AddOrUpdateLegacy));

        let payload = CatalogPayload::from_value(json!({"delete": ["x"]})).unwrap();
        assert_eq!(payload.items_key(), None);
        assert!(!payload.is_catalog_data());
    }

    #[test]
    fn rejects_non_objects() {
        assert_eq!(
            CatalogPayload::from_value(json!([1, 2])),
            Err(PayloadError::NotAnObject)
        );
        assert!(matches!(
            CatalogPayload::from_slice(b"{\"addOrUpdate\": ["),
            Err(PayloadError::InvalidJson(_))
        ));
    }

    #[test]
    fn counts_object_types() {
        let payload = CatalogPayload::from_value(json!({
            "addOrUpdate": [
                {"documentId": "product://1", "objecttype": "Product"},
                {"documentId": "product://2", "objecttype": "Product"},
                {"documentId": "variant://1", "ObjectType": "Variant"},
                {"documentId": "misc://1"}
            ]
        }))
        .unwrap();

        let counts = payload.object_type_counts();
        assert_eq!(counts.get("Product"), Some(&2));
        assert_eq!(counts.get("Variant"), Some(&1));
        assert_eq!(counts.get("Unknown"), Some(&1));
    }

    #[test]
    fn counts_operators() {
        let payload = CatalogPayload::from_value(json!({
            "partialUpdate": [
                {"documentId": "a", "operator": "fieldValueReplace", "field": "ec_price", "value": 1},
                {"documentId": "b", "operator": "fieldValueReplace", "field": "ec_price", "value": 2},
                {"documentId": "s", "operator": "arrayAppend", "field": "ec_available_items", "value": ["x"]}
            ]
        }))
        .unwrap();
        let counts = payload.operator_counts();
        assert_eq!(counts.get("fieldValueReplace"), Some(&2));
        assert_eq!(counts.get("arrayAppend"), Some(&1));
    }

    #[test]
    fn compact_bytes_have_no_whitespace() {
        let payload = CatalogPayload::from_value(json!({"addOrUpdate": [{"a": 1}]})).unwrap();
        let bytes = payload.to_bytes().unwrap();
        assert_eq!(bytes, br#"{"addOrUpdate":[{"a":1}]}"#);
    }
}
