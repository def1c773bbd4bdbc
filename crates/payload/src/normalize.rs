//! Format validation and normalization at the payload boundary.
//!
//! Catalog files arrive in two key-casing conventions (`AddOrUpdate` /
//! `DocumentId` / `ObjectType` and `addOrUpdate` / `documentId` /
//! `objecttype`). This module validates either and rewrites it once into the
//! canonical lower-camel shape, so nothing downstream has to care about casing.
//!
//! ```text
//! CatalogPayload (either casing)
//!        │
//!        ▼
//! ┌─────────────────────────────┐
//! │ 1. Detect items key         │
//! │ 2. Validate every entry     │
//! │    - items: id + type       │
//! │    - ops: id/operator/field │
//! │ 3. Rename legacy keys       │
//! └─────────────────────────────┘
//!        │
//!        ▼
//! CatalogPayload (canonical)
//! ```
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::PayloadError;
use crate::partial::Operator;
use crate::types::{
    first_present, CatalogPayload, ItemsKey, DELETE_KEYS, DOCUMENT_ID_KEYS, OBJECT_TYPE_KEYS,
};

/// Validates and canonicalizes a payload of either flavour.
///
/// `partialUpdate` payloads have their operations checked; every other payload
/// goes through [`normalize_catalog`].
///
/// # Examples
///
/// ```rust
/// use payload::{normalize, CatalogPayload};
/// use serde_json::json;
///
/// let raw = CatalogPayload::from_value(json!({
///     "AddOrUpdate": [{"DocumentId": "product://001", "ObjectType": "Product", "ec_price": 10}]
/// }))
/// .unwrap();
///
/// let normalized = normalize(raw).unwrap();
/// assert_eq!(
///     normalized.into_value(),
///     json!({"addOrUpdate": [{"documentId": "product://001", "objecttype": "Product", "ec_price": 10}]})
/// );
/// ```
pub fn normalize(payload: CatalogPayload) -> Result<CatalogPayload, PayloadError> {
    match payload.items_key() {
        Some(ItemsKey::PartialUpdate) => {
            validate_partial_update(&payload)?;
            Ok(payload)
        }
        _ => normalize_catalog(payload),
    }
}

/// True when the payload carries any recognised items key.
pub fn check_compatibility(payload: &CatalogPayload) -> bool {
    payload.is_catalog_data()
}

/// Checks that the payload carries catalog items and that each item names a
/// document id and an object type under either casing.
pub fn validate_catalog(payload: &CatalogPayload) -> Result<(), PayloadError> {
    let map = payload.as_map();
    let key = ItemsKey::CATALOG_ITEMS
        .into_iter()
        .find(|key| map.contains_key(key.as_str()))
        .ok_or_else(|| PayloadError::MissingItems {
            expected: ItemsKey::expected_list(&ItemsKey::CATALOG_ITEMS),
        })?;

    let items = map
        .get(key.as_str())
        .and_then(Value::as_array)
        .ok_or_else(|| PayloadError::ItemsNotArray {
            key: key.as_str().to_string(),
        })?;

    // Repeated document ids are accepted; the platform keeps the last write.
    for (index, item) in items.iter().enumerate() {
        let obj = item
            .as_object()
            .ok_or(PayloadError::ItemNotObject { index })?;
        if first_present(obj, &DOCUMENT_ID_KEYS).is_none() {
            return Err(PayloadError::MissingDocumentId { index });
        }
        if first_present(obj, &OBJECT_TYPE_KEYS).is_none() {
            return Err(PayloadError::MissingObjectType { index });
        }
    }

    Ok(())
}

/// Validates a catalog payload, then renames legacy keys to their canonical
/// spelling. Unknown top-level keys are kept in place.
pub fn normalize_catalog(payload: CatalogPayload) -> Result<CatalogPayload, PayloadError> {
    validate_catalog(&payload)?;

    let source = payload.into_map();
    let mut normalized = Map::with_capacity(source.len());
    for (key, value) in source {
        let canonical_key = canonical_top_level_key(&key);
        if canonical_key != key && normalized.contains_key(canonical_key) {
            // canonical spelling already present; the legacy duplicate is dropped
            continue;
        }
        let value = if is_catalog_items_key(canonical_key) {
            normalize_items(value)
        } else {
            value
        };
        normalized.insert(canonical_key.to_string(), value);
    }

    debug!(keys = normalized.len(), "payload_normalized");
    Ok(CatalogPayload::new(normalized))
}

/// Checks a `partialUpdate` payload: every operation is an object with
/// `documentId`, `operator` and `field`, and the operator is recognised.
pub fn validate_partial_update(payload: &CatalogPayload) -> Result<(), PayloadError> {
    let key = ItemsKey::PartialUpdate.as_str();
    let operations = payload
        .as_map()
        .get(key)
        .ok_or_else(|| PayloadError::MissingItems {
            expected: key.to_string(),
        })?
        .as_array()
        .ok_or_else(|| PayloadError::ItemsNotArray {
            key: key.to_string(),
        })?;

    for (index, operation) in operations.iter().enumerate() {
        let obj = operation
            .as_object()
            .ok_or(PayloadError::ItemNotObject { index })?;
        for field in ["documentId", "operator", "field"] {
            if !obj.contains_key(field) {
                return Err(PayloadError::MissingOperationField { index, field });
            }
        }
        let operator = obj.get("operator").and_then(Value::as_str);
        if operator.and_then(Operator::from_name).is_none() {
            return Err(PayloadError::InvalidOperator {
                index,
                operator: obj
                    .get("operator")
                    .map(|value| match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .unwrap_or_default(),
            });
        }
    }

    Ok(())
}

fn canonical_top_level_key(key: &str) -> &str {
    if key == ItemsKey::AddOrUpdateLegacy.as_str() {
        ItemsKey::AddOrUpdate.as_str()
    } else if key == DELETE_KEYS[1] {
        DELETE_KEYS[0]
    } else {
        key
    }
}

fn is_catalog_items_key(key: &str) -> bool {
    ItemsKey::CATALOG_ITEMS
        .iter()
        .any(|candidate| candidate.as_str() == key)
}

fn normalize_items(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_item).collect()),
        other => other,
    }
}

fn normalize_item(item: Value) -> Value {
    let Value::Object(fields) = item else {
        return item;
    };
    let has_canonical_id = fields.contains_key(DOCUMENT_ID_KEYS[0]);
    let has_canonical_type = fields.contains_key(OBJECT_TYPE_KEYS[0]);

    let mut out = Map::with_capacity(fields.len());
    for (key, value) in fields {
        if key == DOCUMENT_ID_KEYS[1] {
            if !has_canonical_id {
                out.insert(DOCUMENT_ID_KEYS[0].to_string(), value);
            }
        } else if key == OBJECT_TYPE_KEYS[1] {
            if !has_canonical_type {
                out.insert(OBJECT_TYPE_KEYS[0].to_string(), value);
            }
        } else {
            out.insert(key, value);
        }
    }
    Value::Object(out)
}
