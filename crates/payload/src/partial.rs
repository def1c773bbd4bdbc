//! Partial-update operations and their builder.
//!
//! Each convenience constructor on [`PartialUpdateOperation`] is a pure
//! function producing one operation record. [`PartialUpdateBuilder`] is a plain
//! append-only list of those records that is frozen into a
//! `{"partialUpdate": [...]}` payload by [`PartialUpdateBuilder::build`].
//!
//! ```rust
//! use payload::PartialUpdateBuilder;
//!
//! let payload = PartialUpdateBuilder::new()
//!     .update_price("product://001", 29.99)
//!     .update_stock_status("product://001", false)
//!     .build();
//!
//! assert_eq!(
//!     payload.to_json_string().unwrap(),
//!     r#"{"partialUpdate":[{"documentId":"product://001","operator":"fieldValueReplace","field":"ec_price","value":29.99},{"documentId":"product://001","operator":"fieldValueReplace","field":"ec_in_stock","value":"FALSE"}]}"#
//! );
//! ```
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PayloadError;
use crate::types::CatalogPayload;

pub const PRICE_FIELD: &str = "ec_price";
pub const PROMO_PRICE_FIELD: &str = "ec_promo_price";
pub const IN_STOCK_FIELD: &str = "ec_in_stock";
pub const RATING_FIELD: &str = "ec_rating";
pub const AVAILABLE_ITEMS_FIELD: &str = "ec_available_items";

/// Partial-update operators understood by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    FieldValueReplace,
    ArrayAppend,
    ArrayRemove,
    DictionaryPut,
    DictionaryRemove,
}

impl Operator {
    pub const ALL: [Operator; 5] = [
        Operator::FieldValueReplace,
        Operator::ArrayAppend,
        Operator::ArrayRemove,
        Operator::DictionaryPut,
        Operator::DictionaryRemove,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::FieldValueReplace => "fieldValueReplace",
            Operator::ArrayAppend => "arrayAppend",
            Operator::ArrayRemove => "arrayRemove",
            Operator::DictionaryPut => "dictionaryPut",
            Operator::DictionaryRemove => "dictionaryRemove",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == name)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One partial-update record. A missing `value` asks the platform to delete
/// the field where the operator supports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialUpdateOperation {
    pub document_id: String,
    pub operator: Operator,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PartialUpdateOperation {
    pub fn new(
        document_id: impl Into<String>,
        operator: Operator,
        field: impl Into<String>,
        value: Option<Value>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            operator,
            field: field.into(),
            value,
        }
    }

    pub fn replace_field(
        document_id: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self::new(
            document_id,
            Operator::FieldValueReplace,
            field,
            Some(value.into()),
        )
    }

    /// Field replacement without a value, which removes the field.
    pub fn remove_field(document_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(document_id, Operator::FieldValueReplace, field, None)
    }

    pub fn update_price(document_id: impl Into<String>, price: f64) -> Self {
        Self::replace_field(document_id, PRICE_FIELD, price)
    }

    pub fn update_promo_price(document_id: impl Into<String>, promo_price: f64) -> Self {
        Self::replace_field(document_id, PROMO_PRICE_FIELD, promo_price)
    }

    /// Stock status travels as the strings `"TRUE"` / `"FALSE"`.
    pub fn update_stock_status(document_id: impl Into<String>, in_stock: bool) -> Self {
        let status = if in_stock { "TRUE" } else { "FALSE" };
        Self::replace_field(document_id, IN_STOCK_FIELD, status)
    }

    pub fn update_rating(document_id: impl Into<String>, rating: f64) -> Self {
        Self::replace_field(document_id, RATING_FIELD, rating)
    }

    pub fn add_to_array<I, V>(document_id: impl Into<String>, field: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(
            document_id,
            Operator::ArrayAppend,
            field,
            Some(collect_array(items)),
        )
    }

    pub fn remove_from_array<I, V>(
        document_id: impl Into<String>,
        field: impl Into<String>,
        items: I,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(
            document_id,
            Operator::ArrayRemove,
            field,
            Some(collect_array(items)),
        )
    }

    /// Puts `{key: value}` into a dictionary field.
    pub fn update_dictionary_field(
        document_id: impl Into<String>,
        field: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        let mut entry = Map::new();
        entry.insert(key.into(), value.into());
        Self::new(
            document_id,
            Operator::DictionaryPut,
            field,
            Some(Value::Object(entry)),
        )
    }

    /// A single key is sent as a bare string, several as an array.
    pub fn remove_from_dictionary<S: AsRef<str>>(
        document_id: impl Into<String>,
        field: impl Into<String>,
        keys: &[S],
    ) -> Self {
        let value = match keys {
            [single] => Value::String(single.as_ref().to_string()),
            many => Value::Array(
                many.iter()
                    .map(|key| Value::String(key.as_ref().to_string()))
                    .collect(),
            ),
        };
        Self::new(document_id, Operator::DictionaryRemove, field, Some(value))
    }
}

fn collect_array<I, V>(items: I) -> Value
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Value::Array(items.into_iter().map(Into::into).collect())
}

/// The frozen `{"partialUpdate": [...]}` document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PartialUpdatePayload {
    #[serde(rename = "partialUpdate")]
    pub partial_update: Vec<PartialUpdateOperation>,
}

impl PartialUpdatePayload {
    pub fn to_json_string(&self) -> Result<String, PayloadError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn into_catalog_payload(self) -> Result<CatalogPayload, PayloadError> {
        CatalogPayload::from_value(serde_json::to_value(self)?)
    }

    pub fn len(&self) -> usize {
        self.partial_update.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partial_update.is_empty()
    }
}

/// Append-only list of partial-update operations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartialUpdateBuilder {
    operations: Vec<PartialUpdateOperation>,
}

impl PartialUpdateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, operation: PartialUpdateOperation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn add_operation(
        self,
        document_id: impl Into<String>,
        operator: Operator,
        field: impl Into<String>,
        value: Option<Value>,
    ) -> Self {
        self.push(PartialUpdateOperation::new(
            document_id,
            operator,
            field,
            value,
        ))
    }

    pub fn update_price(self, document_id: impl Into<String>, price: f64) -> Self {
        self.push(PartialUpdateOperation::update_price(document_id, price))
    }

    pub fn update_promo_price(self, document_id: impl Into<String>, promo_price: f64) -> Self {
        self.push(PartialUpdateOperation::update_promo_price(
            document_id,
            promo_price,
        ))
    }

    pub fn update_stock_status(self, document_id: impl Into<String>, in_stock: bool) -> Self {
        self.push(PartialUpdateOperation::update_stock_status(
            document_id,
            in_stock,
        ))
    }

    pub fn update_rating(self, document_id: impl Into<String>, rating: f64) -> Self {
        self.push(PartialUpdateOperation::update_rating(document_id, rating))
    }

    pub fn replace_field(
        self,
        document_id: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.push(PartialUpdateOperation::replace_field(
            document_id,
            field,
            value,
        ))
    }

    pub fn remove_field(self, document_id: impl Into<String>, field: impl Into<String>) -> Self {
        self.push(PartialUpdateOperation::remove_field(document_id, field))
    }

    pub fn add_to_array<I, V>(
        self,
        document_id: impl Into<String>,
        field: impl Into<String>,
        items: I,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push(PartialUpdateOperation::add_to_array(document_id, field, items))
    }

    pub fn remove_from_array<I, V>(
        self,
        document_id: impl Into<String>,
        field: impl Into<String>,
        items: I,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push(PartialUpdateOperation::remove_from_array(
            document_id,
            field,
            items,
        ))
    }

    pub fn add_to_store_inventory<I, V>(self, store_document_id: impl Into<String>, product_ids: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.add_to_array(store_document_id, AVAILABLE_ITEMS_FIELD, product_ids)
    }

    pub fn remove_from_store_inventory<I, V>(
        self,
        store_document_id: impl Into<String>,
        product_ids: I,
    ) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.remove_from_array(store_document_id, AVAILABLE_ITEMS_FIELD, product_ids)
    }

    pub fn update_dictionary_field(
        self,
        document_id: impl Into<String>,
        field: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.push(PartialUpdateOperation::update_dictionary_field(
            document_id,
            field,
            key,
            value,
        ))
    }

    pub fn remove_from_dictionary<S: AsRef<str>>(
        self,
        document_id: impl Into<String>,
        field: impl Into<String>,
        keys: &[S],
    ) -> Self {
        self.push(PartialUpdateOperation::remove_from_dictionary(
            document_id,
            field,
            keys,
        ))
    }

    /// Drops every queued operation.
    pub fn clear(mut self) -> Self {
        self.operations.clear();
        self
    }

    pub fn operations(&self) -> &[PartialUpdateOperation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operator_breakdown(&self) -> BTreeMap<Operator, usize> {
        let mut counts = BTreeMap::new();
        for op in &self.operations {
            *counts.entry(op.operator).or_insert(0) += 1;
        }
        counts
    }

    pub fn build(self) -> PartialUpdatePayload {
        PartialUpdatePayload {
            partial_update: self.operations,
        }
    }
}

/// Sets the same price on every listed product.
pub fn price_update<I, S>(product_ids: I, price: f64) -> PartialUpdatePayload
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    product_ids
        .into_iter()
        .fold(PartialUpdateBuilder::new(), |builder, id| {
            builder.update_price(id, price)
        })
        .build()
}

/// Adds and/or removes products from a store's available items.
pub fn inventory_update(
    store_id: &str,
    add_products: &[String],
    remove_products: &[String],
) -> PartialUpdatePayload {
    let mut builder = PartialUpdateBuilder::new();
    if !add_products.is_empty() {
        builder = builder.add_to_store_inventory(store_id, add_products.iter().cloned());
    }
    if !remove_products.is_empty() {
        builder = builder.remove_from_store_inventory(store_id, remove_products.iter().cloned());
    }
    builder.build()
}

pub fn stock_status_update(updates: &[(&str, bool)]) -> PartialUpdatePayload {
    updates
        .iter()
        .fold(PartialUpdateBuilder::new(), |builder, (id, in_stock)| {
            builder.update_stock_status(*id, *in_stock)
        })
        .build()
}
