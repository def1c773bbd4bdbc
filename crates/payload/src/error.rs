//! Error types produced by the payload crate.
//!
//! Every variant describes an input problem the caller has to fix before
//! anything is sent to the platform. Nothing here is retried.
//!
//! | Error | Raised when |
//! |-------|-------------|
//! | [`InvalidJson`](PayloadError::InvalidJson) | the document does not parse |
//! | [`NotAnObject`](PayloadError::NotAnObject) | the top level is not a JSON object |
//! | [`MissingItems`](PayloadError::MissingItems) | no recognised items key is present |
//! | [`ItemsNotArray`](PayloadError::ItemsNotArray) | the items key holds something other than an array |
//! | [`ItemNotObject`](PayloadError::ItemNotObject) | an item is not an object |
//! | [`MissingDocumentId`](PayloadError::MissingDocumentId) | an item has no usable document id under either casing |
//! | [`MissingObjectType`](PayloadError::MissingObjectType) | an item has no object type under either casing |
//! | [`MissingOperationField`](PayloadError::MissingOperationField) | a partial-update operation lacks a required key |
//! | [`InvalidOperator`](PayloadError::InvalidOperator) | a partial-update operator is not recognised |
use std::io;

use thiserror::Error;

/// Errors raised while loading, validating, or chunking a catalog payload.
///
/// # Examples
///
/// ```rust
/// use payload::PayloadError;
///
/// let err = PayloadError::MissingDocumentId { index: 3 };
/// assert_eq!(err.to_string(), "item 3 is missing documentId/DocumentId");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PayloadError {
    /// The raw bytes are not valid JSON.
    #[error("invalid JSON payload: {0}")]
    InvalidJson(String),

    /// The payload file could not be read.
    #[error("failed to read payload: {0}")]
    Io(String),

    /// The top-level value is an array, string, number or null.
    #[error("payload must be a JSON object")]
    NotAnObject,

    /// None of the accepted items keys is present.
    #[error("no items found, expected one of: {expected}")]
    MissingItems { expected: String },

    /// The items key does not hold an array.
    #[error("'{key}' must be an array")]
    ItemsNotArray { key: String },

    /// An entry of the items array is not an object.
    #[error("item {index} must be an object")]
    ItemNotObject { index: usize },

    #[error("item {index} is missing documentId/DocumentId")]
    MissingDocumentId { index: usize },

    #[error("item {index} is missing objecttype/ObjectType")]
    MissingObjectType { index: usize },

    /// A partial-update operation is missing `documentId`, `operator` or `field`.
    #[error("operation {index} missing '{field}'")]
    MissingOperationField { index: usize, field: &'static str },

    #[error("operation {index} has invalid operator: {operator}")]
    InvalidOperator { index: usize, operator: String },
}

impl From<serde_json::Error> for PayloadError {
    fn from(value: serde_json::Error) -> Self {
        PayloadError::InvalidJson(value.to_string())
    }
}

impl From<io::Error> for PayloadError {
    fn from(value: io::Error) -> Self {
        PayloadError::Io(value.to_string())
    }
}
