//! Catalog payload layer
//!
//! Everything that happens to a catalog document before it touches the
//! network lives here. Nothing in this crate performs I/O other than reading
//! a payload file from disk.
//!
//! ## What we do here
//!
//! - **Model the document** - [`CatalogPayload`] wraps the top-level JSON
//!   object and keeps unknown keys in their original order.
//! - **Normalize** - [`normalize`] validates either key casing and rewrites the
//!   document into the canonical `addOrUpdate` / `documentId` / `objecttype`
//!   shape. `partialUpdate` documents get their operations checked instead.
//! - **Build partial updates** - [`PartialUpdateBuilder`] collects
//!   operations and freezes them into a `{"partialUpdate": [...]}` document.
//! - **Chunk** - [`PayloadChunker`] cuts documents above the platform's file
//!   ceiling into self-contained slices along the primary items array.
//!
//! ## Example
//!
//! ```
//! use payload::{normalize, CatalogPayload, PayloadChunker};
//! use serde_json::json;
//!
//! let raw = CatalogPayload::from_value(json!({
//!     "AddOrUpdate": [
//!         {"DocumentId": "product://001", "ObjectType": "Product", "ec_price": 10}
//!     ]
//! }))
//! .unwrap();
//!
//! let canonical = normalize(raw).unwrap();
//! let chunks = PayloadChunker::default().chunk(canonical).unwrap();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].item_count, 1);
//! ```
mod chunker;
mod error;
mod normalize;
mod partial;
mod types;

pub use crate::chunker::{
    chunk_payload, format_file_size, PayloadChunker, UploadChunk, DEFAULT_MAX_CHUNK_BYTES,
};
pub use crate::error::PayloadError;
pub use crate::normalize::{
    check_compatibility, normalize, normalize_catalog, validate_catalog, validate_partial_update,
};
pub use crate::partial::{
    inventory_update, price_update, stock_status_update, Operator, PartialUpdateBuilder,
    PartialUpdateOperation, PartialUpdatePayload, AVAILABLE_ITEMS_FIELD, IN_STOCK_FIELD,
    PRICE_FIELD, PROMO_PRICE_FIELD, RATING_FIELD,
};
pub use crate::types::{
    CatalogPayload, ItemsKey, DELETE_KEYS, DOCUMENT_ID_KEYS, OBJECT_TYPE_KEYS,
};
