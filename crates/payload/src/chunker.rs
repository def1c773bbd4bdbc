//! Size-bounded splitting of catalog payloads.
//!
//! The platform rejects files above a fixed ceiling, so oversized payloads are
//! cut into several self-contained payloads along the primary items array.
//! Each chunk keeps every other top-level key of the source in its original
//! position.
//!
//! The split size comes from a single average item size
//! (`total bytes / item count`) with a 10% margin. This is an estimate: a
//! payload mixing one huge item with many tiny ones can still produce a chunk
//! above the ceiling. Callers should treat [`PayloadChunker::chunk`] as a
//! best-effort pre-check and let the platform have the final word.
use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::PayloadError;
use crate::types::CatalogPayload;

/// Default ceiling for a single uploaded file: 256 MiB.
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 256 * 1024 * 1024;

const SAFETY_MARGIN: f64 = 0.9;

/// One self-contained, serialized slice of a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadChunk {
    /// Zero-based position of the chunk in upload order.
    pub index: usize,
    /// Number of primary items carried by this chunk.
    pub item_count: usize,
    /// Compact JSON ready to be sent as the request body.
    pub bytes: Bytes,
}

impl UploadChunk {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Parses the chunk back into a payload.
    pub fn to_payload(&self) -> Result<CatalogPayload, PayloadError> {
        CatalogPayload::from_slice(&self.bytes)
    }
}

/// Splits payloads whose compact serialization exceeds `max_chunk_bytes`.
///
/// # Examples
///
/// ```rust
/// use payload::{CatalogPayload, PayloadChunker};
/// use serde_json::json;
///
/// let payload = CatalogPayload::from_value(json!({
///     "addOrUpdate": [{"documentId": "product://1", "objecttype": "Product"}]
/// }))
/// .unwrap();
///
/// let chunks = PayloadChunker::default().chunk(payload.clone()).unwrap();
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].to_payload().unwrap(), payload);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadChunker {
    max_chunk_bytes: usize,
}

impl Default for PayloadChunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHUNK_BYTES)
    }
}

impl PayloadChunker {
    /// A ceiling of zero is raised to one byte.
    pub fn new(max_chunk_bytes: usize) -> Self {
        Self {
            max_chunk_bytes: max_chunk_bytes.max(1),
        }
    }

    pub fn from_megabytes(megabytes: usize) -> Self {
        Self::new(megabytes.saturating_mul(1024 * 1024))
    }

    pub fn max_chunk_bytes(&self) -> usize {
        self.max_chunk_bytes
    }

    /// True when `serialized_len` is strictly above the ceiling.
    pub fn needs_chunking(&self, serialized_len: usize) -> bool {
        serialized_len > self.max_chunk_bytes
    }

    /// Items per chunk for a payload of `total_bytes` holding `item_count`
    /// items: `max(1, floor(ceiling / average_item_size * 0.9))`.
    pub fn items_per_chunk(&self, total_bytes: usize, item_count: usize) -> usize {
        if item_count == 0 || total_bytes == 0 {
            return item_count.max(1);
        }
        let average_item_size = total_bytes as f64 / item_count as f64;
        let estimate = (self.max_chunk_bytes as f64 / average_item_size * SAFETY_MARGIN).floor();
        (estimate as usize).max(1)
    }

    /// Number of chunks [`chunk`](Self::chunk) will emit, without building them.
    pub fn planned_chunk_count(&self, total_bytes: usize, item_count: usize) -> usize {
        if !self.needs_chunking(total_bytes) || item_count == 0 {
            return 1;
        }
        item_count.div_ceil(self.items_per_chunk(total_bytes, item_count))
    }

    /// Serializes `payload` into one or more upload chunks.
    ///
    /// Payloads at or under the ceiling, payloads without a recognised items
    /// key and payloads with an empty items array come back as a single chunk
    /// holding the unchanged document.
    pub fn chunk(&self, payload: CatalogPayload) -> Result<Vec<UploadChunk>, PayloadError> {
        let bytes = payload.to_bytes()?;
        let total_bytes = bytes.len();
        let item_count = payload.item_count();

        if !self.needs_chunking(total_bytes) {
            return Ok(vec![single_chunk(bytes, item_count)]);
        }

        let Some(items_key) = payload.items_key() else {
            debug!(total_bytes, "payload_not_chunkable");
            return Ok(vec![single_chunk(bytes, 0)]);
        };
        let key = items_key.as_str();
        if !payload.as_map().get(key).is_some_and(Value::is_array) {
            return Err(PayloadError::ItemsNotArray {
                key: key.to_string(),
            });
        }
        if item_count == 0 {
            return Ok(vec![single_chunk(bytes, 0)]);
        }
        drop(bytes);

        let items_per_chunk = self.items_per_chunk(total_bytes, item_count);
        let (layout, items) = split_items(payload.into_map(), key);

        let mut chunks = Vec::with_capacity(item_count.div_ceil(items_per_chunk));
        let mut remaining = items.into_iter().peekable();
        while remaining.peek().is_some() {
            let slice: Vec<Value> = remaining.by_ref().take(items_per_chunk).collect();
            let item_count = slice.len();
            let map = assemble(&layout, key, slice);
            chunks.push(UploadChunk {
                index: chunks.len(),
                item_count,
                bytes: Bytes::from(serde_json::to_vec(&map)?),
            });
        }

        info!(
            total_bytes,
            item_count,
            items_per_chunk,
            chunks = chunks.len(),
            "payload_chunked"
        );
        Ok(chunks)
    }
}

/// Convenience wrapper around [`PayloadChunker::chunk`].
pub fn chunk_payload(
    payload: CatalogPayload,
    max_chunk_bytes: usize,
) -> Result<Vec<UploadChunk>, PayloadError> {
    PayloadChunker::new(max_chunk_bytes).chunk(payload)
}

/// Human-readable byte count, e.g. `1.50 KB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0B".to_string();
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.2} {}", UNITS[unit])
}

fn single_chunk(bytes: Vec<u8>, item_count: usize) -> UploadChunk {
    UploadChunk {
        index: 0,
        item_count,
        bytes: Bytes::from(bytes),
    }
}

/// Separates the items array from the metadata, remembering key order.
/// The items slot is kept as `None` so each chunk reinserts its slice in place.
fn split_items(map: Map<String, Value>, items_key: &str) -> (Vec<(String, Option<Value>)>, Vec<Value>) {
    let mut layout = Vec::with_capacity(map.len());
    let mut items = Vec::new();
    for (key, value) in map {
        if key == items_key {
            if let Value::Array(values) = value {
                items = values;
            }
            layout.push((key, None));
        } else {
            layout.push((key, Some(value)));
        }
    }
    (layout, items)
}

fn assemble(layout: &[(String, Option<Value>)], items_key: &str, slice: Vec<Value>) -> Map<String, Value> {
    let mut map = Map::with_capacity(layout.len());
    let mut slice = Some(slice);
    for (key, value) in layout {
        match value {
            Some(value) => {
                map.insert(key.clone(), value.clone());
            }
            None if key == items_key => {
                map.insert(key.clone(), Value::Array(slice.take().unwrap_or_default()));
            }
            None => {}
        }
    }
    map
}
