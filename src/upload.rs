use std::path::Path;

use chrono::{DateTime, Utc};
use payload::{format_file_size, CatalogPayload, PayloadChunker, PayloadError, UploadChunk};
use serde::Serialize;
use stream::{StreamApi, StreamError, StreamReceipt, UpdateMode};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that abort an upload.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UploadError {
    /// The payload could not be read, serialized or split. Nothing was sent.
    #[error("payload rejected: {0}")]
    Payload(#[from] PayloadError),

    /// Chunk `chunk` (zero-based) failed. The chunks in `completed` were
    /// already committed and are not rolled back.
    #[error("chunk {} of {total} failed after {} committed: {source}", .chunk + 1, .completed.len())]
    ChunkFailed {
        chunk: usize,
        total: usize,
        completed: Vec<StreamReceipt>,
        source: StreamError,
    },
}

impl UploadError {
    /// Receipts of the chunks that landed before the failure.
    pub fn committed(&self) -> &[StreamReceipt] {
        match self {
            UploadError::ChunkFailed { completed, .. } => completed,
            UploadError::Payload(_) => &[],
        }
    }
}

/// Outcome of a completed upload, one receipt per chunk in upload order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadResult {
    pub success: bool,
    pub mode: UpdateMode,
    pub chunks: usize,
    pub receipts: Vec<StreamReceipt>,
    /// Taken before the first remote call; the lower bound for log queries.
    pub start_time: DateTime<Utc>,
    pub file_ids: Vec<String>,
}

impl UploadResult {
    pub fn ordering_ids(&self) -> Vec<i64> {
        self.receipts.iter().map(|r| r.ordering_id).collect()
    }

    pub fn request_ids(&self) -> Vec<&str> {
        self.receipts.iter().map(|r| r.request_id.as_str()).collect()
    }

    pub fn first_ordering_id(&self) -> Option<i64> {
        self.receipts.first().map(|r| r.ordering_id)
    }
}

/// Pushes payloads through the container protocol, one chunk at a time.
///
/// Every chunk gets its own container: create, upload, notify. Chunks are
/// sent sequentially and the first failure stops the upload.
#[derive(Debug, Clone)]
pub struct Uploader<A> {
    api: A,
    chunker: PayloadChunker,
}

impl<A: StreamApi> Uploader<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            chunker: PayloadChunker::default(),
        }
    }

    pub fn with_chunker(mut self, chunker: PayloadChunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn chunker(&self) -> &PayloadChunker {
        &self.chunker
    }

    /// Reads `path` and uploads it unchanged.
    pub fn upload_file<P: AsRef<Path>>(
        &self,
        path: P,
        mode: UpdateMode,
    ) -> Result<UploadResult, UploadError> {
        let path = path.as_ref();
        info!(path = %path.display(), "payload_loading");
        let payload = CatalogPayload::from_path(path)?;
        self.upload(payload, mode)
    }

    /// Uploads `payload`, chunking it when its compact form exceeds the
    /// ceiling.
    pub fn upload(
        &self,
        payload: CatalogPayload,
        mode: UpdateMode,
    ) -> Result<UploadResult, UploadError> {
        let chunks = self.chunker.chunk(payload)?;
        let total = chunks.len();
        let total_bytes: usize = chunks.iter().map(UploadChunk::len).sum();
        info!(
            mode = %mode,
            chunks = total,
            size = %format_file_size(total_bytes as u64),
            "upload_started"
        );

        let start_time = Utc::now();
        let mut receipts = Vec::with_capacity(total);
        let mut file_ids = Vec::with_capacity(total);

        for chunk in chunks {
            match self.upload_chunk(&chunk, mode) {
                Ok((file_id, receipt)) => {
                    info!(
                        chunk = chunk.index + 1,
                        total,
                        items = chunk.item_count,
                        ordering_id = receipt.ordering_id,
                        "chunk_uploaded"
                    );
                    file_ids.push(file_id);
                    receipts.push(receipt);
                }
                Err(source) => {
                    warn!(
                        chunk = chunk.index + 1,
                        total,
                        committed = receipts.len(),
                        error = %source,
                        "chunk_failed"
                    );
                    return Err(UploadError::ChunkFailed {
                        chunk: chunk.index,
                        total,
                        completed: receipts,
                        source,
                    });
                }
            }
        }

        let result = UploadResult {
            success: true,
            mode,
            chunks: total,
            receipts,
            start_time,
            file_ids,
        };
        info!(
            mode = %mode,
            chunks = result.chunks,
            ordering_ids = ?result.ordering_ids(),
            "upload_complete"
        );
        Ok(result)
    }

    fn upload_chunk(
        &self,
        chunk: &UploadChunk,
        mode: UpdateMode,
    ) -> Result<(String, StreamReceipt), StreamError> {
        let container = self.api.create_file_container()?;
        debug!(chunk = chunk.index + 1, file_id = %container.file_id, "container_ready");
        self.api.upload_to_container(&container, chunk.bytes.clone())?;
        let receipt = self.api.notify_source(&container.file_id, mode)?;
        Ok((container.file_id, receipt))
    }
}
