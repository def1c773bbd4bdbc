//! Remote client for the catalog Stream API
//!
//! Uploading a catalog file is a three step conversation with the platform:
//!
//! ```text
//! create_file_container ──► upload_to_container ──► notify_source
//!   (POST /files)            (PUT uploadUri)         (PUT /stream/update|merge)
//!        │                                                 │
//!        └── uploadUri, fileId, requiredHeaders            └── orderingId, requestId
//! ```
//!
//! plus `delete_older_than` to retire stale items after a full replace and
//! `query_logs` to read the asynchronous operation log.
//!
//! ## What we do here
//!
//! - **[`StreamApi`]** - the trait the uploader and the monitor are written
//!   against.
//! - **[`StreamClient`]** - the blocking HTTP implementation over `reqwest`.
//! - **[`RetryPolicy`]** - one retry wrapper for every call: exponential
//!   backoff for transport failures, uncounted `Retry-After` pauses for 429,
//!   immediate failure for any other status.
//! - **Log types** - [`LogQuery`], [`OperationLogEntry`] and [`TimeWindow`].
mod api;
mod client;
mod config;
mod error;
mod retry;
mod types;

pub use crate::api::StreamApi;
pub use crate::client::{Sleeper, StreamClient};
pub use crate::config::{StreamConfig, DEFAULT_API_BASE_URL};
pub use crate::error::StreamError;
pub use crate::retry::{parse_retry_after, Attempt, RetryPolicy};
pub use crate::types::{
    FileContainer, LogMeta, LogOperation, LogQuery, LogQueryBody, LogResult, LogTask,
    OperationLogEntry, StreamReceipt, TimeWindow, UpdateMode,
};
