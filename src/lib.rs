//! Catalog upload pipeline.
//!
//! This crate stitches the payload, stream and monitor crates into the two
//! operations a catalog owner runs: a full replace of the catalog and a
//! partial update of selected fields.
//!
//! ```text
//! JSON file ─► normalize ─► PayloadChunker ─► Uploader ─► StreamApi
//!                                               │
//!                                               └─► receipts ─► OperationMonitor ─► Verdict
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use catalog_stream::{full_update, AppConfig, OperationMonitor, Uploader, WorkflowOptions};
//! use payload::CatalogPayload;
//! use stream::StreamClient;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load(catalog_stream::DEFAULT_CONFIG_PATH)?;
//! let client = StreamClient::new(config.stream_config())?;
//! let uploader = Uploader::new(&client).with_chunker(config.chunker());
//! let monitor = OperationMonitor::new(&client);
//!
//! let payload = CatalogPayload::from_path("data/catalog.json")?;
//! let outcome = full_update(&uploader, &monitor, payload, WorkflowOptions::default())?;
//! println!("ordering ids: {:?}", outcome.upload.ordering_ids());
//! # Ok(())
//! # }
//! ```

mod config;
mod upload;
mod workflow;

pub use crate::config::{
    substitute_placeholders, AppConfig, ConfigError, DefaultSettings, Limits, PlatformConfig,
    DEFAULT_CONFIG_PATH, TEMPLATE_MARKER,
};
pub use crate::upload::{UploadError, UploadResult, Uploader};
pub use crate::workflow::{full_update, partial_update, WorkflowOptions, WorkflowOutcome};

pub use monitor::{OperationMonitor, Verdict};
