//! Post-submission verification for catalog uploads
//!
//! Ingestion is asynchronous: a successful notify call only means the
//! platform queued the container. This crate reads the operation log and
//! answers whether a submission actually landed.
//!
//! ```text
//! ordering id ──► BATCH_FILE entries ──► BatchStatus ─┐
//!             └─► UPDATE entries     ──► ItemProcessing ─┴─► Verdict
//! ```
//!
//! Item entries often carry no ordering id (the platform reports `0`), so
//! item correlation keeps both the exact id and the sentinel. Reports flag
//! this with [`ItemProcessing::is_heuristic`].
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use monitor::{OperationMonitor, Verdict};
//! use stream::{StreamClient, StreamConfig};
//!
//! let client = StreamClient::new(StreamConfig::new("org", "key", "source"))?;
//! let monitor = OperationMonitor::new(client);
//! let report = monitor.monitor_operation(1716383000000, None, Duration::ZERO)?;
//! if report.verdict != Verdict::Success {
//!     eprintln!("{}", report.message);
//! }
//! # Ok::<(), stream::StreamError>(())
//! ```
mod monitor;
mod report;
mod verdict;

pub use crate::monitor::{Clock, OperationMonitor};
pub use crate::report::{
    BatchRecord, BatchState, BatchStatus, BatchSummary, Correlation, ItemIssue, ItemProcessing,
    ItemSummary, MonitorReport, OperationSummary, UploadVerification, SAMPLE_ISSUES,
    UNCORRELATED_ORDERING_ID,
};
pub use crate::verdict::Verdict;
pub use stream::TimeWindow;
