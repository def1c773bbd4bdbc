//! End-to-end catalog update workflows.
//!
//! Both workflows validate locally before anything is sent, upload through
//! [`Uploader`], and can verify the submission through the operation log.
//! A verification that cannot run (log API unreachable) is logged and left
//! out of the outcome; it never fails an upload that already landed.

use std::time::Duration;

use monitor::{OperationMonitor, UploadVerification, Verdict};
use payload::{normalize, validate_partial_update, CatalogPayload, ItemsKey};
use serde::Serialize;
use stream::{StreamApi, UpdateMode};
use tracing::{info, warn};

use crate::upload::{UploadError, UploadResult, Uploader};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowOptions {
    /// Retire items older than the first chunk after a full update.
    pub delete_older: bool,
    pub verify: bool,
    /// Pause before reading the operation log.
    pub verify_wait: Duration,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            delete_older: true,
            verify: true,
            verify_wait: Duration::from_secs(5 * 60),
        }
    }
}

/// What a workflow did, for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowOutcome {
    pub upload: UploadResult,
    pub items: usize,
    pub deletes: usize,
    /// Ordering id passed to delete-older-than, when that call succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_older_than: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<UploadVerification>,
}

impl WorkflowOutcome {
    /// Verdict of the verification, if one ran.
    pub fn verdict(&self) -> Option<Verdict> {
        self.verification.as_ref().map(|v| v.verdict)
    }

    /// True unless a verification ran and found something other than success.
    pub fn is_success(&self) -> bool {
        self.upload.success && self.verdict().map_or(true, Verdict::is_success)
    }
}

/// Normalize, upload in `update` mode, optionally delete older items and
/// verify.
pub fn full_update<A: StreamApi>(
    uploader: &Uploader<A>,
    monitor: &OperationMonitor<A>,
    payload: CatalogPayload,
    options: WorkflowOptions,
) -> Result<WorkflowOutcome, UploadError> {
    let payload = normalize(payload)?;
    let items = payload.item_count();
    let deletes = payload.delete_count();
    info!(items, deletes, "full_update_started");

    let upload = uploader.upload(payload, UpdateMode::Update)?;

    let mut deleted_older_than = None;
    if options.delete_older {
        if let Some(ordering_id) = upload.first_ordering_id() {
            match uploader.api().delete_older_than(ordering_id) {
                Ok(()) => {
                    info!(ordering_id, "older_items_deletion_requested");
                    deleted_older_than = Some(ordering_id);
                }
                Err(err) => warn!(ordering_id, error = %err, "older_items_deletion_failed"),
            }
        }
    }

    let verification = verify(monitor, &upload, options);
    Ok(WorkflowOutcome {
        upload,
        items,
        deletes,
        deleted_older_than,
        verification,
    })
}

/// Validate operations, upload in `partialUpdate` mode and optionally verify.
pub fn partial_update<A: StreamApi>(
    uploader: &Uploader<A>,
    monitor: &OperationMonitor<A>,
    payload: CatalogPayload,
    options: WorkflowOptions,
) -> Result<WorkflowOutcome, UploadError> {
    validate_partial_update(&payload)?;
    let items = payload
        .as_map()
        .get(ItemsKey::PartialUpdate.as_str())
        .and_then(|value| value.as_array())
        .map_or(0, Vec::len);
    info!(
        operations = items,
        breakdown = ?payload.operator_counts(),
        "partial_update_started"
    );

    let upload = uploader.upload(payload, UpdateMode::PartialUpdate)?;
    let verification = verify(monitor, &upload, options);
    Ok(WorkflowOutcome {
        upload,
        items,
        deletes: 0,
        deleted_older_than: None,
        verification,
    })
}

fn verify<A: StreamApi>(
    monitor: &OperationMonitor<A>,
    upload: &UploadResult,
    options: WorkflowOptions,
) -> Option<UploadVerification> {
    if !options.verify {
        return None;
    }
    match monitor.verify_upload(&upload.ordering_ids(), upload.start_time, options.verify_wait) {
        Ok(verification) => Some(verification),
        Err(err) => {
            warn!(error = %err, "verification_unavailable");
            None
        }
    }
}
