//! Structured results of log reconciliation.
//!
//! Remote processing warnings and errors are data, never Rust errors: the
//! upload has already been accepted by the time they are discovered.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stream::{LogResult, OperationLogEntry, TimeWindow};

use crate::verdict::Verdict;

/// Ordering id the platform reports when it did not propagate one.
pub const UNCORRELATED_ORDERING_ID: i64 = 0;

/// Number of item issues kept in a window summary.
pub const SAMPLE_ISSUES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchState {
    /// No batch entry carries the ordering id inside the window.
    NotFound,
    Completed,
    Warning,
    Error,
    /// A batch entry with a result outside COMPLETED / WARNING / ERROR.
    Unrecognized,
}

/// Acceptance outcome of one submitted container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStatus {
    pub ordering_id: i64,
    pub state: BatchState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl BatchStatus {
    pub fn not_found(ordering_id: i64) -> Self {
        Self {
            ordering_id,
            state: BatchState::NotFound,
            error: None,
            timestamp: None,
        }
    }

    /// Builds the status from the batch entry matching `ordering_id`, if any.
    pub fn from_entries<'a, I>(ordering_id: i64, entries: I) -> Self
    where
        I: IntoIterator<Item = &'a OperationLogEntry>,
    {
        let Some(entry) = entries
            .into_iter()
            .find(|entry| entry.meta.ordering_id == ordering_id)
        else {
            return Self::not_found(ordering_id);
        };

        let (state, fallback) = match entry.result {
            LogResult::Completed => (BatchState::Completed, None),
            LogResult::Warning => (BatchState::Warning, Some("Unknown warning")),
            LogResult::Error => (BatchState::Error, Some("Unknown error")),
            LogResult::Unknown => (BatchState::Unrecognized, None),
        };
        let error = match fallback {
            Some(fallback) => Some(
                entry
                    .meta
                    .error
                    .clone()
                    .unwrap_or_else(|| fallback.to_string()),
            ),
            None => entry.meta.error.clone(),
        };

        Self {
            ordering_id,
            state,
            error,
            timestamp: entry.timestamp,
        }
    }

    pub fn found(&self) -> bool {
        self.state != BatchState::NotFound
    }

    pub fn message(&self) -> String {
        let error = self.error.as_deref().unwrap_or_default();
        match self.state {
            BatchState::NotFound => {
                format!("No batch logs found for ordering ID {}", self.ordering_id)
            }
            BatchState::Completed => "Batch was accepted successfully".to_string(),
            BatchState::Warning => format!("Batch accepted with warning: {error}"),
            BatchState::Error => format!("Batch failed: {error}"),
            BatchState::Unrecognized => "Unknown batch result".to_string(),
        }
    }
}

/// A document-level warning or error from the operation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemIssue {
    pub document_id: String,
    pub result: LogResult,
    pub error: String,
    pub ordering_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl From<&OperationLogEntry> for ItemIssue {
    fn from(entry: &OperationLogEntry) -> Self {
        let fallback = match entry.result {
            LogResult::Error => "Unknown error",
            _ => "Unknown warning",
        };
        Self {
            document_id: entry.id.clone().unwrap_or_else(|| "Unknown".to_string()),
            result: entry.result,
            error: entry
                .meta
                .error
                .clone()
                .unwrap_or_else(|| fallback.to_string()),
            ordering_id: entry.meta.ordering_id,
            timestamp: entry.timestamp,
        }
    }
}

/// How item entries were attributed to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Correlation {
    /// Every item issue in the window counts.
    Window,
    /// Entries carrying the ordering id or the uncorrelated sentinel count.
    /// Heuristic: a sentinel entry may belong to another submission.
    OrderingIdOrSentinel { ordering_id: i64 },
}

/// Item-level warnings and errors attributed to one submission or window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemProcessing {
    pub correlation: Correlation,
    pub warnings: Vec<ItemIssue>,
    pub errors: Vec<ItemIssue>,
}

impl ItemProcessing {
    /// Partitions item entries, keeping only those `correlation` attributes to
    /// the submission.
    pub fn from_entries<'a, I>(correlation: Correlation, entries: I) -> Self
    where
        I: IntoIterator<Item = &'a OperationLogEntry>,
    {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();
        for entry in entries {
            if let Correlation::OrderingIdOrSentinel { ordering_id } = correlation {
                let id = entry.meta.ordering_id;
                if id != ordering_id && id != UNCORRELATED_ORDERING_ID {
                    continue;
                }
            }
            match entry.result {
                LogResult::Warning => warnings.push(ItemIssue::from(entry)),
                LogResult::Error => errors.push(ItemIssue::from(entry)),
                _ => {}
            }
        }
        Self {
            correlation,
            warnings,
            errors,
        }
    }

    pub fn total_issues(&self) -> usize {
        self.warnings.len() + self.errors.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// True when the item filter relied on the sentinel ordering id.
    pub fn is_heuristic(&self) -> bool {
        matches!(self.correlation, Correlation::OrderingIdOrSentinel { .. })
    }

    pub fn message(&self) -> String {
        if self.has_errors() {
            format!(
                "Found {} errors and {} warnings",
                self.errors.len(),
                self.warnings.len()
            )
        } else if self.has_warnings() {
            format!("Found {} warnings", self.warnings.len())
        } else {
            "No processing issues found".to_string()
        }
    }
}

/// Complete reconciliation of one ordering id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorReport {
    pub ordering_id: i64,
    pub window: TimeWindow,
    pub batch: BatchStatus,
    pub items: ItemProcessing,
    pub verdict: Verdict,
    pub message: String,
}

impl MonitorReport {
    pub fn new(ordering_id: i64, window: TimeWindow, batch: BatchStatus, items: ItemProcessing) -> Self {
        let verdict = Verdict::reduce(&batch, &items);
        let message = verdict_message(verdict, &batch).to_string();
        Self {
            ordering_id,
            window,
            batch,
            items,
            verdict,
            message,
        }
    }
}

fn verdict_message(verdict: Verdict, batch: &BatchStatus) -> &'static str {
    match verdict {
        Verdict::NotFound => "Operation not found",
        Verdict::Failed if batch.state == BatchState::Error => "Batch processing failed",
        Verdict::Failed => "Item processing failed",
        Verdict::Warning => "Operation completed with warnings",
        Verdict::Success => "Operation completed successfully",
    }
}

/// One batch entry in a window summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub ordering_id: i64,
    pub result: LogResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Only set for entries that did not complete cleanly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub warnings: usize,
    pub errors: usize,
    pub operations: Vec<BatchRecord>,
}

impl BatchSummary {
    pub fn from_entries(entries: &[OperationLogEntry]) -> Self {
        let count = |result: LogResult| entries.iter().filter(|e| e.result == result).count();
        Self {
            total: entries.len(),
            successful: count(LogResult::Completed),
            warnings: count(LogResult::Warning),
            errors: count(LogResult::Error),
            operations: entries
                .iter()
                .map(|entry| BatchRecord {
                    ordering_id: entry.meta.ordering_id,
                    result: entry.result,
                    timestamp: entry.timestamp,
                    error: (entry.result != LogResult::Completed)
                        .then(|| entry.meta.error.clone())
                        .flatten(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub total_issues: usize,
    pub warnings: usize,
    pub errors: usize,
    /// The first [`SAMPLE_ISSUES`] issues in log order.
    pub sample_issues: Vec<ItemIssue>,
}

impl ItemSummary {
    pub fn from_entries(entries: &[OperationLogEntry]) -> Self {
        let count = |result: LogResult| entries.iter().filter(|e| e.result == result).count();
        Self {
            total_issues: entries.len(),
            warnings: count(LogResult::Warning),
            errors: count(LogResult::Error),
            sample_issues: entries
                .iter()
                .take(SAMPLE_ISSUES)
                .map(ItemIssue::from)
                .collect(),
        }
    }
}

/// Uncorrelated counts for every batch and item entry in a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSummary {
    pub window: TimeWindow,
    pub batch_operations: BatchSummary,
    pub item_processing: ItemSummary,
}

/// Folded outcome of every chunk of one upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadVerification {
    pub verdict: Verdict,
    pub reports: Vec<MonitorReport>,
}

impl UploadVerification {
    pub fn from_reports(reports: Vec<MonitorReport>) -> Self {
        Self {
            verdict: Verdict::fold(reports.iter().map(|report| report.verdict)),
            reports,
        }
    }
}
