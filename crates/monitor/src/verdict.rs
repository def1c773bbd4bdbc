use std::fmt;

use serde::{Deserialize, Serialize};

use crate::report::{BatchState, BatchStatus, ItemProcessing};

/// Overall outcome of a monitored submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Success,
    Warning,
    Failed,
    NotFound,
}

impl Verdict {
    /// Single-step reduction of batch and item state.
    ///
    /// A missing batch entry wins over everything, then errors (batch or
    /// item), then warnings.
    pub fn reduce(batch: &BatchStatus, items: &ItemProcessing) -> Self {
        match batch.state {
            BatchState::NotFound => Verdict::NotFound,
            BatchState::Error => Verdict::Failed,
            _ if items.has_errors() => Verdict::Failed,
            BatchState::Warning => Verdict::Warning,
            _ if items.has_warnings() => Verdict::Warning,
            BatchState::Completed | BatchState::Unrecognized => Verdict::Success,
        }
    }

    /// Ranking used when several verdicts are folded into one.
    pub fn severity(self) -> u8 {
        match self {
            Verdict::Success => 0,
            Verdict::Warning => 1,
            Verdict::NotFound => 2,
            Verdict::Failed => 3,
        }
    }

    /// The most severe verdict, `Success` for an empty input.
    pub fn fold<I: IntoIterator<Item = Verdict>>(verdicts: I) -> Self {
        verdicts
            .into_iter()
            .max_by_key(|verdict| verdict.severity())
            .unwrap_or(Verdict::Success)
    }

    pub fn is_success(self) -> bool {
        self == Verdict::Success
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Success => "SUCCESS",
            Verdict::Warning => "WARNING",
            Verdict::Failed => "FAILED",
            Verdict::NotFound => "NOT_FOUND",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
