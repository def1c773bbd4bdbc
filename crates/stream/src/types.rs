use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::StreamError;

/// A temporary write target returned by the Push API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContainer {
    pub upload_uri: String,
    pub file_id: String,
    /// Headers the storage backend expects on the upload request, and only those.
    #[serde(default)]
    pub required_headers: BTreeMap<String, String>,
}

/// Correlation pair returned when a source is told to ingest a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamReceipt {
    pub ordering_id: i64,
    pub request_id: String,
}

/// How a source ingests an uploaded container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateMode {
    /// `addOrUpdate` / `delete` documents.
    Update,
    /// `partialUpdate` documents, sent through the update endpoint.
    PartialUpdate,
    /// `addOrMerge` documents.
    Merge,
}

impl UpdateMode {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateMode::Update => "update",
            UpdateMode::PartialUpdate => "partialUpdate",
            UpdateMode::Merge => "merge",
        }
    }

    /// Last path segment of the stream endpoint for this mode.
    pub fn endpoint(self) -> &'static str {
        match self {
            UpdateMode::Update | UpdateMode::PartialUpdate => "update",
            UpdateMode::Merge => "merge",
        }
    }
}

impl fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogTask {
    StreamingExtension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogOperation {
    /// One entry per ingested container.
    BatchFile,
    /// One entry per document with a processing problem.
    Update,
}

/// Outcome recorded on a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogResult {
    Completed,
    Warning,
    Error,
    #[serde(other)]
    Unknown,
}

impl LogResult {
    pub fn as_str(self) -> &'static str {
        match self {
            LogResult::Completed => "COMPLETED",
            LogResult::Warning => "WARNING",
            LogResult::Error => "ERROR",
            LogResult::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for LogResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata attached to a log entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogMeta {
    /// Zero when the platform did not propagate an ordering id.
    #[serde(
        rename = "orderingid",
        default,
        deserialize_with = "lenient::ordering_id"
    )]
    pub ordering_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One entry of the operation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationLogEntry {
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub operation: String,
    pub result: LogResult,
    #[serde(default)]
    pub meta: LogMeta,
    /// Document id for item-level entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Inclusive UTC window for log queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub const QUERY_FORMAT: &'static str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, StreamError> {
        if end < start {
            return Err(StreamError::InvalidWindow(format!(
                "end {} precedes start {}",
                end.format(Self::QUERY_FORMAT),
                start.format(Self::QUERY_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    /// The hour leading up to `now`.
    pub fn last_hour(now: DateTime<Utc>) -> Self {
        Self::trailing(ChronoDuration::hours(1), now)
    }

    pub fn trailing(length: ChronoDuration, now: DateTime<Utc>) -> Self {
        Self {
            start: now - length,
            end: now,
        }
    }

    /// 00:00:00 to 23:59:59 UTC of `date`.
    pub fn for_date(date: NaiveDate) -> Self {
        let start = Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN));
        Self {
            start,
            end: start + ChronoDuration::seconds(86_399),
        }
    }

    /// Same start, new end. The end never moves before the start.
    pub fn with_end(self, end: DateTime<Utc>) -> Self {
        Self {
            start: self.start,
            end: end.max(self.start),
        }
    }

    /// `from` / `to` query parameters at second precision.
    pub fn query_params(&self) -> [(&'static str, String); 2] {
        [
            ("from", self.start.format(Self::QUERY_FORMAT).to_string()),
            ("to", self.end.format(Self::QUERY_FORMAT).to_string()),
        ]
    }
}

/// Filtered read of the operation log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogQuery {
    pub window: TimeWindow,
    pub tasks: Vec<LogTask>,
    pub operations: Vec<LogOperation>,
    /// Empty means every result.
    pub results: Vec<LogResult>,
}

impl LogQuery {
    pub fn new(window: TimeWindow) -> Self {
        Self {
            window,
            tasks: vec![LogTask::StreamingExtension],
            operations: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn operations(mut self, operations: impl IntoIterator<Item = LogOperation>) -> Self {
        self.operations = operations.into_iter().collect();
        self
    }

    pub fn results(mut self, results: impl IntoIterator<Item = LogResult>) -> Self {
        self.results = results.into_iter().collect();
        self
    }

    /// Request body scoped to one source.
    pub fn body<'a>(&'a self, source_id: &'a str) -> LogQueryBody<'a> {
        LogQueryBody {
            tasks: &self.tasks,
            operations: &self.operations,
            sources_ids: [source_id],
            results: (!self.results.is_empty()).then_some(self.results.as_slice()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogQueryBody<'a> {
    tasks: &'a [LogTask],
    operations: &'a [LogOperation],
    sources_ids: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<&'a [LogResult]>,
}

mod lenient {
    use super::*;

    /// Accepts an integer, a numeric string or null.
    pub fn ordering_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(0),
            Value::String(s) => s.trim().parse().unwrap_or(0),
            _ => 0,
        })
    }

    /// Accepts RFC 3339 strings or epoch milliseconds.
    pub fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Value::Number(n) => n.as_i64().and_then(DateTime::<Utc>::from_timestamp_millis),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn log_entries_parse_leniently() {
        let entries: Vec<OperationLogEntry> = serde_json::from_value(json!([
            {
                "task": "STREAMING_EXTENSION",
                "operation": "BATCH_FILE",
                "result": "COMPLETED",
                "meta": {"orderingid": 1716383000000_i64},
                "timestamp": "2024-05-22T13:03:20.123Z"
            },
            {
                "task": "STREAMING_EXTENSION",
                "operation": "UPDATE",
                "result": "WARNING",
                "meta": {"orderingid": "42", "error": "Unknown field ec_colour"},
                "id": "product://001",
                "timestamp": 1716383000000_i64
            },
            {"result": "SKIPPED"}
        ]))
        .unwrap();

        assert_eq!(entries[0].result, LogResult::Completed);
        assert_eq!(entries[0].meta.ordering_id, 1_716_383_000_000);
        assert!(entries[0].timestamp.is_some());

        assert_eq!(entries[1].meta.ordering_id, 42);
        assert_eq!(entries[1].meta.error.as_deref(), Some("Unknown field ec_colour"));
        assert_eq!(
            entries[1].timestamp,
            DateTime::<Utc>::from_timestamp_millis(1_716_383_000_000)
        );

        assert_eq!(entries[2].result, LogResult::Unknown);
        assert_eq!(entries[2].meta.ordering_id, 0);
        assert_eq!(entries[2].id, None);
    }

    #[test]
    fn query_body_matches_logs_api() {
        let window = TimeWindow::for_date(NaiveDate::from_ymd_opt(2024, 5, 22).unwrap());
        let query = LogQuery::new(window)
            .operations([LogOperation::BatchFile])
            .results([LogResult::Completed, LogResult::Warning, LogResult::Error]);

        assert_eq!(
            serde_json::to_value(query.body("src-1")).unwrap(),
            json!({
                "tasks": ["STREAMING_EXTENSION"],
                "operations": ["BATCH_FILE"],
                "sourcesIds": ["src-1"],
                "results": ["COMPLETED", "WARNING", "ERROR"]
            })
        );

        let unfiltered = LogQuery::new(window).operations([LogOperation::Update]);
        let body = serde_json::to_value(unfiltered.body("src-1")).unwrap();
        assert!(body.get("results").is_none());
    }

    #[test]
    fn windows() {
        let day = TimeWindow::for_date(NaiveDate::from_ymd_opt(2024, 5, 22).unwrap());
        assert_eq!(
            day.query_params(),
            [
                ("from", "2024-05-22T00:00:00Z".to_string()),
                ("to", "2024-05-22T23:59:59Z".to_string()),
            ]
        );

        let now = Utc.with_ymd_and_hms(2024, 5, 22, 12, 30, 0).unwrap();
        let hour = TimeWindow::last_hour(now);
        assert_eq!(hour.end - hour.start, ChronoDuration::hours(1));

        assert!(TimeWindow::new(now, now - ChronoDuration::seconds(1)).is_err());
        assert_eq!(hour.with_end(hour.start - ChronoDuration::hours(3)).end, hour.start);
    }

    #[test]
    fn update_mode_endpoints() {
        assert_eq!(UpdateMode::Update.endpoint(), "update");
        assert_eq!(UpdateMode::PartialUpdate.endpoint(), "update");
        assert_eq!(UpdateMode::Merge.endpoint(), "merge");
        assert_eq!(UpdateMode::PartialUpdate.to_string(), "partialUpdate");
    }
}
