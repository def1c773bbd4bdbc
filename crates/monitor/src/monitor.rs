use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use stream::{
    LogOperation, LogQuery, LogResult, OperationLogEntry, Sleeper, StreamApi, StreamError,
    TimeWindow,
};
use tracing::{debug, info, warn};

use crate::report::{
    BatchState, BatchStatus, BatchSummary, Correlation, ItemProcessing, ItemSummary,
    MonitorReport, OperationSummary, UploadVerification, UNCORRELATED_ORDERING_ID,
};

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const BATCH_RESULTS: [LogResult; 3] = [LogResult::Completed, LogResult::Warning, LogResult::Error];
const ITEM_RESULTS: [LogResult; 2] = [LogResult::Warning, LogResult::Error];

/// Reconciles submitted ordering ids against the operation log.
///
/// Polling is caller-driven: the optional `wait` of each call is a fixed
/// pause before the queries are issued, after which the window end moves to
/// the current time.
pub struct OperationMonitor<A> {
    api: A,
    sleeper: Sleeper,
    clock: Clock,
}

impl<A: StreamApi> OperationMonitor<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            sleeper: Arc::new(std::thread::sleep),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_sleeper<F>(mut self, sleeper: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Sleeps `wait` (if non-zero) and returns the window to query.
    fn settle(&self, window: Option<TimeWindow>, wait: Duration) -> TimeWindow {
        let window = window.unwrap_or_else(|| TimeWindow::last_hour(self.now()));
        if wait.is_zero() {
            return window;
        }
        info!(wait_secs = wait.as_secs(), "monitor_waiting");
        (self.sleeper)(wait);
        window.with_end(self.now())
    }

    fn batch_entries(&self, window: TimeWindow) -> Result<Vec<OperationLogEntry>, StreamError> {
        let query = LogQuery::new(window)
            .operations([LogOperation::BatchFile])
            .results(BATCH_RESULTS);
        self.api.query_logs(&query)
    }

    fn item_entries(&self, window: TimeWindow) -> Result<Vec<OperationLogEntry>, StreamError> {
        let query = LogQuery::new(window)
            .operations([LogOperation::Update])
            .results(ITEM_RESULTS);
        self.api.query_logs(&query)
    }

    /// Batch acceptance of `ordering_id` within `window`.
    pub fn check_batch_status(
        &self,
        ordering_id: i64,
        window: TimeWindow,
    ) -> Result<BatchStatus, StreamError> {
        let entries = self.batch_entries(window)?;
        let status = BatchStatus::from_entries(ordering_id, &entries);
        debug!(ordering_id, state = ?status.state, "batch_status_checked");
        Ok(status)
    }

    /// Item-level warnings and errors within `window`.
    ///
    /// With a non-zero ordering id, entries carrying that id or the
    /// uncorrelated sentinel `0` are kept. `None` and `Some(0)` keep every
    /// entry in the window. The sentinel match is a heuristic and can pull
    /// in issues from other submissions in the same window.
    pub fn check_item_processing(
        &self,
        window: TimeWindow,
        ordering_id: Option<i64>,
    ) -> Result<ItemProcessing, StreamError> {
        let entries = self.item_entries(window)?;
        Ok(ItemProcessing::from_entries(correlation(ordering_id), &entries))
    }

    /// Batch and item check for one ordering id, reduced to a verdict.
    ///
    /// The window defaults to the hour before now.
    pub fn monitor_operation(
        &self,
        ordering_id: i64,
        window: Option<TimeWindow>,
        wait: Duration,
    ) -> Result<MonitorReport, StreamError> {
        let window = self.settle(window, wait);
        let batch = self.check_batch_status(ordering_id, window)?;
        let items = self.check_item_processing(window, Some(ordering_id))?;
        let report = MonitorReport::new(ordering_id, window, batch, items);
        log_report(&report);
        Ok(report)
    }

    /// Counts every batch and item entry in `window` without correlation.
    pub fn operation_summary(&self, window: TimeWindow) -> Result<OperationSummary, StreamError> {
        let batch_entries = self.batch_entries(window)?;
        let item_entries = self.item_entries(window)?;
        let summary = OperationSummary {
            window,
            batch_operations: BatchSummary::from_entries(&batch_entries),
            item_processing: ItemSummary::from_entries(&item_entries),
        };
        info!(
            batches = summary.batch_operations.total,
            batch_errors = summary.batch_operations.errors,
            item_issues = summary.item_processing.total_issues,
            "operation_summary"
        );
        Ok(summary)
    }

    /// Monitors every ordering id of one upload over `[started_at, now]` and
    /// folds the per-chunk verdicts. Logs are queried once for all ids.
    pub fn verify_upload(
        &self,
        ordering_ids: &[i64],
        started_at: DateTime<Utc>,
        wait: Duration,
    ) -> Result<UploadVerification, StreamError> {
        if !wait.is_zero() {
            info!(wait_secs = wait.as_secs(), "monitor_waiting");
            (self.sleeper)(wait);
        }
        let now = self.now();
        let window = TimeWindow {
            start: started_at.min(now),
            end: now,
        };

        let batch_entries = self.batch_entries(window)?;
        let item_entries = self.item_entries(window)?;

        let reports: Vec<MonitorReport> = ordering_ids
            .iter()
            .map(|&ordering_id| {
                let batch = BatchStatus::from_entries(ordering_id, &batch_entries);
                let items = ItemProcessing::from_entries(correlation(Some(ordering_id)), &item_entries);
                let report = MonitorReport::new(ordering_id, window, batch, items);
                log_report(&report);
                report
            })
            .collect();

        let verification = UploadVerification::from_reports(reports);
        info!(
            chunks = ordering_ids.len(),
            verdict = %verification.verdict,
            "upload_verified"
        );
        Ok(verification)
    }
}

fn correlation(ordering_id: Option<i64>) -> Correlation {
    match ordering_id {
        Some(ordering_id) if ordering_id != UNCORRELATED_ORDERING_ID => {
            Correlation::OrderingIdOrSentinel { ordering_id }
        }
        _ => Correlation::Window,
    }
}

fn log_report(report: &MonitorReport) {
    if report.batch.state == BatchState::Unrecognized {
        warn!(ordering_id = report.ordering_id, "unrecognized_batch_result");
    }
    info!(
        ordering_id = report.ordering_id,
        verdict = %report.verdict,
        batch = ?report.batch.state,
        item_warnings = report.items.warnings.len(),
        item_errors = report.items.errors.len(),
        "monitor_verdict"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::Verdict;
    use bytes::Bytes;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Mutex;
    use stream::{FileContainer, StreamReceipt, UpdateMode};

    /// In-memory operation log; only `query_logs` is reachable from the monitor.
    #[derive(Default)]
    struct FakeLogs {
        batch: Vec<OperationLogEntry>,
        items: Vec<OperationLogEntry>,
        queries: Mutex<Vec<LogQuery>>,
    }

    fn unused<T>() -> Result<T, StreamError> {
        Err(StreamError::InvalidConfig("not used by the monitor".into()))
    }

    impl StreamApi for FakeLogs {
        fn create_file_container(&self) -> Result<FileContainer, StreamError> {
            unused()
        }

        fn upload_to_container(&self, _: &FileContainer, _: Bytes) -> Result<(), StreamError> {
            unused()
        }

        fn notify_source(&self, _: &str, _: UpdateMode) -> Result<StreamReceipt, StreamError> {
            unused()
        }

        fn delete_older_than(&self, _: i64) -> Result<(), StreamError> {
            unused()
        }

        fn query_logs(&self, query: &LogQuery) -> Result<Vec<OperationLogEntry>, StreamError> {
            self.queries.lock().unwrap().push(query.clone());
            let source = if query.operations.contains(&LogOperation::BatchFile) {
                &self.batch
            } else {
                &self.items
            };
            Ok(source
                .iter()
                .filter(|entry| query.results.is_empty() || query.results.contains(&entry.result))
                .cloned()
                .collect())
        }
    }

    fn entries(value: serde_json::Value) -> Vec<OperationLogEntry> {
        serde_json::from_value(value).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 22, 12, 0, 0).unwrap()
    }

    fn monitor(logs: FakeLogs) -> OperationMonitor<FakeLogs> {
        OperationMonitor::new(logs)
            .with_sleeper(|_| {})
            .with_clock(now)
    }

    #[test]
    fn completed_batch_without_issues_is_success() {
        let logs = FakeLogs {
            batch: entries(json!([
                {"result": "COMPLETED", "meta": {"orderingid": 1001}, "operation": "BATCH_FILE"}
            ])),
            ..FakeLogs::default()
        };

        let report = monitor(logs)
            .monitor_operation(1001, None, Duration::ZERO)
            .unwrap();
        assert_eq!(report.verdict, Verdict::Success);
        assert_eq!(report.batch.state, BatchState::Completed);
        assert_eq!(report.window, TimeWindow::last_hour(now()));
        assert_eq!(report.message, "Operation completed successfully");
    }

    #[test]
    fn item_warning_is_surfaced() {
        let logs = FakeLogs {
            batch: entries(json!([
                {"result": "COMPLETED", "meta": {"orderingid": 1001}}
            ])),
            items: entries(json!([
                {"result": "WARNING", "id": "product://042", "meta": {"orderingid": 1001, "error": "Field ec_colour is not defined"}}
            ])),
            ..FakeLogs::default()
        };

        let report = monitor(logs)
            .monitor_operation(1001, None, Duration::ZERO)
            .unwrap();
        assert_eq!(report.verdict, Verdict::Warning);
        assert_eq!(report.items.warnings.len(), 1);
        assert_eq!(report.items.warnings[0].document_id, "product://042");
        assert_eq!(report.items.warnings[0].error, "Field ec_colour is not defined");
        assert!(report.items.is_heuristic());
    }

    #[test]
    fn sentinel_entries_match_and_foreign_ids_do_not() {
        let logs = FakeLogs {
            batch: entries(json!([{"result": "COMPLETED", "meta": {"orderingid": 5}}])),
            items: entries(json!([
                {"result": "ERROR", "id": "product://other", "meta": {"orderingid": 6, "error": "x"}},
                {"result": "WARNING", "id": "product://nocorr", "meta": {}}
            ])),
            ..FakeLogs::default()
        };
        let report = monitor(logs).monitor_operation(5, None, Duration::ZERO).unwrap();
        assert_eq!(report.verdict, Verdict::Warning);
        assert_eq!(report.items.errors.len(), 0);
        assert_eq!(report.items.warnings[0].document_id, "product://nocorr");
        assert_eq!(report.items.warnings[0].ordering_id, 0);
    }

    #[test]
    fn zero_ordering_id_keeps_the_whole_window() {
        let logs = FakeLogs {
            items: entries(json!([
                {"result": "ERROR", "id": "product://a", "meta": {"orderingid": 6, "error": "x"}},
                {"result": "WARNING", "id": "product://b", "meta": {}}
            ])),
            ..FakeLogs::default()
        };
        let monitor = monitor(logs);
        let window = TimeWindow::last_hour(now());

        let items = monitor.check_item_processing(window, Some(0)).unwrap();
        assert_eq!(items.correlation, Correlation::Window);
        assert!(!items.is_heuristic());
        assert_eq!(items.total_issues(), 2);
        assert_eq!(items, monitor.check_item_processing(window, None).unwrap());
    }

    #[test]
    fn missing_batch_is_not_found_even_with_item_errors() {
        let logs = FakeLogs {
            items: entries(json!([{"result": "ERROR", "meta": {"orderingid": 9}}])),
            ..FakeLogs::default()
        };
        let report = monitor(logs).monitor_operation(9, None, Duration::ZERO).unwrap();
        assert_eq!(report.verdict, Verdict::NotFound);
        assert_eq!(report.message, "Operation not found");
        assert_eq!(report.items.errors[0].document_id, "Unknown");
        assert_eq!(report.items.errors[0].error, "Unknown error");
    }

    #[test]
    fn batch_error_fails() {
        let logs = FakeLogs {
            batch: entries(json!([{"result": "ERROR", "meta": {"orderingid": 3, "error": "Invalid JSON"}}])),
            ..FakeLogs::default()
        };
        let report = monitor(logs).monitor_operation(3, None, Duration::ZERO).unwrap();
        assert_eq!(report.verdict, Verdict::Failed);
        assert_eq!(report.batch.message(), "Batch failed: Invalid JSON");
        assert_eq!(report.message, "Batch processing failed");
    }

    #[test]
    fn wait_sleeps_then_moves_window_end() {
        let slept = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&slept);
        let calls = Arc::new(Mutex::new(0_i64));
        let ticks = Arc::clone(&calls);

        let monitor = OperationMonitor::new(FakeLogs::default())
            .with_sleeper(move |d| recorder.lock().unwrap().push(d))
            .with_clock(move || {
                let mut n = ticks.lock().unwrap();
                *n += 1;
                now() + chrono::Duration::minutes(5 * (*n - 1))
            });

        let report = monitor
            .monitor_operation(1, None, Duration::from_secs(300))
            .unwrap();
        assert_eq!(*slept.lock().unwrap(), [Duration::from_secs(300)]);
        assert_eq!(report.window.start, now() - chrono::Duration::hours(1));
        assert_eq!(report.window.end, now() + chrono::Duration::minutes(5));
    }

    #[test]
    fn queries_use_the_documented_filters() {
        let monitor = monitor(FakeLogs::default());
        monitor.monitor_operation(1, None, Duration::ZERO).unwrap();

        let queries = monitor.api().queries.lock().unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].operations, [LogOperation::BatchFile]);
        assert_eq!(queries[0].results, BATCH_RESULTS);
        assert_eq!(queries[1].operations, [LogOperation::Update]);
        assert_eq!(queries[1].results, ITEM_RESULTS);
    }

    #[test]
    fn summary_counts_everything_in_window() {
        let issues: Vec<serde_json::Value> = (0..12)
            .map(|i| {
                let result = if i % 3 == 0 { "ERROR" } else { "WARNING" };
                json!({"result": result, "id": format!("product://{i}"), "meta": {}})
            })
            .collect();
        let logs = FakeLogs {
            batch: entries(json!([
                {"result": "COMPLETED", "meta": {"orderingid": 1, "error": "ignored"}},
                {"result": "WARNING", "meta": {"orderingid": 2, "error": "3 items skipped"}},
                {"result": "ERROR", "meta": {"orderingid": 3}}
            ])),
            items: entries(serde_json::Value::Array(issues)),
            ..FakeLogs::default()
        };

        let summary = monitor(logs)
            .operation_summary(TimeWindow::last_hour(now()))
            .unwrap();

        let batch = &summary.batch_operations;
        assert_eq!((batch.total, batch.successful, batch.warnings, batch.errors), (3, 1, 1, 1));
        assert_eq!(batch.operations[0].error, None);
        assert_eq!(batch.operations[1].error.as_deref(), Some("3 items skipped"));

        let items = &summary.item_processing;
        assert_eq!((items.total_issues, items.warnings, items.errors), (12, 8, 4));
        assert_eq!(items.sample_issues.len(), 10);
        assert_eq!(items.sample_issues[0].document_id, "product://0");
    }

    #[test]
    fn verify_upload_folds_chunk_verdicts() {
        let logs = FakeLogs {
            batch: entries(json!([
                {"result": "COMPLETED", "meta": {"orderingid": 10}},
                {"result": "WARNING", "meta": {"orderingid": 11, "error": "slow"}}
            ])),
            ..FakeLogs::default()
        };
        let monitor = monitor(logs);
        let started = now() - chrono::Duration::minutes(2);

        let verification = monitor
            .verify_upload(&[10, 11], started, Duration::ZERO)
            .unwrap();
        assert_eq!(verification.verdict, Verdict::Warning);
        assert_eq!(verification.reports.len(), 2);
        assert_eq!(verification.reports[0].verdict, Verdict::Success);
        assert_eq!(verification.reports[0].window.start, started);
        assert_eq!(verification.reports[0].window.end, now());
        // one batch and one item query for the whole upload
        assert_eq!(monitor.api().queries.lock().unwrap().len(), 2);

        let verification = monitor
            .verify_upload(&[10, 11, 12], started, Duration::ZERO)
            .unwrap();
        assert_eq!(verification.verdict, Verdict::NotFound);
    }
}
