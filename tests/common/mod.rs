//! In-memory stand-in for the platform shared by the integration tests.
#![allow(dead_code)]

use std::sync::Mutex;

use bytes::Bytes;
use serde_json::Value;
use stream::{
    FileContainer, LogOperation, LogQuery, OperationLogEntry, StreamApi, StreamError,
    StreamReceipt, UpdateMode,
};

pub const FIRST_ORDERING_ID: i64 = 1_716_383_000_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create,
    Upload { file_id: String, bytes: Bytes },
    Notify { file_id: String, mode: UpdateMode },
    DeleteOlderThan(i64),
    QueryLogs(Vec<LogOperation>),
}

#[derive(Default)]
pub struct FakePlatform {
    pub calls: Mutex<Vec<Call>>,
    /// Zero-based container upload that fails with a 500.
    pub fail_upload: Option<usize>,
    pub fail_delete: bool,
    pub fail_logs: bool,
    pub batch_logs: Vec<OperationLogEntry>,
    pub item_logs: Vec<OperationLogEntry>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logs(mut self, batch: Value, items: Value) -> Self {
        self.batch_logs = serde_json::from_value(batch).unwrap();
        self.item_logs = serde_json::from_value(items).unwrap();
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn uploaded(&self) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Upload { bytes, .. } => Some(serde_json::from_slice(&bytes).unwrap()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) -> usize {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        calls.len()
    }

    fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }
}

impl StreamApi for FakePlatform {
    fn create_file_container(&self) -> Result<FileContainer, StreamError> {
        let n = self.count(|c| matches!(c, Call::Create));
        self.record(Call::Create);
        Ok(FileContainer {
            upload_uri: format!("https://bucket.example.com/file-{n}"),
            file_id: format!("file-{n}"),
            required_headers: Default::default(),
        })
    }

    fn upload_to_container(&self, container: &FileContainer, data: Bytes) -> Result<(), StreamError> {
        let n = self.count(|c| matches!(c, Call::Upload { .. }));
        if self.fail_upload == Some(n) {
            return Err(StreamError::Http {
                status: 500,
                body: "storage unavailable".into(),
            });
        }
        self.record(Call::Upload {
            file_id: container.file_id.clone(),
            bytes: data,
        });
        Ok(())
    }

    fn notify_source(&self, file_id: &str, mode: UpdateMode) -> Result<StreamReceipt, StreamError> {
        let n = self.count(|c| matches!(c, Call::Notify { .. }));
        self.record(Call::Notify {
            file_id: file_id.to_string(),
            mode,
        });
        Ok(StreamReceipt {
            ordering_id: FIRST_ORDERING_ID + n as i64,
            request_id: format!("req-{n}"),
        })
    }

    fn delete_older_than(&self, ordering_id: i64) -> Result<(), StreamError> {
        self.record(Call::DeleteOlderThan(ordering_id));
        if self.fail_delete {
            return Err(StreamError::Http {
                status: 403,
                body: "forbidden".into(),
            });
        }
        Ok(())
    }

    fn query_logs(&self, query: &LogQuery) -> Result<Vec<OperationLogEntry>, StreamError> {
        self.record(Call::QueryLogs(query.operations.clone()));
        if self.fail_logs {
            return Err(StreamError::Transport("connection reset".into()));
        }
        let source = if query.operations.contains(&LogOperation::BatchFile) {
            &self.batch_logs
        } else {
            &self.item_logs
        };
        Ok(source
            .iter()
            .filter(|e| query.results.is_empty() || query.results.contains(&e.result))
            .cloned()
            .collect())
    }
}

/// A catalog of `count` products in the legacy casing.
pub fn legacy_catalog(count: usize) -> Value {
    let items: Vec<Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "DocumentId": format!("product://{i:04}"),
                "ObjectType": "Product",
                "ec_name": format!("Product {i}"),
                "ec_price": 10.0 + i as f64
            })
        })
        .collect();
    serde_json::json!({ "AddOrUpdate": items })
}
