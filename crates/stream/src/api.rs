use std::sync::Arc;

use bytes::Bytes;

use crate::error::StreamError;
use crate::types::{FileContainer, LogQuery, OperationLogEntry, StreamReceipt, UpdateMode};

/// The remote operations the uploader and the monitor rely on.
///
/// [`StreamClient`](crate::StreamClient) is the HTTP implementation; tests
/// swap in an in-memory one.
pub trait StreamApi {
    /// Requests a fresh write target.
    fn create_file_container(&self) -> Result<FileContainer, StreamError>;

    /// Transfers `data` to the container using only its required headers.
    fn upload_to_container(&self, container: &FileContainer, data: Bytes)
        -> Result<(), StreamError>;

    /// Tells the source a container is ready to be ingested.
    fn notify_source(&self, file_id: &str, mode: UpdateMode) -> Result<StreamReceipt, StreamError>;

    /// Retires every item indexed before `ordering_id`.
    fn delete_older_than(&self, ordering_id: i64) -> Result<(), StreamError>;

    fn query_logs(&self, query: &LogQuery) -> Result<Vec<OperationLogEntry>, StreamError>;
}

impl<T: StreamApi + ?Sized> StreamApi for &T {
    fn create_file_container(&self) -> Result<FileContainer, StreamError> {
        (**self).create_file_container()
    }

    fn upload_to_container(
        &self,
        container: &FileContainer,
        data: Bytes,
    ) -> Result<(), StreamError> {
        (**self).upload_to_container(container, data)
    }

    fn notify_source(&self, file_id: &str, mode: UpdateMode) -> Result<StreamReceipt, StreamError> {
        (**self).notify_source(file_id, mode)
    }

    fn delete_older_than(&self, ordering_id: i64) -> Result<(), StreamError> {
        (**self).delete_older_than(ordering_id)
    }

    fn query_logs(&self, query: &LogQuery) -> Result<Vec<OperationLogEntry>, StreamError> {
        (**self).query_logs(query)
    }
}

impl<T: StreamApi + ?Sized> StreamApi for Arc<T> {
    fn create_file_container(&self) -> Result<FileContainer, StreamError> {
        (**self).create_file_container()
    }

    fn upload_to_container(
        &self,
        container: &FileContainer,
        data: Bytes,
    ) -> Result<(), StreamError> {
        (**self).upload_to_container(container, data)
    }

    fn notify_source(&self, file_id: &str, mode: UpdateMode) -> Result<StreamReceipt, StreamError> {
        (**self).notify_source(file_id, mode)
    }

    fn delete_older_than(&self, ordering_id: i64) -> Result<(), StreamError> {
        (**self).delete_older_than(ordering_id)
    }

    fn query_logs(&self, query: &LogQuery) -> Result<Vec<OperationLogEntry>, StreamError> {
        (**self).query_logs(query)
    }
}
