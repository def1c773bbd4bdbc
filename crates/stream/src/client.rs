use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::json;
use tracing::{debug, info};

use crate::api::StreamApi;
use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::retry::{disposition, Attempt, Disposition};
use crate::types::{FileContainer, LogQuery, OperationLogEntry, StreamReceipt, UpdateMode};

/// Pause implementation used between attempts.
pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Blocking HTTP client for the Push, Stream and Logs APIs.
///
/// Every call runs under the configured [`RetryPolicy`](crate::RetryPolicy).
/// Platform calls carry the bearer token; container uploads carry only the
/// headers the container asked for.
///
/// # Example
/// ```no_run
/// use stream::{StreamApi, StreamClient, StreamConfig, UpdateMode};
///
/// let client = StreamClient::new(StreamConfig::new("acmeorg", "xx-key", "acmeorg-src1"))?;
/// let container = client.create_file_container()?;
/// client.upload_to_container(&container, br#"{"addOrUpdate":[]}"#.to_vec().into())?;
/// let receipt = client.notify_source(&container.file_id, UpdateMode::Update)?;
/// println!("ordering id {}", receipt.ordering_id);
/// # Ok::<(), stream::StreamError>(())
/// ```
#[derive(Clone)]
pub struct StreamClient {
    http: Client,
    config: StreamConfig,
    platform_headers: HeaderMap,
    sleeper: Sleeper,
}

impl fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClient")
            .field("api_base_url", &self.config.api_base_url)
            .field("organization_id", &self.config.organization_id)
            .field("source_id", &self.config.source_id)
            .finish_non_exhaustive()
    }
}

impl StreamClient {
    pub fn new(config: StreamConfig) -> Result<Self, StreamError> {
        config.validate()?;

        let mut platform_headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| StreamError::InvalidConfig(format!("invalid api key format: {e}")))?;
        platform_headers.insert(AUTHORIZATION, bearer);
        platform_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        platform_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StreamError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        info!(
            organization_id = %config.organization_id,
            source_id = %config.source_id,
            "stream_client_initialized"
        );

        Ok(Self {
            http,
            config,
            platform_headers,
            sleeper: Arc::new(std::thread::sleep),
        })
    }

    /// Replaces the pause used for backoff and rate-limit waits.
    pub fn with_sleeper<F>(mut self, sleeper: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Sends the request under the retry policy and returns the success body.
    ///
    /// The body is read inside the attempt, so a connection dropped mid-body
    /// is retried like any other transport failure. Decoding happens after.
    fn send<B>(&self, label: &str, build: B) -> Result<Bytes, StreamError>
    where
        B: Fn() -> RequestBuilder,
    {
        let sleeper = &self.sleeper;
        self.config
            .retry
            .execute(label, |delay| sleeper(delay), |_| match build().send() {
                Ok(response) => match disposition(response.status(), response.headers()) {
                    Disposition::Success => read_body(response),
                    Disposition::RateLimited(wait) => Attempt::RateLimited(wait),
                    Disposition::Rejected => {
                        let status = response.status().as_u16();
                        let body = response.text().unwrap_or_default();
                        Attempt::Failed(StreamError::Http { status, body })
                    }
                },
                Err(err) => Attempt::Failed(err.into()),
            })
    }

    fn platform(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.headers(self.platform_headers.clone())
    }
}

impl StreamApi for StreamClient {
    fn create_file_container(&self) -> Result<FileContainer, StreamError> {
        let url = self.config.files_url();
        let virtual_hosted = self.config.use_virtual_hosted_style_url;
        let body = self.send("create_file_container", || {
            self.platform(self.http.post(&url))
                .query(&[("useVirtualHostedStyleUrl", virtual_hosted)])
        })?;
        let container: FileContainer = serde_json::from_slice(&body)?;
        info!(file_id = %container.file_id, "container_created");
        Ok(container)
    }

    fn upload_to_container(&self, container: &FileContainer, data: Bytes) -> Result<(), StreamError> {
        let headers = required_headers(container)?;
        let size = data.len();
        self.send("upload_to_container", || {
            self.http
                .put(&container.upload_uri)
                .headers(headers.clone())
                .timeout(self.config.upload_timeout)
                .body(data.clone())
        })?;
        debug!(file_id = %container.file_id, bytes = size, "container_uploaded");
        Ok(())
    }

    fn notify_source(&self, file_id: &str, mode: UpdateMode) -> Result<StreamReceipt, StreamError> {
        let url = self.config.stream_url(mode);
        let body = self.send("notify_source", || {
            self.platform(self.http.put(&url))
                .query(&[("fileId", file_id)])
                .json(&json!({}))
        })?;
        let receipt: StreamReceipt = serde_json::from_slice(&body)?;
        info!(
            file_id,
            mode = %mode,
            ordering_id = receipt.ordering_id,
            request_id = %receipt.request_id,
            "source_notified"
        );
        Ok(receipt)
    }

    fn delete_older_than(&self, ordering_id: i64) -> Result<(), StreamError> {
        let url = self.config.delete_older_than_url(ordering_id);
        self.send("delete_older_than", || self.platform(self.http.post(&url)))?;
        info!(ordering_id, "older_items_deleted");
        Ok(())
    }

    fn query_logs(&self, query: &LogQuery) -> Result<Vec<OperationLogEntry>, StreamError> {
        let url = self.config.logs_url();
        let params = query.window.query_params();
        let body = query.body(&self.config.source_id);
        let raw = self.send("query_logs", || {
            self.platform(self.http.post(&url)).query(&params).json(&body)
        })?;
        let entries: Vec<OperationLogEntry> = serde_json::from_slice(&raw)?;
        debug!(
            entries = entries.len(),
            from = %params[0].1,
            to = %params[1].1,
            "logs_queried"
        );
        Ok(entries)
    }
}

fn read_body(response: Response) -> Attempt<Bytes> {
    match response.bytes() {
        Ok(body) => Attempt::Done(body),
        Err(err) => Attempt::Failed(StreamError::Transport(format!(
            "failed to read response body: {err}"
        ))),
    }
}

fn required_headers(container: &FileContainer) -> Result<HeaderMap, StreamError> {
    let mut headers = HeaderMap::with_capacity(container.required_headers.len());
    for (name, value) in &container.required_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| StreamError::Decode(format!("invalid required header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| StreamError::Decode(format!("invalid value for header '{name}': {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}
