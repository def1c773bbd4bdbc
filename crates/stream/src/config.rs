use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::retry::RetryPolicy;
use crate::types::UpdateMode;

pub const DEFAULT_API_BASE_URL: &str = "https://api.cloud.coveo.com";

/// Connection settings for one organization and source.
///
/// # Example
/// ```
/// use stream::StreamConfig;
///
/// let cfg = StreamConfig::new("acmeorg", "xx-key", "acmeorg-src1");
/// assert_eq!(
///     cfg.files_url(),
///     "https://api.cloud.coveo.com/push/v1/organizations/acmeorg/files"
/// );
/// ```
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub api_base_url: String,
    pub organization_id: String,
    pub api_key: String,
    pub source_id: String,
    /// Forwarded as `useVirtualHostedStyleUrl` when creating containers.
    pub use_virtual_hosted_style_url: bool,
    /// Timeout for platform calls.
    pub request_timeout: Duration,
    /// Timeout for the raw container upload, which can carry hundreds of MiB.
    pub upload_timeout: Duration,
    pub retry: RetryPolicy,
}

impl fmt::Debug for StreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamConfig")
            .field("api_base_url", &self.api_base_url)
            .field("organization_id", &self.organization_id)
            .field("api_key", &"<redacted>")
            .field("source_id", &self.source_id)
            .field(
                "use_virtual_hosted_style_url",
                &self.use_virtual_hosted_style_url,
            )
            .field("request_timeout", &self.request_timeout)
            .field("upload_timeout", &self.upload_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl StreamConfig {
    pub fn new(
        organization_id: impl Into<String>,
        api_key: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            organization_id: organization_id.into(),
            api_key: api_key.into(),
            source_id: source_id.into(),
            use_virtual_hosted_style_url: true,
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(30 * 60),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn with_virtual_hosted_style_url(mut self, enabled: bool) -> Self {
        self.use_virtual_hosted_style_url = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        let base = self.api_base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(StreamError::InvalidConfig(format!(
                "api_base_url must be an http(s) URL, got '{base}'"
            )));
        }
        for (name, value) in [
            ("organization_id", &self.organization_id),
            ("api_key", &self.api_key),
            ("source_id", &self.source_id),
        ] {
            if value.trim().is_empty() {
                return Err(StreamError::InvalidConfig(format!("{name} must not be empty")));
            }
        }
        if self.retry.max_attempts == 0 {
            return Err(StreamError::InvalidConfig(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn base(&self) -> &str {
        self.api_base_url.trim().trim_end_matches('/')
    }

    fn source_url(&self) -> String {
        format!(
            "{}/push/v1/organizations/{}/sources/{}",
            self.base(),
            self.organization_id,
            self.source_id
        )
    }

    pub fn files_url(&self) -> String {
        format!(
            "{}/push/v1/organizations/{}/files",
            self.base(),
            self.organization_id
        )
    }

    pub fn stream_url(&self, mode: UpdateMode) -> String {
        format!("{}/stream/{}", self.source_url(), mode.endpoint())
    }

    pub fn delete_older_than_url(&self, ordering_id: i64) -> String {
        format!("{}/stream/deleteolderthan/{ordering_id}", self.source_url())
    }

    pub fn logs_url(&self) -> String {
        format!(
            "{}/logs/v1/organizations/{}",
            self.base(),
            self.organization_id
        )
    }
}
