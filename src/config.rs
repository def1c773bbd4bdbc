//! JSON configuration file support
//!
//! The configuration names the platform tenant and the numeric limits of the
//! upload pipeline. Any value may reference an environment variable as
//! `${NAME}`; placeholders are resolved against the process environment after
//! loading an optional `.env` file, and an unresolved one fails the load.
//!
//! ## Example configuration
//!
//! ```json
//! {
//!   "platform": {
//!     "api_base_url": "https://api.cloud.coveo.com",
//!     "organization_id": "${ORGANIZATION_ID}",
//!     "api_key": "${API_KEY}",
//!     "source_id": "${SOURCE_ID}",
//!     "use_virtual_hosted_style_url": true
//!   },
//!   "default_settings": {
//!     "retry_attempts": 3,
//!     "retry_delay_seconds": 5,
//!     "request_timeout_seconds": 30,
//!     "verify_wait_minutes": 5
//!   },
//!   "limits": {
//!     "max_file_size_mb": 256,
//!     "upload_timeout_minutes": 30
//!   }
//! }
//! ```
//!
//! The `platform` section is also accepted under its legacy name `coveo`.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use payload::PayloadChunker;
use regex::Regex;
use serde::{Deserialize, Serialize};
use stream::{RetryPolicy, StreamConfig, DEFAULT_API_BASE_URL};
use thiserror::Error;
use tracing::{debug, warn};

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/catalog-config.json";

/// Prefix of the values shipped in the configuration template.
pub const TEMPLATE_MARKER: &str = "YOUR_";

const PLACEHOLDER_PATTERN: &str = r"\$\{([^}]+)\}";

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in config file: {0}")]
    Parse(#[from] serde_json::Error),

    /// A `${NAME}` placeholder names a variable that is not set.
    #[error("environment variable {0} is not set")]
    UnresolvedPlaceholder(String),

    #[error("missing required configuration: {0}")]
    MissingValue(&'static str),

    /// The value still holds the template default.
    #[error("please update configuration value: {0}")]
    TemplateValue(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration of the upload pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(alias = "coveo")]
    pub platform: PlatformConfig,

    #[serde(default)]
    pub default_settings: DefaultSettings,

    #[serde(default)]
    pub limits: Limits,
}

/// Tenant coordinates and credentials.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default)]
    pub organization_id: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub source_id: String,

    #[serde(default = "default_true")]
    pub use_virtual_hosted_style_url: bool,
}

impl fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("api_base_url", &self.api_base_url)
            .field("organization_id", &self.organization_id)
            .field("api_key", &"<redacted>")
            .field("source_id", &self.source_id)
            .field(
                "use_virtual_hosted_style_url",
                &self.use_virtual_hosted_style_url,
            )
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultSettings {
    /// Total attempts per request, the first one included.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base of the exponential backoff, also the 429 wait without `Retry-After`.
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Pause between submission and log verification.
    #[serde(default = "default_verify_wait_minutes")]
    pub verify_wait_minutes: u64,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            retry_attempts: default_retry_attempts(),
            retry_delay_seconds: default_retry_delay_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
            verify_wait_minutes: default_verify_wait_minutes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limits {
    /// Ceiling of one uploaded file; larger payloads are chunked.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: usize,

    #[serde(default = "default_upload_timeout_minutes")]
    pub upload_timeout_minutes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size_mb(),
            upload_timeout_minutes: default_upload_timeout_minutes(),
        }
    }
}

impl AppConfig {
    /// Loads `.env` when present, then reads `path` against the process
    /// environment.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(env_file) => debug!(path = %env_file.display(), "env_file_loaded"),
            Err(err) if err.not_found() => {}
            Err(err) => warn!(error = %err, "env_file_unreadable"),
        }
        Self::from_file_with(path, |name| std::env::var(name).ok())
    }

    /// Reads and validates `path`, resolving placeholders through `lookup`.
    pub fn from_file_with<P, F>(path: P, lookup: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_with(&content, lookup)
    }

    /// Parses and validates a configuration document.
    pub fn from_json_with<F>(json: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let resolved = substitute_placeholders(json, lookup)?;
        let config: AppConfig = serde_json::from_str(&resolved)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let platform = &self.platform;
        for (key, value) in [
            ("platform.organization_id", &platform.organization_id),
            ("platform.api_key", &platform.api_key),
            ("platform.source_id", &platform.source_id),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingValue(key));
            }
            if value.starts_with(TEMPLATE_MARKER) {
                return Err(ConfigError::TemplateValue(key));
            }
        }
        if platform.api_base_url.trim().is_empty() {
            return Err(ConfigError::MissingValue("platform.api_base_url"));
        }
        if self.default_settings.retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "default_settings.retry_attempts must be at least 1".into(),
            ));
        }
        if self.default_settings.request_timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "default_settings.request_timeout_seconds must be at least 1".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_file_size_mb must be at least 1".into(),
            ));
        }
        if self.limits.upload_timeout_minutes == 0 {
            return Err(ConfigError::Invalid(
                "limits.upload_timeout_minutes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let delay = Duration::from_secs(self.default_settings.retry_delay_seconds);
        RetryPolicy::default()
            .with_max_attempts(self.default_settings.retry_attempts)
            .with_base_delay(delay)
            .with_default_rate_limit_wait(delay)
    }

    /// Client settings for [`stream::StreamClient`].
    pub fn stream_config(&self) -> StreamConfig {
        let platform = &self.platform;
        StreamConfig::new(
            platform.organization_id.clone(),
            platform.api_key.clone(),
            platform.source_id.clone(),
        )
        .with_base_url(platform.api_base_url.clone())
        .with_virtual_hosted_style_url(platform.use_virtual_hosted_style_url)
        .with_request_timeout(Duration::from_secs(
            self.default_settings.request_timeout_seconds,
        ))
        .with_upload_timeout(Duration::from_secs(self.limits.upload_timeout_minutes * 60))
        .with_retry(self.retry_policy())
    }

    pub fn max_chunk_bytes(&self) -> usize {
        self.limits.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn chunker(&self) -> PayloadChunker {
        PayloadChunker::new(self.max_chunk_bytes())
    }

    pub fn verify_wait(&self) -> Duration {
        Duration::from_secs(self.default_settings.verify_wait_minutes * 60)
    }
}

/// Replaces every `${NAME}` in `text` with `lookup(NAME)`.
///
/// The first name `lookup` cannot resolve is reported as
/// [`ConfigError::UnresolvedPlaceholder`].
pub fn substitute_placeholders<F>(text: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let pattern =
        Regex::new(PLACEHOLDER_PATTERN).map_err(|err| ConfigError::Invalid(err.to_string()))?;

    let mut resolved = String::with_capacity(text.len());
    let mut copied = 0;
    for captures in pattern.captures_iter(text) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let name = name.as_str();
        let value =
            lookup(name).ok_or_else(|| ConfigError::UnresolvedPlaceholder(name.to_string()))?;
        resolved.push_str(&text[copied..whole.start()]);
        resolved.push_str(&value);
        copied = whole.end();
    }
    resolved.push_str(&text[copied..]);
    Ok(resolved)
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_true() -> bool {
    true
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_seconds() -> u64 {
    5
}

fn default_request_timeout_seconds() -> u64 {
    30
}

fn default_verify_wait_minutes() -> u64 {
    5
}

fn default_max_file_size_mb() -> usize {
    256
}

fn default_upload_timeout_minutes() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const TEMPLATE: &str = r#"{
        "coveo": {
            "organization_id": "${ORG_ID}",
            "api_key": "${API_KEY}",
            "source_id": "catalog-source"
        },
        "default_settings": {"retry_attempts": ${RETRIES}},
        "limits": {"max_file_size_mb": 64}
    }"#;

    #[test]
    fn resolves_placeholders_and_fills_defaults() {
        let config = AppConfig::from_json_with(
            TEMPLATE,
            env(&[("ORG_ID", "acme"), ("API_KEY", "xx-secret"), ("RETRIES", "4")]),
        )
        .unwrap();

        assert_eq!(config.platform.organization_id, "acme");
        assert_eq!(config.platform.api_base_url, DEFAULT_API_BASE_URL);
        assert!(config.platform.use_virtual_hosted_style_url);
        assert_eq!(config.default_settings.retry_attempts, 4);
        assert_eq!(config.default_settings.retry_delay_seconds, 5);
        assert_eq!(config.limits.upload_timeout_minutes, 30);
        assert_eq!(config.max_chunk_bytes(), 64 * 1024 * 1024);
        assert_eq!(config.verify_wait(), Duration::from_secs(300));
    }

    #[test]
    fn unresolved_placeholder_fails_fast() {
        let err = AppConfig::from_json_with(TEMPLATE, env(&[("ORG_ID", "acme")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvedPlaceholder(ref name) if name == "API_KEY"));
        assert_eq!(err.to_string(), "environment variable API_KEY is not set");
    }

    #[test]
    fn template_values_are_rejected() {
        let json = r#"{"platform": {"organization_id": "YOUR_ORG", "api_key": "k", "source_id": "s"}}"#;
        let err = AppConfig::from_json_with(json, env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::TemplateValue("platform.organization_id")));

        let json = r#"{"platform": {"organization_id": "org", "api_key": "", "source_id": "s"}}"#;
        let err = AppConfig::from_json_with(json, env(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue("platform.api_key")));
    }

    #[test]
    fn limits_must_be_positive() {
        let json = r#"{
            "platform": {"organization_id": "o", "api_key": "k", "source_id": "s"},
            "default_settings": {"retry_attempts": 0}
        }"#;
        assert!(matches!(
            AppConfig::from_json_with(json, env(&[])),
            Err(ConfigError::Invalid(_))
        ));

        let json = r#"{
            "platform": {"organization_id": "o", "api_key": "k", "source_id": "s"},
            "limits": {"max_file_size_mb": 0}
        }"#;
        assert!(matches!(
            AppConfig::from_json_with(json, env(&[])),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn converts_into_client_settings() {
        let json = r#"{
            "platform": {
                "api_base_url": "https://platform.example.com",
                "organization_id": "o", "api_key": "k", "source_id": "s",
                "use_virtual_hosted_style_url": false
            },
            "default_settings": {"retry_attempts": 2, "retry_delay_seconds": 1, "request_timeout_seconds": 10},
            "limits": {"upload_timeout_minutes": 2}
        }"#;
        let config = AppConfig::from_json_with(json, env(&[])).unwrap();
        let stream = config.stream_config();

        assert_eq!(stream.api_base_url, "https://platform.example.com");
        assert!(!stream.use_virtual_hosted_style_url);
        assert_eq!(stream.request_timeout, Duration::from_secs(10));
        assert_eq!(stream.upload_timeout, Duration::from_secs(120));
        assert_eq!(stream.retry.max_attempts, 2);
        assert_eq!(stream.retry.base_delay, Duration::from_secs(1));
        assert_eq!(stream.retry.default_rate_limit_wait, Duration::from_secs(1));
    }

    #[test]
    fn debug_output_hides_the_key() {
        let config = AppConfig::from_json_with(
            TEMPLATE,
            env(&[("ORG_ID", "acme"), ("API_KEY", "xx-secret"), ("RETRIES", "3")]),
        )
        .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("xx-secret"));
        assert!(rendered.contains("acme"));
    }

    #[test]
    fn text_without_placeholders_is_untouched() {
        let text = r#"{"price": "$5", "braces": "{}"}"#;
        assert_eq!(substitute_placeholders(text, env(&[])).unwrap(), text);
    }
}
