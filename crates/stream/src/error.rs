use thiserror::Error;

/// Errors surfaced by the remote client.
///
/// Only [`Transport`](StreamError::Transport) is retried by
/// [`RetryPolicy`](crate::RetryPolicy). An HTTP 429 never reaches the caller
/// unless the policy gives up waiting, in which case it becomes
/// [`RateLimited`](StreamError::RateLimited).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StreamError {
    /// Connection, DNS, TLS or timeout failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),
    /// The platform answered with a non-success status other than 429.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// The platform kept answering 429 after `waits` header-directed pauses.
    #[error("rate limited after {waits} waits")]
    RateLimited { waits: u32 },
    /// A success response whose body or headers could not be interpreted.
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// The client configuration is unusable.
    #[error("invalid stream config: {0}")]
    InvalidConfig(String),
    /// A log query window whose end precedes its start.
    #[error("invalid time window: {0}")]
    InvalidWindow(String),
}

impl StreamError {
    /// True for failures the retry policy should try again.
    pub fn is_transient(&self) -> bool {
        matches!(self, StreamError::Transport(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            StreamError::Http { status, .. } => Some(*status),
            StreamError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StreamError::Decode(err.to_string())
        } else if err.is_builder() {
            StreamError::InvalidConfig(err.to_string())
        } else {
            StreamError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Decode(err.to_string())
    }
}
