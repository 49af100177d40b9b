use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Everything that can go wrong between fetching posts and writing the sheet.
///
/// [SyncError::RateLimit] and [SyncError::Network] are transient and get retried by
/// [crate::retry::RetryPolicy]; [SyncError::MalformedRecord] is only ever used to skip a single
/// post. Everything else ends the run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limited by {service}")]
    RateLimit {
        service: &'static str,
        retry_after: Option<Duration>,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed record {}: {reason}", id.as_deref().unwrap_or("<no id>"))]
    MalformedRecord { id: Option<String>, reason: String },

    #[error("unexpected sheet structure: {0}")]
    WriteConflict(String),

    #[error("{service} returned {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("invalid credentials: {0}")]
    Credentials(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    pub fn malformed(id: Option<&str>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            id: id.map(str::to_string),
            reason: reason.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit { .. } | Self::Network(_))
    }

    /// Server-requested delay, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimit { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<hyper::Error> for SyncError {
    fn from(err: hyper::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<hyper::http::Error> for SyncError {
    fn from(err: hyper::http::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for SyncError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Credentials(err.to_string())
    }
}
