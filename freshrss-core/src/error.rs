use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// The aggregator refused the current session token. Only the session
    /// manager sees this; callers get `Authentication` instead.
    #[error("session token rejected by aggregator")]
    TokenRejected,
    #[error("network error: {0}")]
    TransientNetwork(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("aggregator returned HTTP {status}")]
    Status { status: u16 },
    #[error("malformed identifier: {0:?}")]
    MalformedIdentifier(String),
    #[error("invalid parameter: {0}")]
    Validation(String),
    #[error("unexpected response from aggregator: {0}")]
    Decode(String),
    #[error("feed {0} not found")]
    FeedNotFound(u64),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ReaderError {
    /// Classifies a reqwest failure while sending or while reading the raw
    /// body. Payloads are parsed separately, so a body that breaks off
    /// midway is the connection's fault and stays retryable.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ReaderError::Timeout(err.to_string())
        } else {
            ReaderError::TransientNetwork(err.to_string())
        }
    }

    /// Whether a retry may succeed where this attempt failed.
    pub fn is_transient(&self) -> bool {
        match self {
            ReaderError::TransientNetwork(_) | ReaderError::Timeout(_) => true,
            ReaderError::Status { status } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReaderError>;
