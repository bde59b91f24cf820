//! Error types for the transport, the search backend and configuration

use thiserror::Error;

pub const NO_CONNECTION_MESSAGE: &str = "No network connection!";
pub const NETWORK_ERROR_MESSAGE: &str = "Network error";
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Failure of a single logical HTTP call, after retries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("request timed out")]
    Timeout,

    #[error("server returned status {status}")]
    Status {
        status: u16,
        retry_after: Option<String>,
    },

    #[error("request cancelled")]
    Cancelled,
}

impl TransportError {
    /// Transport-level failures worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Io(_) | TransportError::Timeout)
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no network connection")]
    NoConnectivity,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl SearchError {
    /// The one message shown to the user for this failure
    pub fn user_message(&self) -> String {
        match self {
            SearchError::NoConnectivity => NO_CONNECTION_MESSAGE.to_string(),
            SearchError::Backend(message) => message.clone(),
            SearchError::Transport(_) | SearchError::Decode(_) | SearchError::InvalidRequest(_) => {
                NETWORK_ERROR_MESSAGE.to_string()
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchError::Transport(TransportError::Cancelled))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

pub type SearchResult<T> = Result<T, SearchError>;
