use std::time::Duration;
use thiserror::Error;

/// Default base of every endpoint URL
pub const DEFAULT_BASE_URL: &str = "https://api.iobeam.com/v1";

/// Default time to wait for a response before reporting a timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Error code the server uses to reject a registration for an id that is already taken
pub const DUPLICATE_DEVICE_ERROR_CODE: i64 = 150;

/// The `ConnectionSettings` struct holds the transport configuration shared by every client
/// that talks through the same requester.
///
/// Properties:
///
/// * `base_url`: The base portion of every endpoint URL, e.g. `https://api.iobeam.com/v1`.
/// Endpoint paths such as `/devices` are appended to it verbatim.
/// * `timeout`: How long a single request may take before it is reported as timed out.
/// There are no retries; a timeout is the terminal outcome of that operation.
/// * `user_agent`: The `User-Agent` header sent with each request.
///
/// A requester keeps these behind an `Arc`, so several clients can share one configuration.
/// Changing settings means building a new requester; requests already in flight keep the
/// settings they were issued with.
#[derive(Clone, Debug)]
pub struct ConnectionSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ConnectionSettings {
    fn default() -> ConnectionSettings {
        ConnectionSettings {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("iobeam-rs/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Errors reported by the client.
///
/// `Validation` is the only variant returned synchronously from client operations; network
/// outcomes (`Timeout`, `Forbidden`, `Api`) always arrive through the operation's callback.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Malformed input to a constructor, setter or operation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No response within the configured deadline.
    #[error("Connection time out")]
    Timeout,

    /// The server answered 401 or 403.
    #[error("Request not allowed (HTTP {code}): {message}")]
    Forbidden { code: u16, message: String },

    /// Any other non-success answer, with the server supplied detail when there was one.
    #[error("API error (HTTP {code}): {message}")]
    Api {
        code: u16,
        error_code: Option<i64>,
        message: String,
    },

    /// Operations are executed on a tokio runtime which could not be found.
    #[error("No async runtime available: {0}")]
    Runtime(String),

    /// A queued operation panicked before it produced an outcome.
    #[error("Operation aborted: {0}")]
    Aborted(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "http")]
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[cfg(feature = "config")]
    #[error("Config error: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl ClientError {
    pub fn validation(msg: impl Into<String>) -> ClientError {
        ClientError::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout)
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, ClientError::Forbidden { .. })
    }

    /// Returns `true` when the server rejected a registration because the device id is taken.
    pub fn is_duplicate_device(&self) -> bool {
        matches!(
            self,
            ClientError::Api {
                error_code: Some(DUPLICATE_DEVICE_ERROR_CODE),
                ..
            }
        )
    }

    /// HTTP status attached to the error, if the server answered at all.
    pub fn http_code(&self) -> Option<u16> {
        match self {
            ClientError::Forbidden { code, .. } | ClientError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}
