mod notifier;

pub use notifier::{BroadcastSummary, PeerNotifier};

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Trigger port every peer listens on.
    pub port: u16,
    pub notify_timeout: Duration,
}

pub type Result<T> = std::result::Result<T, NetworkError>;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout(err.to_string())
        } else if err.is_status() {
            NetworkError::Protocol(err.to_string())
        } else if err.is_builder() {
            NetworkError::Client(err.to_string())
        } else {
            NetworkError::ConnectionFailed(err.to_string())
        }
    }
}
