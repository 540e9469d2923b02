//! Error types for the Commander client

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for Commander client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Commander client error type
#[derive(Error, Debug)]
pub enum Error {
    /// The client could not be configured
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The daemon socket could not be reached
    #[error("Failed to connect to Commander at {}: {source}", path.display())]
    Connect {
        /// Socket path the client tried to reach
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The connection failed mid-exchange
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The request did not complete before the configured deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The daemon did not speak well-formed HTTP/1.1
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The daemon answered with a non-success status
    #[error("Daemon returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, lossily decoded
        body: String,
    },

    /// The response body was not JSON of the expected shape
    #[error("Decode error: {0}")]
    Decode(String),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Whether this error came from the transport rather than the daemon's answer
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Transport(_) | Self::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
