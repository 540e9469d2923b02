//! Client configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Socket the Commander daemon listens on when run outside systemd
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/commander.sock";

/// Placeholder authority sent in the `Host` header; ignored by the daemon
pub const DEFAULT_HOST: &str = "unixsocket";

/// Default upper bound on a buffered response body (16 MiB)
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;

/// Longest socket path that fits in `sockaddr_un.sun_path` with its terminator
const MAX_SOCKET_PATH_BYTES: usize = 107;

/// Commander client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Path of the daemon's Unix domain socket
    pub socket_path: PathBuf,
    /// Host placeholder used in request headers
    pub host: String,
    /// Per-request deadline in milliseconds (none means wait indefinitely)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Largest response body the client will buffer
    pub max_response_bytes: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            host: DEFAULT_HOST.to_string(),
            timeout_ms: None,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl ClientConfig {
    /// Create a configuration targeting the given socket with default settings
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            ..Self::default()
        }
    }

    /// Set the per-request deadline, rounded up to whole milliseconds
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000);
        self.timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    /// Parse a YAML configuration file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
            .map_err(|e| Error::configuration(format!("{}: {}", path.display(), e)))
    }

    /// Parse YAML configuration content
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| Error::configuration(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Per-request deadline, if any
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Check the configuration without touching the filesystem
    pub fn validate(&self) -> Result<()> {
        let path_len = self.socket_path.as_os_str().len();
        if path_len == 0 {
            return Err(Error::configuration("socket path is empty"));
        }
        if path_len > MAX_SOCKET_PATH_BYTES {
            return Err(Error::configuration(format!(
                "socket path {} is {} bytes, the limit is {}",
                self.socket_path.display(),
                path_len,
                MAX_SOCKET_PATH_BYTES
            )));
        }

        if self.host.is_empty() || self.host.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(Error::configuration(format!(
                "invalid host placeholder {:?}",
                self.host
            )));
        }

        if self.timeout_ms == Some(0) {
            return Err(Error::configuration("timeout must be positive"));
        }

        if self.max_response_bytes == 0 {
            return Err(Error::configuration("max_response_bytes must be positive"));
        }

        Ok(())
    }
}
