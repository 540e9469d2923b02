use anyhow::{Result, anyhow};
use commander_client::{ClientConfig, CommanderClient, Error};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Layer defaults, the optional config file, and command-line flags
pub fn load_config(
    path: Option<&Path>,
    socket: Option<PathBuf>,
    timeout: Option<u64>,
) -> Result<ClientConfig> {
    let mut config = match path {
        Some(path) => ClientConfig::from_yaml_file(path)?,
        None => ClientConfig::default(),
    };

    if let Some(socket) = socket {
        config.socket_path = socket;
    }
    if let Some(timeout) = timeout {
        config.timeout_ms = Some(timeout.saturating_mul(1000));
    }

    config.validate()?;
    debug!("Using Commander socket {}", config.socket_path.display());
    Ok(config)
}

/// Create a client for the configured socket
pub fn connect(config: ClientConfig) -> Result<CommanderClient> {
    Ok(CommanderClient::with_config(config)?)
}

/// Turn a client error into a one-line diagnostic
pub fn explain(err: Error, socket: &Path) -> anyhow::Error {
    match err {
        Error::Connect { source, .. } => {
            anyhow!("Cannot reach Commander at {}: {}", socket.display(), source)
        }
        err if err.is_transport() => {
            anyhow!("Cannot reach Commander at {}: {}", socket.display(), err)
        }
        err => err.into(),
    }
}
