//! Unix socket client for the Commander daemon

use crate::{
    config::ClientConfig,
    error::{Error, Result},
    http::{self, Request, Response},
    models::*,
};
use async_io::Timer;
use async_net::unix::UnixStream;
use futures_lite::io::BufReader;
use futures_lite::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::io::ErrorKind;
use std::net::Shutdown;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, trace};

/// Header the daemon requires on its `/action/` routes
const ACTION_HEADER: (&str, &str) = ("X-Requested-With", "PiRouterBackend");

/// An open keep-alive connection to the daemon
struct Connection {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
    exchanges: usize,
}

impl Connection {
    async fn open(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path).await.map_err(|source| Error::Connect {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Connected to Commander at {}", path.display());

        Ok(Self {
            reader: BufReader::new(stream.clone()),
            writer: stream,
            exchanges: 0,
        })
    }

    fn shutdown(&self) {
        if let Err(e) = self.writer.shutdown(Shutdown::Both) {
            trace!("Ignoring shutdown error: {}", e);
        }
    }
}

/// JSON client for the Commander daemon's Unix socket API
///
/// Owns at most one connection, opened on first use and kept alive between
/// calls. Every operation takes `&mut self`, so a client never has more than
/// one request in flight.
///
/// ```no_run
/// use commander_client::CommanderClient;
///
/// # fn main() -> commander_client::Result<()> {
/// smol::block_on(async {
///     let mut client = CommanderClient::new("/tmp/commander.sock")?;
///     let listing = client.list_commands().await?;
///     for command in &listing.commands {
///         println!("{} - {}", command.command, command.description);
///     }
///     client.close();
///     Ok::<_, commander_client::Error>(())
/// })
/// # }
/// ```
pub struct CommanderClient {
    config: ClientConfig,
    connection: Option<Connection>,
    last_error: Option<String>,
}

impl CommanderClient {
    /// Create a client for the socket at `socket_path` with default settings
    ///
    /// The socket does not need to exist yet.
    pub fn new(socket_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(ClientConfig::new(socket_path))
    }

    /// Create a client from a full configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connection: None,
            last_error: None,
        })
    }

    /// Socket path this client talks to
    pub fn socket_path(&self) -> &Path {
        &self.config.socket_path
    }

    /// Active configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether a connection is currently held open
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Message of the most recent transport failure
    ///
    /// Overwritten by each transport failure and kept across later successes.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// List the commands the daemon has registered (`GET /listing`)
    pub async fn list_commands(&mut self) -> Result<ListingResponse> {
        let response = self.send(Request::get("/listing")).await?;
        ListingResponse::from_slice(&response.body)
    }

    /// Invoke `command` with `parameters` (`POST /dispatch`)
    pub async fn dispatch(
        &mut self,
        command: &str,
        parameters: Parameters,
    ) -> Result<DispatchResponse> {
        let payload = serde_json::to_vec(&CommandRequest::new(command, parameters))
            .map_err(|e| Error::configuration(format!("unserializable parameters: {}", e)))?;
        let response = self.send(Request::post_json("/dispatch", payload)).await?;
        DispatchResponse::from_slice(&response.body)
    }

    /// Fetch the daemon's execution statistics (`GET /status`)
    pub async fn status(&mut self) -> Result<StatusResponse> {
        let response = self.send(Request::get("/status")).await?;
        StatusResponse::from_slice(&response.body)
    }

    /// Fetch the schema a command accepts
    pub async fn describe_command(&mut self, command: &str) -> Result<Value> {
        let path = format!("{}describe", action_path(command)?);
        self.send_action(Request::get(path)).await
    }

    /// Fetch a command's current configuration
    pub async fn retrieve_config(&mut self, command: &str) -> Result<Value> {
        let path = action_path(command)?;
        self.send_action(Request::get(path)).await
    }

    /// Submit a new configuration for a command
    pub async fn submit_config(&mut self, command: &str, payload: &Value) -> Result<Value> {
        let path = action_path(command)?;
        let body = serde_json::to_vec(payload)
            .map_err(|e| Error::configuration(format!("unserializable payload: {}", e)))?;
        self.send_action(Request::post_json(path, body)).await
    }

    /// Release the connection, if one is open
    ///
    /// Dropping the client has the same effect; this makes the point of
    /// release explicit.
    pub fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            debug!("Closing connection to {}", self.config.socket_path.display());
            connection.shutdown();
        }
    }

    async fn send_action(&mut self, request: Request) -> Result<Value> {
        let (name, value) = ACTION_HEADER;
        let response = self.send(request.header(name, value)).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }

    /// Run one exchange under the configured deadline and map the outcome
    async fn send(&mut self, request: Request) -> Result<Response> {
        debug!("{} {}", request.method.as_str(), request.path);

        let timeout = self.config.timeout();
        let result = with_timeout(timeout, self.exchange(&request)).await;

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                if self.connection.take().is_some() {
                    debug!("Dropping connection after failed exchange: {}", err);
                }
                if err.is_transport() {
                    self.last_error = Some(err.to_string());
                }
                return Err(err);
            }
        };

        if !response.keep_alive() {
            trace!("Daemon will not reuse the connection");
            self.close();
        }

        debug!("{} {} -> {}", request.method.as_str(), request.path, response.status);
        trace!("Response body: {}", response.body_text());

        if !response.is_success() {
            return Err(Error::Status {
                status: response.status,
                body: response.body_text().trim().to_string(),
            });
        }
        Ok(response)
    }

    async fn exchange(&mut self, request: &Request) -> Result<Response> {
        let reused = self.connection.is_some();
        let stale = match self.exchange_once(request).await {
            Ok(Some(response)) => return Ok(response),
            Ok(None) => closed_without_response(),
            Err(Error::Transport(e)) if reused && is_stale_connection(&e) => Error::Transport(e),
            Err(e) => return Err(e),
        };

        // The daemon closed an idle connection before it saw our request.
        self.connection = None;
        if !(reused && request.method.is_idempotent()) {
            return Err(stale);
        }
        debug!("Stale connection ({}), replaying {} on a fresh one", stale, request.path);
        self.exchange_once(request)
            .await?
            .ok_or_else(closed_without_response)
    }

    async fn exchange_once(&mut self, request: &Request) -> Result<Option<Response>> {
        let connection = match self.connection.take() {
            Some(connection) => connection,
            None => Connection::open(&self.config.socket_path).await?,
        };
        let connection = self.connection.insert(connection);

        request
            .write_to(&mut connection.writer, &self.config.host)
            .await?;
        let response =
            http::read_response(&mut connection.reader, self.config.max_response_bytes).await?;
        connection.exchanges += 1;
        trace!("Connection has served {} exchanges", connection.exchanges);
        Ok(response)
    }
}

impl Drop for CommanderClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Build `/action/<id>/`, rejecting identifiers that would change the route
fn action_path(command: &str) -> Result<String> {
    let valid = !command.is_empty()
        && command
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(Error::configuration(format!(
            "invalid command identifier {:?}",
            command
        )));
    }
    Ok(format!("/action/{}/", command))
}

fn closed_without_response() -> Error {
    Error::Transport(std::io::Error::new(
        ErrorKind::UnexpectedEof,
        "connection closed before a response was received",
    ))
}

fn is_stale_connection(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    )
}

async fn with_timeout<T>(
    timeout: Option<Duration>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(limit) => {
            fut.or(async move {
                Timer::after(limit).await;
                Err(Error::Timeout(limit))
            })
            .await
        }
        None => fut.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = CommanderClient::new("/tmp/test-commander.sock").unwrap();
        assert_eq!(client.socket_path(), Path::new("/tmp/test-commander.sock"));
        assert!(!client.is_connected());
        assert_eq!(client.last_error(), None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = CommanderClient::new("").err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_action_paths() {
        assert_eq!(action_path("echo").unwrap(), "/action/echo/");
        assert_eq!(action_path("update_dnsmasq").unwrap(), "/action/update_dnsmasq/");
        assert!(action_path("").is_err());
        assert!(action_path("../status").is_err());
        assert!(action_path("echo?x=1").is_err());
    }

    #[test]
    fn test_missing_socket_records_last_error() {
        smol::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let mut client = CommanderClient::new(dir.path().join("absent.sock")).unwrap();

            let err = client.list_commands().await.unwrap_err();
            assert!(matches!(err, Error::Connect { .. }));
            assert!(!client.is_connected());

            let recorded = client.last_error().unwrap();
            assert!(recorded.contains("absent.sock"));
        });
    }

    #[test]
    fn test_invalid_action_sends_nothing() {
        smol::block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let mut client = CommanderClient::new(dir.path().join("absent.sock")).unwrap();

            let err = client.describe_command("a/b").await.unwrap_err();
            assert!(matches!(err, Error::Configuration(_)));
            assert_eq!(client.last_error(), None);
        });
    }
}
