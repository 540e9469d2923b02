//! Fake Commander daemon for client integration tests

#![allow(dead_code)]

use async_net::unix::{UnixListener, UnixStream};
use futures_lite::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Listing body served by the daemon's default handler
pub const ECHO_LISTING: &str =
    r#"{"count":1,"commands":[{"name":"Echo","command":"echo","description":"Echoes input"}]}"#;

/// A request as received by the fake daemon
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// How the fake daemon answers a request
pub enum Reply {
    /// `Content-Length` framed JSON with the given status
    Json(u16, String),
    /// Chunked JSON, split into small chunks
    Chunked(String),
    /// Body delimited by closing the connection
    CloseDelimited(String),
    /// Framed JSON, then the connection is closed without notice
    JsonThenHangUp(String),
    /// Accept the request and never answer
    Hang,
    /// Read the request, then close the connection without answering
    HangUp,
}

type Handler = Arc<dyn Fn(&CapturedRequest) -> Reply + Send + Sync>;

/// A Commander stand-in listening on a socket in a temporary directory
pub struct FakeDaemon {
    _dir: TempDir,
    socket_path: PathBuf,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    connections: Arc<AtomicUsize>,
    _accept_task: smol::Task<()>,
}

impl FakeDaemon {
    /// Start a daemon that answers every request with `handler`
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&CapturedRequest) -> Reply + Send + Sync + 'static,
    {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let socket_path = dir.path().join("commander.sock");
        let listener = UnixListener::bind(&socket_path).expect("Failed to bind socket");

        let handler: Handler = Arc::new(handler);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let accept_task = {
            let requests = requests.clone();
            let connections = connections.clone();
            smol::spawn(async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    smol::spawn(serve(stream, handler.clone(), requests.clone())).detach();
                }
            })
        };

        Self {
            _dir: dir,
            socket_path,
            requests,
            connections,
            _accept_task: accept_task,
        }
    }

    /// Start a daemon that routes like Commander: `/listing`, `/status`, and
    /// `/dispatch` echoing the parameters back
    pub fn commander() -> Self {
        Self::start(|request| match (request.method.as_str(), request.path.as_str()) {
            ("GET", "/listing") => Reply::Json(200, ECHO_LISTING.to_string()),
            ("GET", "/status") => Reply::Json(
                200,
                r#"{"executions":{"failed":0,"successful":2,"total":2},"registed_commands":1,"uptime":"1m0s"}"#
                    .to_string(),
            ),
            ("POST", "/dispatch") => Reply::Json(200, request.body_text()),
            _ => Reply::Json(404, "404 page not found\n".to_string()),
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Connections accepted so far
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

async fn serve(stream: UnixStream, handler: Handler, requests: Arc<Mutex<Vec<CapturedRequest>>>) {
    let mut reader = BufReader::new(stream.clone());
    let mut writer = stream;

    while let Some(request) = read_request(&mut reader).await {
        let reply = handler(&request);
        requests.lock().unwrap().push(request);

        let keep_open = match reply {
            Reply::Json(status, body) => {
                let head = format!(
                    "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
                    status,
                    reason(status),
                    body.len()
                );
                write(&mut writer, [head.into_bytes(), body.into_bytes()].concat()).await
            }
            Reply::Chunked(body) => {
                let mut bytes =
                    b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n"
                        .to_vec();
                for chunk in body.as_bytes().chunks(7) {
                    bytes.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
                    bytes.extend_from_slice(chunk);
                    bytes.extend_from_slice(b"\r\n");
                }
                bytes.extend_from_slice(b"0\r\n\r\n");
                write(&mut writer, bytes).await
            }
            Reply::CloseDelimited(body) => {
                let head = "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n";
                write(&mut writer, [head.as_bytes(), body.as_bytes()].concat()).await;
                false
            }
            Reply::JsonThenHangUp(body) => {
                let head = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", body.len());
                write(&mut writer, [head.into_bytes(), body.into_bytes()].concat()).await;
                false
            }
            Reply::Hang => {
                futures_lite::future::pending::<()>().await;
                false
            }
            Reply::HangUp => false,
        };

        if !keep_open {
            let _ = writer.shutdown(std::net::Shutdown::Both);
            return;
        }
    }
}

async fn write(writer: &mut UnixStream, bytes: Vec<u8>) -> bool {
    writer.write_all(&bytes).await.is_ok() && writer.flush().await.is_ok()
}

async fn read_request(reader: &mut BufReader<UnixStream>) -> Option<CapturedRequest> {
    let request_line = read_line(reader).await?;
    let mut parts = request_line.split(' ');
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let line = read_line(reader).await?;
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':')?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0; length];
    reader.read_exact(&mut body).await.ok()?;

    Some(CapturedRequest {
        method,
        path,
        headers,
        body,
    })
}

async fn read_line(reader: &mut BufReader<UnixStream>) -> Option<String> {
    let mut line = String::new();
    match reader.read_line(&mut line).await {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
