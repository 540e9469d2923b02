//! Minimal HTTP/1.1 framing over an arbitrary byte stream
//!
//! The daemon serves plain HTTP on a Unix socket, so there is no URL to
//! resolve: requests carry an origin-form path and a placeholder `Host`.
//! Response heads are parsed with `httparse`. Responses are buffered in
//! full; bodies may be framed by
//! `Transfer-Encoding: chunked`, `Content-Length`, or connection close.

use crate::error::{Error, Result};
use futures_lite::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use std::io;
use tracing::trace;

/// Largest status line plus header block accepted
const MAX_HEAD_BYTES: usize = 64 * 1024;

/// Longest chunk-size or trailer line accepted
const MAX_LINE_BYTES: usize = 8 * 1024;

/// Most header fields accepted on a single response
const MAX_HEADERS: usize = 100;

/// Request methods used against the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
}

impl Method {
    /// Method token as sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }

    /// Whether resending the request cannot change daemon state
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Method::Get)
    }
}

/// An outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request method
    pub method: Method,
    /// Origin-form path, e.g. `/listing`
    pub path: String,
    /// Extra header fields
    pub headers: Vec<(String, String)>,
    /// JSON body, if any
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// Build a `GET` request
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Build a `POST` request carrying a JSON body
    pub fn post_json(path: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    /// Add a header field
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Serialize the request head and body
    pub fn encode(&self, host: &str) -> Vec<u8> {
        let mut head = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: commander-client/{}\r\nAccept: application/json\r\n",
            self.method.as_str(),
            self.path,
            host,
            env!("CARGO_PKG_VERSION"),
        );
        for (name, value) in &self.headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        if let Some(body) = &self.body {
            head.push_str("Content-Type: application/json\r\n");
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        if let Some(body) = &self.body {
            bytes.extend_from_slice(body);
        }
        bytes
    }

    /// Write the request to a stream and flush it
    pub async fn write_to<W>(&self, writer: &mut W, host: &str) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let bytes = self.encode(host);
        trace!("Writing {} byte request for {} {}", bytes.len(), self.method.as_str(), self.path);
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// A fully buffered response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Minor HTTP version (`1` for HTTP/1.1)
    pub minor_version: u8,
    /// Status code
    pub status: u16,
    /// Reason phrase
    pub reason: String,
    /// Header fields in arrival order
    pub headers: Vec<(String, String)>,
    /// Decoded body
    pub body: Vec<u8>,
    close_delimited: bool,
}

impl Response {
    /// First value of a header field, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the connection may carry another request
    pub fn keep_alive(&self) -> bool {
        if self.close_delimited {
            return false;
        }
        let has_token = |token: &str| {
            self.header("connection")
                .map(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case(token)))
                .unwrap_or(false)
        };
        match self.minor_version {
            0 => has_token("keep-alive"),
            _ => !has_token("close"),
        }
    }

    /// Body as text, replacing invalid UTF-8
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Read one response from the stream
///
/// Returns `Ok(None)` when the peer closed the stream before sending any
/// byte, which is how a stale keep-alive connection shows up. A stream that
/// closes part way through a response is a transport error.
pub async fn read_response<R>(reader: &mut R, max_body: usize) -> Result<Option<Response>>
where
    R: AsyncBufRead + Unpin,
{
    let mut interim = false;
    loop {
        let head = match read_head(reader).await? {
            Some(head) => head,
            None if interim => return Err(closed_early()),
            None => return Ok(None),
        };
        let mut response = parse_head(&head)?;

        // 1xx responses precede the real one and carry no body.
        if (100..200).contains(&response.status) && response.status != 101 {
            trace!("Skipping interim {} response", response.status);
            interim = true;
            continue;
        }

        read_body(reader, &mut response, max_body).await?;
        return Ok(Some(response));
    }
}

/// Error for a peer that hung up before the response was complete
fn closed_early() -> Error {
    Error::Transport(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "connection closed before the response was complete",
    ))
}

fn parse_head(head: &[u8]) -> Result<Response> {
    let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Response::new(&mut slots);
    match parsed.parse(head) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => return Err(Error::protocol("incomplete response head")),
        Err(e) => return Err(Error::protocol(format!("malformed response head: {}", e))),
    }

    let (Some(minor_version), Some(status)) = (parsed.version, parsed.code) else {
        return Err(Error::protocol("response head without a status line"));
    };

    let headers = parsed
        .headers
        .iter()
        .map(|header| {
            let value = std::str::from_utf8(header.value).map_err(|_| {
                Error::protocol(format!("non UTF-8 value in header {}", header.name))
            })?;
            Ok((header.name.to_string(), value.trim().to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Response {
        minor_version,
        status,
        reason: parsed.reason.unwrap_or_default().to_string(),
        headers,
        body: Vec::new(),
        close_delimited: false,
    })
}

async fn read_body<R>(reader: &mut R, response: &mut Response, max_body: usize) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    if response.status == 204 || response.status == 304 {
        return Ok(());
    }

    let chunked = response
        .header("transfer-encoding")
        .and_then(|v| v.rsplit(',').next())
        .map(|last| last.trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false);

    if chunked {
        response.body = read_chunked(reader, max_body).await?;
    } else if let Some(length) = response.header("content-length") {
        let length: usize = length
            .trim()
            .parse()
            .map_err(|_| Error::protocol(format!("invalid Content-Length {:?}", length)))?;
        if length > max_body {
            return Err(body_too_large(max_body));
        }
        let mut body = vec![0; length];
        reader.read_exact(&mut body).await?;
        response.body = body;
    } else {
        let mut body = Vec::new();
        (&mut *reader)
            .take(max_body as u64 + 1)
            .read_to_end(&mut body)
            .await?;
        if body.len() > max_body {
            return Err(body_too_large(max_body));
        }
        response.body = body;
        response.close_delimited = true;
    }
    Ok(())
}

async fn read_chunked<R>(reader: &mut R, max_body: usize) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    let mut line = Vec::new();
    loop {
        next_line(reader, &mut line).await?;
        let size = match httparse::parse_chunk_size(&line) {
            Ok(httparse::Status::Complete((_, size))) => size,
            _ => {
                return Err(Error::protocol(format!(
                    "invalid chunk size line {:?}",
                    String::from_utf8_lossy(&line).trim_end()
                )));
            }
        };

        if size == 0 {
            // Trailer fields are read and discarded.
            loop {
                next_line(reader, &mut line).await?;
                if is_blank(&line) {
                    return Ok(body);
                }
            }
        }

        let size = usize::try_from(size)
            .ok()
            .filter(|size| *size <= max_body - body.len())
            .ok_or_else(|| body_too_large(max_body))?;
        let start = body.len();
        body.resize(start + size, 0);
        reader.read_exact(&mut body[start..]).await?;

        next_line(reader, &mut line).await?;
        if !is_blank(&line) {
            return Err(Error::protocol("chunk not terminated by CRLF"));
        }
    }
}

/// Read the status line and header fields, up to and including the blank line
async fn read_head<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = Vec::new();
    loop {
        let start = head.len();
        if !read_raw_line(reader, &mut head, MAX_HEAD_BYTES).await? {
            if head.is_empty() {
                return Ok(None);
            }
            return Err(closed_early());
        }
        if start > 0 && is_blank(&head[start..]) {
            return Ok(Some(head));
        }
    }
}

/// Replace `line` with the next line of the stream, which must exist
async fn next_line<R>(reader: &mut R, line: &mut Vec<u8>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    line.clear();
    if read_raw_line(reader, line, MAX_LINE_BYTES).await? {
        Ok(())
    } else {
        Err(closed_early())
    }
}

/// Append one line, terminator included, to `buf`
///
/// Returns `false` if the stream ended before the line started.
async fn read_raw_line<R>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let mut started = false;
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            if started {
                return Err(closed_early());
            }
            return Ok(false);
        }
        started = true;

        let (done, used) = match available.iter().position(|b| *b == b'\n') {
            Some(i) => (true, i + 1),
            None => (false, available.len()),
        };
        buf.extend_from_slice(&available[..used]);
        reader.consume(used);

        if buf.len() > limit {
            return Err(Error::protocol(format!("response head or chunk line exceeds {} bytes", limit)));
        }
        if done {
            return Ok(true);
        }
    }
}

fn is_blank(line: &[u8]) -> bool {
    line == b"\r\n" || line == b"\n"
}

fn body_too_large(max_body: usize) -> Error {
    Error::protocol(format!("response body exceeds {} bytes", max_body))
}
