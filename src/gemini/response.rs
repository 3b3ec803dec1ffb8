//! Gemini response header parsing and body ownership.

use std::io;

use axum::body::Bytes;
use futures_util::Stream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt};
use tokio::time::{timeout_at, Instant};
use url::Url;

use crate::error::{GatewayError, GatewayResult};
use crate::gemini::MAX_LINE_LEN;
use crate::gemtext::GEMTEXT_MIME;

/// Size of each chunk streamed to the HTTP client.
const CHUNK_SIZE: usize = 16 * 1024;

/// `<STATUS><SPACE><META><CR><LF>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHeader {
    pub status: u16,
    pub meta: String,
}

impl ResponseHeader {
    /// Parse a header line without its line terminator.
    pub fn parse(line: &str) -> GatewayResult<Self> {
        let bytes = line.as_bytes();
        if bytes.len() < 2 || !bytes[0].is_ascii_digit() || !bytes[1].is_ascii_digit() {
            return Err(GatewayError::UpstreamProtocol(format!(
                "malformed response header {:?}",
                truncate(line)
            )));
        }
        let status = u16::from(bytes[0] - b'0') * 10 + u16::from(bytes[1] - b'0');

        let meta = match &line[2..] {
            "" => "",
            rest if rest.starts_with(' ') || rest.starts_with('\t') => &rest[1..],
            _ => {
                return Err(GatewayError::UpstreamProtocol(format!(
                    "malformed response header {:?}",
                    truncate(line)
                )))
            }
        };
        if meta.len() > MAX_LINE_LEN {
            return Err(GatewayError::UpstreamProtocol("response meta too long".to_string()));
        }

        Ok(Self { status, meta: meta.to_string() })
    }

    /// Media type essence of a success response, lowercased.
    ///
    /// An empty meta means `text/gemini`. Returns `None` when the meta is
    /// not a `type/subtype` media type.
    pub fn media_type(&self) -> Option<String> {
        let essence = self.meta.split(';').next().unwrap_or("").trim();
        if essence.is_empty() {
            return Some(GEMTEXT_MIME.to_string());
        }
        let (kind, subtype) = essence.split_once('/')?;
        if is_token(kind) && is_token(subtype) {
            Some(essence.to_ascii_lowercase())
        } else {
            None
        }
    }

    /// Value for an HTTP `Content-Type` header.
    pub fn content_type(&self) -> &str {
        if self.meta.trim().is_empty() {
            "text/gemini; charset=utf-8"
        } else {
            self.meta.trim()
        }
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| b.is_ascii_alphanumeric() || b"!#$&-^_.+".contains(&b))
}

fn truncate(line: &str) -> &str {
    match line.char_indices().nth(64) {
        Some((i, _)) => &line[..i],
        None => line,
    }
}

/// Read and parse one header line from an upstream connection.
pub async fn read_header<R: AsyncBufRead + Unpin>(reader: &mut R) -> GatewayResult<ResponseHeader> {
    // Status, space, meta and CRLF.
    let limit = (MAX_LINE_LEN + 5) as u64;
    let mut buf = Vec::new();
    (&mut *reader)
        .take(limit)
        .read_until(b'\n', &mut buf)
        .await
        .map_err(|e| GatewayError::Transport(e.to_string()))?;

    if buf.last() != Some(&b'\n') {
        return Err(GatewayError::UpstreamProtocol(if buf.is_empty() {
            "connection closed before response header".to_string()
        } else {
            "response header too long or unterminated".to_string()
        }));
    }
    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }

    let line = String::from_utf8(buf)
        .map_err(|_| GatewayError::UpstreamProtocol("response header is not UTF-8".to_string()))?;
    ResponseHeader::parse(&line)
}

type BodyReader = Box<dyn AsyncRead + Send + Unpin>;

/// A response from a Gemini server.
///
/// Owns the connection: dropping the response closes it, on every path.
pub struct GeminiResponse {
    pub url: Url,
    pub header: ResponseHeader,
    body: BodyReader,
    deadline: Instant,
}

impl std::fmt::Debug for GeminiResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiResponse")
            .field("url", &self.url.as_str())
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl GeminiResponse {
    pub fn new(
        url: Url,
        header: ResponseHeader,
        body: impl AsyncRead + Send + Unpin + 'static,
        deadline: Instant,
    ) -> Self {
        Self {
            url,
            header,
            body: Box::new(body),
            deadline,
        }
    }

    /// Read the whole body, up to `limit` bytes, before the request deadline.
    pub async fn read_body(mut self, limit: usize, timeout_secs: u64) -> GatewayResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut reader = (&mut self.body).take(limit as u64 + 1);
        let result = timeout_at(self.deadline, reader.read_to_end(&mut out))
            .await
            .map_err(|_| GatewayError::Timeout(timeout_secs))?;

        match result {
            Ok(_) => {}
            // Plenty of servers close TCP without a TLS close_notify.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {}
            Err(e) => return Err(GatewayError::Transport(e.to_string())),
        }

        if out.len() > limit {
            return Err(GatewayError::UpstreamProtocol(format!(
                "response body exceeds {} bytes",
                limit
            )));
        }
        Ok(out)
    }

    /// Turn the body into a chunk stream, each read bounded by the deadline.
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send {
        let deadline = self.deadline;
        futures_util::stream::unfold(Some(self.body), move |body| async move {
            let mut body = body?;
            let mut buf = vec![0u8; CHUNK_SIZE];
            match timeout_at(deadline, body.read(&mut buf)).await {
                Ok(Ok(0)) => None,
                Ok(Ok(n)) => {
                    buf.truncate(n);
                    Some((Ok(Bytes::from(buf)), Some(body)))
                }
                Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => None,
                Ok(Err(e)) => Some((Err(e), None)),
                Err(_) => Some((
                    Err(io::Error::new(io::ErrorKind::TimedOut, "upstream body deadline exceeded")),
                    None,
                )),
            }
        })
    }
}
