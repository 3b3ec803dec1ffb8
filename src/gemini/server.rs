//! Gemini listener serving hosted sites.
//!
//! # Responsibilities
//! - TLS handshake with a certificate picked per SNI hostname
//! - Read one request line (absolute `gemini://` URL, at most 1024 bytes)
//! - Resolve the tenant and path, write one response, close
//!
//! # Design Decisions
//! - One task per connection; the listener's semaphore bounds them
//! - Handshake and request line share the read timeout; the response has
//!   its own write timeout
//! - Gemtext is always served as source; no negotiation happens here

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use url::Url;

use crate::config::GeminiConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::gemini::{MAX_LINE_LEN, SCHEME};
use crate::gemtext::GEMTEXT_MIME;
use crate::net::tls::{server_config, CertificateStore};
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::site::{Protocol, Resource, Sites, ATOM_MIME};

enum ReplyBody {
    Empty,
    Bytes(Vec<u8>),
    File(tokio::fs::File),
}

struct Reply {
    status: u8,
    meta: String,
    body: ReplyBody,
}

impl Reply {
    fn success(media_type: &str, body: ReplyBody) -> Self {
        Self {
            status: 20,
            meta: media_type.to_string(),
            body,
        }
    }

    fn redirect(location: &Url) -> Self {
        Self {
            status: 31,
            meta: location.to_string(),
            body: ReplyBody::Empty,
        }
    }

    fn error(error: &GatewayError) -> Self {
        let (status, meta) = error.gemini_status();
        Self {
            status,
            meta: meta.to_string(),
            body: ReplyBody::Empty,
        }
    }
}

/// The multi-tenant Gemini server.
pub struct GeminiServer {
    sites: Arc<Sites>,
    acceptor: TlsAcceptor,
    read_timeout: Duration,
    write_timeout: Duration,
    tracker: ConnectionTracker,
}

impl GeminiServer {
    pub fn new(config: &GeminiConfig, sites: Arc<Sites>, certificates: Arc<CertificateStore>) -> Self {
        Self {
            sites,
            acceptor: TlsAcceptor::from(Arc::new(server_config(certificates))),
            read_timeout: Duration::from_secs(config.read_timeout_secs),
            write_timeout: Duration::from_secs(config.write_timeout_secs),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        let server = Arc::new(self);
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Gemini server starting");
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(accepted) => accepted,
                        Err(ListenerError::Accept(e)) => {
                            tracing::warn!(error = %e, "Accept failed");
                            continue;
                        }
                        Err(e) => return Err(e),
                    };
                    let guard = server.tracker.track();
                    let server = Arc::clone(&server);
                    tokio::spawn(async move {
                        server.serve_connection(stream, peer, guard.id()).await;
                        drop(permit);
                        drop(guard);
                    });
                }
                _ = shutdown.recv() => {
                    tracing::info!("Gemini server stopping");
                    break;
                }
            }
        }

        if !server.tracker.wait_idle(server.write_timeout).await {
            tracing::warn!(
                active = server.tracker.active_count(),
                "Gemini connections still open after drain timeout"
            );
        }
        tracing::info!("Gemini server stopped");
        Ok(())
    }

    async fn serve_connection(&self, stream: TcpStream, peer: SocketAddr, id: crate::net::ConnectionId) {
        let mut tls = match timeout(self.read_timeout, self.acceptor.accept(stream)).await {
            Ok(Ok(tls)) => tls,
            Ok(Err(e)) => {
                tracing::debug!(connection_id = %id, peer = %peer, error = %e, "TLS handshake failed");
                return;
            }
            Err(_) => {
                tracing::debug!(connection_id = %id, peer = %peer, "TLS handshake timed out");
                return;
            }
        };

        let line = match timeout(self.read_timeout, read_request_line(&mut tls)).await {
            Ok(line) => line,
            Err(_) => {
                tracing::debug!(connection_id = %id, peer = %peer, "Request line timed out");
                return;
            }
        };

        let reply = match line {
            Ok(line) => self.answer(&line).await,
            Err(e) => Reply::error(&e),
        };
        let status = reply.status;

        match timeout(self.write_timeout, write_reply(&mut tls, reply)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(connection_id = %id, error = %e, "Write failed"),
            Err(_) => tracing::debug!(connection_id = %id, "Write timed out"),
        }

        tracing::info!(connection_id = %id, peer = %peer, status, "Gemini request");
        metrics::record_gemini_request(status);
    }

    async fn answer(&self, line: &str) -> Reply {
        let url = match parse_request(line) {
            Ok(url) => url,
            Err(e) => return Reply::error(&e),
        };
        let Some(host) = url.host_str() else {
            return Reply::error(&GatewayError::BadRequest("missing host".to_string()));
        };
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let Some(tenant) = self.sites.tenant_for(&authority) else {
            return Reply::error(&GatewayError::NotFound);
        };
        let path = match url.path() {
            "" => "/",
            path => path,
        };

        let resource = Arc::clone(&self.sites)
            .resolve(tenant, authority, path.to_string(), Protocol::Gemini)
            .await;

        match resource {
            Ok(Resource::Gemtext { document, .. }) => {
                Reply::success(GEMTEXT_MIME, ReplyBody::Bytes(document.to_gemtext().into_bytes()))
            }
            Ok(Resource::File { path, media_type, .. }) => match tokio::fs::File::open(&path).await {
                Ok(file) => Reply::success(&media_type, ReplyBody::File(file)),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to open file");
                    Reply::error(&GatewayError::Internal(e.to_string()))
                }
            },
            Ok(Resource::Feed { atom }) => Reply::success(ATOM_MIME, ReplyBody::Bytes(atom.into_bytes())),
            Ok(Resource::Redirect { location, .. }) => match url.join(&location) {
                Ok(next) => Reply::redirect(&next),
                Err(e) => Reply::error(&GatewayError::Internal(e.to_string())),
            },
            Ok(Resource::Forbidden | Resource::NotFound) => Reply::error(&GatewayError::NotFound),
            Err(e) => Reply::error(&e),
        }
    }
}

/// Read the request line, without its terminator.
async fn read_request_line<S>(stream: &mut S) -> GatewayResult<String>
where
    S: tokio::io::AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream).take((MAX_LINE_LEN + 2) as u64);
    let mut buf = Vec::new();
    reader
        .read_until(b'\n', &mut buf)
        .await
        .map_err(|e| GatewayError::BadRequest(e.to_string()))?;

    if buf.last() != Some(&b'\n') {
        return Err(GatewayError::BadRequest("request line too long or unterminated".to_string()));
    }
    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8(buf).map_err(|_| GatewayError::BadRequest("request is not UTF-8".to_string()))
}

/// Validate a request line as an absolute `gemini://` URL.
fn parse_request(line: &str) -> GatewayResult<Url> {
    if line.len() > MAX_LINE_LEN {
        return Err(GatewayError::BadRequest("request exceeds 1024 bytes".to_string()));
    }
    let url = Url::parse(line).map_err(|e| GatewayError::BadRequest(e.to_string()))?;
    if url.scheme() != SCHEME {
        return Err(GatewayError::BadRequest(format!("unsupported scheme {}", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(GatewayError::BadRequest("missing host".to_string()));
    }
    Ok(url)
}

async fn write_reply<S: AsyncWrite + Unpin>(stream: &mut S, reply: Reply) -> std::io::Result<()> {
    stream
        .write_all(format!("{} {}\r\n", reply.status, reply.meta).as_bytes())
        .await?;
    match reply.body {
        ReplyBody::Empty => {}
        ReplyBody::Bytes(bytes) => stream.write_all(&bytes).await?,
        ReplyBody::File(mut file) => {
            tokio::io::copy(&mut file, stream).await?;
        }
    }
    stream.shutdown().await
}
