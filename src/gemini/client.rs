//! Outbound Gemini requests.
//!
//! # Responsibilities
//! - Connect to the target host (default port when none given)
//! - TLS handshake with trust-on-first-use certificate handling
//! - Send the request line and read the response header
//! - Bound the whole exchange by one deadline
//!
//! # Design Decisions
//! - The deadline covers connect, handshake, header and body reads
//! - Certificates are not validated: Gemini servers are self-signed by norm

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tokio_rustls::rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio_rustls::TlsConnector;
use url::Url;

use crate::error::{GatewayError, GatewayResult};
use crate::gemini::response::{read_header, GeminiResponse};
use crate::gemini::{DEFAULT_PORT, MAX_LINE_LEN, SCHEME};
use crate::net::tls::install_crypto_provider;

/// Certificate verifier that accepts every server certificate.
///
/// Gemini trust is opportunistic; the gateway keeps no pin store, so every
/// certificate is accepted as if seen for the first time.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, tokio_rustls::rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, tokio_rustls::rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
            SignatureScheme::ED448,
        ]
    }
}

/// Gemini client used by the gateway.
#[derive(Clone)]
pub struct GeminiClient {
    connector: TlsConnector,
    timeout: Duration,
    default_port: u16,
}

/// Client TLS configuration that trusts any server certificate.
pub fn tofu_client_config() -> Arc<ClientConfig> {
    install_crypto_provider();
    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
        .with_no_client_auth();
    Arc::new(config)
}

impl GeminiClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            connector: TlsConnector::from(tofu_client_config()),
            timeout,
            default_port: DEFAULT_PORT,
        }
    }

    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue a request and return once the response header has arrived.
    ///
    /// The body is left unread in the returned response and shares the
    /// request's deadline.
    pub async fn request(&self, url: &Url) -> GatewayResult<GeminiResponse> {
        if url.scheme() != SCHEME {
            return Err(GatewayError::BadRequest(format!("not a gemini URL: {}", url)));
        }
        if url.as_str().len() > MAX_LINE_LEN {
            return Err(GatewayError::BadRequest("request URL exceeds 1024 bytes".to_string()));
        }
        let host = url
            .host_str()
            .ok_or_else(|| GatewayError::BadRequest(format!("no host in {}", url)))?;
        let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        let port = url.port().unwrap_or(self.default_port);

        let deadline = Instant::now() + self.timeout;
        let exchange = async {
            let tcp = TcpStream::connect((host.as_str(), port))
                .await
                .map_err(|e| GatewayError::Transport(format!("connect {}:{}: {}", host, port, e)))?;

            let server_name = ServerName::try_from(host.as_str())
                .map_err(|e| GatewayError::BadRequest(format!("invalid host {:?}: {}", host, e)))?
                .to_owned();
            let tls = self
                .connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| GatewayError::Transport(format!("TLS handshake failed: {}", e)))?;

            let mut stream = BufReader::new(tls);
            stream
                .write_all(format!("{}\r\n", url).as_bytes())
                .await
                .map_err(|e| GatewayError::Transport(e.to_string()))?;
            stream
                .flush()
                .await
                .map_err(|e| GatewayError::Transport(e.to_string()))?;

            let header = read_header(&mut stream).await?;
            Ok::<_, GatewayError>((header, stream))
        };

        let (header, stream) = timeout_at(deadline, exchange)
            .await
            .map_err(|_| GatewayError::Timeout(self.timeout.as_secs()))??;

        tracing::debug!(
            url = %url,
            status = header.status,
            meta = %header.meta,
            "Gemini response header received"
        );

        Ok(GeminiResponse::new(url.clone(), header, stream, deadline))
    }
}
