//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use gemini_bridge::config::BridgeConfig;
use gemini_bridge::gemini::tofu_client_config;
use gemini_bridge::lifecycle::{start, Services, Shutdown};
use gemini_bridge::net::tls::{server_config, CertificateStore};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::{TlsAcceptor, TlsConnector};

/// Start a mock Gemini capsule. `respond` maps each request line (without
/// CRLF) to the raw bytes written back, header included.
pub async fn start_mock_capsule<F>(respond: F) -> SocketAddr
where
    F: Fn(&str) -> Vec<u8> + Send + Sync + 'static,
{
    let store = Arc::new(CertificateStore::new("localhost", 1));
    let acceptor = TlsAcceptor::from(Arc::new(server_config(store)));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let acceptor = acceptor.clone();
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let Ok(tls) = acceptor.accept(socket).await else {
                    return;
                };
                let mut stream = BufReader::new(tls);
                let mut line = String::new();
                if stream.read_line(&mut line).await.is_err() {
                    return;
                }
                let reply = respond(line.trim_end_matches(['\r', '\n']));
                let _ = stream.write_all(&reply).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    addr
}

/// A free local port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Bridge config bound to ephemeral local ports, serving `root`.
pub fn local_config(root: &Path) -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.site.host = "example.org".to_string();
    config.site.site_title = "Test Bridge".to_string();
    config.site.files_directory = root.to_string_lossy().into_owned();
    config.http.bind_address = "127.0.0.1:0".to_string();
    config.gemini.bind_address = "127.0.0.1:0".to_string();
    config.proxy.timeout_secs = 5;
    config
}

/// Start the whole bridge.
pub async fn start_bridge(config: BridgeConfig) -> (Services, Shutdown) {
    let shutdown = Shutdown::new();
    let services = start(Arc::new(config), &shutdown).await.unwrap();
    (services, shutdown)
}

/// HTTP client that never follows redirects.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Send one Gemini request for `url` to `addr` and return the raw response.
pub async fn gemini_fetch(addr: SocketAddr, sni: &str, url: &str) -> String {
    let tcp = TcpStream::connect(addr).await.unwrap();
    let connector = TlsConnector::from(tofu_client_config());
    let name = ServerName::try_from(sni.to_string()).unwrap();
    let mut tls = connector.connect(name, tcp).await.unwrap();
    tls.write_all(format!("{}\r\n", url).as_bytes()).await.unwrap();
    let mut response = Vec::new();
    let _ = tls.read_to_end(&mut response).await;
    String::from_utf8_lossy(&response).into_owned()
}
