//! TLS configuration and per-hostname certificates.
//!
//! # Responsibilities
//! - Install the process-wide crypto provider
//! - Hand out one certificate per hostname, generating it on first use
//! - Preload pre-provisioned certificates from a directory
//! - Pick the certificate for each handshake from its SNI name
//!
//! # Design Decisions
//! - Certificates are self-signed; Gemini clients pin on first use
//! - Generation for a hostname happens under that hostname's map entry, so
//!   concurrent first requests share one certificate
//! - Certificates live in memory only

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use thiserror::Error;

use crate::observability::metrics;

/// Install the ring crypto provider unless one is already in place.
pub fn install_crypto_provider() {
    let _ = CryptoProvider::install_default(rustls::crypto::ring::default_provider());
}

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("certificate generation failed: {0}")]
    Generate(#[from] rcgen::Error),

    #[error("unusable private key: {0}")]
    Key(#[from] rustls::Error),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no private key found in {0}")]
    MissingKey(PathBuf),

    #[error("no certificate found in {0}")]
    MissingCertificate(PathBuf),
}

/// A certificate and key bound to one hostname.
#[derive(Debug)]
pub struct HostCertificate {
    pub hostname: String,
    pub certified_key: Arc<CertifiedKey>,
    /// Expiry of a generated certificate; `None` when loaded from disk.
    pub not_after: Option<DateTime<Utc>>,
}

impl HostCertificate {
    /// Leaf certificate in DER form.
    pub fn leaf(&self) -> Option<&CertificateDer<'static>> {
        self.certified_key.cert.first()
    }
}

/// Decides whether an SNI name deserves its own certificate.
type HostFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// In-memory certificate cache keyed by exact hostname.
pub struct CertificateStore {
    certs: DashMap<String, Arc<HostCertificate>>,
    validity_years: u32,
    /// Used for handshakes without SNI or naming a host nobody serves.
    fallback_host: String,
    accepts: Option<HostFilter>,
}

impl std::fmt::Debug for CertificateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateStore")
            .field("hosts", &self.certs.len())
            .field("validity_years", &self.validity_years)
            .field("fallback_host", &self.fallback_host)
            .finish_non_exhaustive()
    }
}

impl CertificateStore {
    pub fn new(fallback_host: impl Into<String>, validity_years: u32) -> Self {
        install_crypto_provider();
        Self {
            certs: DashMap::new(),
            validity_years,
            fallback_host: fallback_host.into(),
            accepts: None,
        }
    }

    /// Only generate certificates for SNI names `accepts` approves; every
    /// other handshake gets the fallback host's certificate. Without a
    /// filter every name is accepted.
    pub fn with_host_filter(mut self, accepts: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.accepts = Some(Box::new(accepts));
        self
    }

    /// Hostname whose certificate answers a handshake naming `sni`.
    pub fn handshake_host<'a>(&'a self, sni: Option<&'a str>) -> &'a str {
        match sni {
            Some(name) if self.certs.contains_key(name) => name,
            Some(name) if self.accepts.as_ref().map_or(true, |accepts| accepts(name)) => name,
            Some(name) => {
                tracing::debug!(sni = %name, fallback = %self.fallback_host, "Unserved SNI name");
                self.fallback_host.as_str()
            }
            None => self.fallback_host.as_str(),
        }
    }

    /// Return the hostname's certificate, creating it if absent.
    pub fn certificate_for(&self, hostname: &str) -> Result<Arc<HostCertificate>, CertificateError> {
        if let Some(existing) = self.certs.get(hostname) {
            return Ok(Arc::clone(existing.value()));
        }

        match self.certs.entry(hostname.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let cert = Arc::new(generate(hostname, self.validity_years)?);
                tracing::info!(
                    hostname = %hostname,
                    not_after = ?cert.not_after,
                    "Generated self-signed certificate"
                );
                metrics::record_certificate_issued();
                entry.insert(Arc::clone(&cert));
                Ok(cert)
            }
        }
    }

    /// Number of hostnames with a certificate.
    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Load every `<hostname>.crt` with a matching `<hostname>.key` from `dir`.
    ///
    /// Returns the number of certificates loaded. Loaded certificates take
    /// precedence over generated ones.
    pub fn load_dir(&self, dir: &Path) -> Result<usize, CertificateError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| CertificateError::Io { path, source }
        };

        let mut loaded = 0;
        for entry in std::fs::read_dir(dir).map_err(io_err(dir))? {
            let entry = entry.map_err(io_err(dir))?;
            let cert_path = entry.path();
            if cert_path.extension().and_then(|e| e.to_str()) != Some("crt") {
                continue;
            }
            let Some(hostname) = cert_path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let key_path = cert_path.with_extension("key");

            let mut reader = BufReader::new(File::open(&cert_path).map_err(io_err(&cert_path))?);
            let chain = rustls_pemfile::certs(&mut reader)
                .collect::<Result<Vec<_>, _>>()
                .map_err(io_err(&cert_path))?;
            if chain.is_empty() {
                return Err(CertificateError::MissingCertificate(cert_path));
            }

            let mut reader = BufReader::new(File::open(&key_path).map_err(io_err(&key_path))?);
            let key = rustls_pemfile::private_key(&mut reader)
                .map_err(io_err(&key_path))?
                .ok_or_else(|| CertificateError::MissingKey(key_path.clone()))?;
            let signing_key = rustls::crypto::ring::sign::any_supported_type(&key)?;

            self.certs.insert(
                hostname.to_string(),
                Arc::new(HostCertificate {
                    hostname: hostname.to_string(),
                    certified_key: Arc::new(CertifiedKey::new(chain, signing_key)),
                    not_after: None,
                }),
            );
            tracing::debug!(hostname = %hostname, "Loaded certificate from store");
            loaded += 1;
        }
        Ok(loaded)
    }
}

impl ResolvesServerCert for CertificateStore {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let hostname = self.handshake_host(client_hello.server_name());
        match self.certificate_for(hostname) {
            Ok(cert) => Some(Arc::clone(&cert.certified_key)),
            Err(e) => {
                tracing::error!(hostname = %hostname, error = %e, "No certificate for handshake");
                None
            }
        }
    }
}

/// Server-side TLS configuration answering from the store.
pub fn server_config(store: Arc<CertificateStore>) -> ServerConfig {
    install_crypto_provider();
    ServerConfig::builder()
        .with_no_client_auth()
        .with_cert_resolver(store)
}

fn generate(hostname: &str, validity_years: u32) -> Result<HostCertificate, CertificateError> {
    let mut params = CertificateParams::new(vec![hostname.to_string()])?;
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, hostname);
    params.distinguished_name = name;

    let today = Utc::now().date_naive();
    let expiry_year = today.year() + validity_years as i32;
    params.not_before = rcgen::date_time_ymd(today.year(), today.month() as u8, today.day() as u8);
    // First of the month keeps the date valid in every year.
    params.not_after = rcgen::date_time_ymd(expiry_year, today.month() as u8, 1);

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    let signing_key = rustls::crypto::ring::sign::any_supported_type(&key)?;

    let not_after = NaiveDate::from_ymd_opt(expiry_year, today.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc());

    Ok(HostCertificate {
        hostname: hostname.to_string(),
        certified_key: Arc::new(CertifiedKey::new(vec![cert.der().clone()], signing_key)),
        not_after,
    })
}
