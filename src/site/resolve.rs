//! Request path → resource resolution for hosted sites.
//!
//! # Responsibilities
//! - Normalize request paths (percent-decoding, `.` and `..` segments)
//! - Refuse the hidden folder, redirect `index.gmi` and unslashed directories
//! - Generate listings, the gemlog feed page and the Atom feed on demand
//!
//! # Design Decisions
//! - Shared by the HTTP and Gemini front ends; only `index.gmi` redirects
//!   differ between them
//! - Blocking filesystem work; async callers use [`Sites::resolve`], which
//!   runs on the blocking pool

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::config::SiteConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::gemtext::Document;
use crate::site::feed::build_feed;
use crate::site::lister::{DirectoryLister, FsLister};
use crate::site::listing::{encode_path, folder_listing, tenant_index};
use crate::site::negotiate::media_type_for;
use crate::site::tenant::{host_name, resolve_tenant, Tenant};

const INDEX_FILE: &str = "index.gmi";
const ATOM_FILE: &str = "atom.xml";

/// Front end a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Gemini,
}

/// What a request path refers to.
#[derive(Debug)]
pub enum Resource {
    /// A generated gemtext page.
    Gemtext {
        document: Document,
        modified: Option<SystemTime>,
    },
    /// A stored file.
    File {
        path: PathBuf,
        media_type: String,
        modified: Option<SystemTime>,
    },
    /// A generated Atom feed.
    Feed { atom: String },
    /// Absolute path the client should request instead.
    Redirect { location: String, permanent: bool },
    Forbidden,
    NotFound,
}

/// All hosted sites under one files directory.
pub struct Sites {
    root: PathBuf,
    host: String,
    site_title: String,
    hidden_folder: String,
    gemlog_folder: String,
    domains: BTreeMap<String, String>,
    lister: Arc<dyn DirectoryLister>,
}

impl std::fmt::Debug for Sites {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sites")
            .field("root", &self.root)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl Sites {
    pub fn new(config: &SiteConfig, lister: Arc<dyn DirectoryLister>) -> Self {
        Self {
            root: PathBuf::from(&config.files_directory),
            host: config.host.clone(),
            site_title: config.site_title.clone(),
            hidden_folder: config.hidden_folder.clone(),
            gemlog_folder: config.gemlog_folder.clone(),
            domains: config.domains.clone(),
            lister,
        }
    }

    /// Sites stored on the local filesystem.
    pub fn from_config(config: &SiteConfig) -> Self {
        Self::new(config, Arc::new(FsLister))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn site_title(&self) -> &str {
        &self.site_title
    }

    pub fn tenant_for(&self, host: &str) -> Option<Tenant> {
        resolve_tenant(host, &self.host, &self.domains)
    }

    /// Whether `host` names something actually hosted here: the main host,
    /// a custom domain, or `<tenant>.<host>` with an existing tenant directory.
    pub fn serves_host(&self, host: &str) -> bool {
        let name = host_name(host);
        let main = host_name(&self.host);
        if name == main || self.domains.contains_key(&name) {
            return true;
        }
        match name.strip_suffix(main.as_str()).and_then(|rest| rest.strip_suffix('.')) {
            Some(label) if !label.contains('.') && label != self.hidden_folder => {
                matches!(self.tenant_for(&name), Some(Tenant::User(_)))
                    && self
                        .lister
                        .stat(&self.root.join(label))
                        .ok()
                        .flatten()
                        .is_some_and(|e| e.is_directory)
            }
            _ => false,
        }
    }

    /// Resolve on the blocking pool.
    pub async fn resolve(
        self: Arc<Self>,
        tenant: Tenant,
        host: String,
        path: String,
        protocol: Protocol,
    ) -> GatewayResult<Resource> {
        tokio::task::spawn_blocking(move || self.resolve_blocking(&tenant, &host, &path, protocol))
            .await
            .map_err(|e| GatewayError::Internal(format!("resolver task failed: {}", e)))?
    }

    /// Resolve a percent-encoded request path for `tenant` on `host`.
    pub fn resolve_blocking(
        &self,
        tenant: &Tenant,
        host: &str,
        raw_path: &str,
        protocol: Protocol,
    ) -> GatewayResult<Resource> {
        let decoded = percent_decode_str(raw_path)
            .decode_utf8()
            .map_err(|_| GatewayError::BadRequest("path is not valid UTF-8".to_string()))?;
        let trailing_slash = decoded.ends_with('/');
        let segments = normalize(&decoded)?;

        let name = match tenant {
            Tenant::Main if segments.is_empty() => return self.main_index(protocol),
            Tenant::Main => return Ok(Resource::NotFound),
            Tenant::User(name) => name,
        };

        if segments.first() == Some(&self.hidden_folder) {
            return Ok(Resource::Forbidden);
        }

        let site_root = self.root.join(name);
        if !self.stat(&site_root)?.is_some_and(|e| e.is_directory) {
            return Ok(Resource::NotFound);
        }

        if protocol == Protocol::Http && segments.last().map(String::as_str) == Some(INDEX_FILE) {
            return Ok(Resource::Redirect {
                location: encode_path(&segments[..segments.len() - 1], true),
                permanent: true,
            });
        }

        let fs_path = segments.iter().fold(site_root.clone(), |p, s| p.join(s));
        let entry = self.stat(&fs_path)?;

        if self.is_atom_path(&segments) && entry.is_none() {
            let feed = build_feed(
                self.lister.as_ref(),
                &site_root.join(&self.gemlog_folder),
                &self.gemlog_url(host)?,
                &self.feed_title(name),
                name,
            )
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
            let atom = feed.to_atom().map_err(|e| GatewayError::Internal(e.to_string()))?;
            return Ok(Resource::Feed { atom });
        }

        let Some(entry) = entry else {
            return Ok(Resource::NotFound);
        };

        if !entry.is_directory {
            return Ok(Resource::File {
                media_type: media_type_for(&fs_path),
                path: fs_path,
                modified: entry.modified,
            });
        }

        if !trailing_slash && !segments.is_empty() {
            return Ok(Resource::Redirect {
                location: encode_path(&segments, true),
                permanent: false,
            });
        }

        let index = fs_path.join(INDEX_FILE);
        if let Some(index_entry) = self.stat(&index)?.filter(|e| !e.is_directory) {
            return Ok(Resource::File {
                path: index,
                media_type: media_type_for(Path::new(INDEX_FILE)),
                modified: index_entry.modified,
            });
        }

        if segments.len() == 1 && segments[0] == self.gemlog_folder {
            let feed = build_feed(
                self.lister.as_ref(),
                &fs_path,
                &self.gemlog_url(host)?,
                &self.feed_title(name),
                name,
            )
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
            return Ok(Resource::Gemtext {
                document: feed.to_gemfeed(),
                modified: entry.modified,
            });
        }

        let listing = self.lister.list(&fs_path).map_err(internal)?;
        let hidden = [self.hidden_folder.as_str()];
        let skip: &[&str] = if segments.is_empty() { &hidden } else { &[] };
        Ok(Resource::Gemtext {
            document: folder_listing(&encode_path(&segments, true), &listing, skip),
            modified: entry.modified,
        })
    }

    fn main_index(&self, protocol: Protocol) -> GatewayResult<Resource> {
        let tenants: Vec<String> = match self.lister.list(&self.root) {
            Ok(entries) => entries
                .into_iter()
                .filter(|e| e.is_directory && !e.name.starts_with('.'))
                .map(|e| e.name)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(internal(e)),
        };
        let scheme = match protocol {
            Protocol::Http => "//",
            Protocol::Gemini => "gemini://",
        };
        let document = tenant_index(&self.site_title, &tenants, |tenant| {
            format!("{}{}.{}/", scheme, tenant, self.host)
        });
        Ok(Resource::Gemtext { document, modified: None })
    }

    fn is_atom_path(&self, segments: &[String]) -> bool {
        segments.len() == 2 && segments[0] == self.gemlog_folder && segments[1] == ATOM_FILE
    }

    fn gemlog_url(&self, host: &str) -> GatewayResult<Url> {
        Url::parse(&format!("gemini://{}/{}/", host, self.gemlog_folder))
            .map_err(|e| GatewayError::BadRequest(format!("host {:?}: {}", host, e)))
    }

    fn feed_title(&self, tenant: &str) -> String {
        format!("{}'s gemlog", tenant)
    }

    fn stat(&self, path: &Path) -> GatewayResult<Option<crate::site::lister::DirEntry>> {
        self.lister.stat(path).map_err(internal)
    }
}

fn internal(e: std::io::Error) -> GatewayError {
    GatewayError::Internal(e.to_string())
}

/// Split a decoded path into segments, resolving `.` and `..` without ever
/// leaving the root.
fn normalize(path: &str) -> GatewayResult<Vec<String>> {
    let mut segments: Vec<String> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s if s.contains('\\') || s.contains('\0') => {
                return Err(GatewayError::BadRequest(format!("invalid path segment {:?}", s)));
            }
            s => segments.push(s.to_string()),
        }
    }
    Ok(segments)
}
