//! Hosted sites over HTTP.
//!
//! # Responsibilities
//! - Resolve the tenant from the Host header and the resource from the path
//! - Negotiate raw gemtext, transcoded HTML or passthrough bytes
//! - Stream raw and passthrough files from disk; only HTML is buffered
//! - Turn every non-success outcome into an HTML error page

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use chrono::{DateTime, Utc};
use tokio::io::AsyncReadExt;
use url::Url;

use crate::error::{GatewayError, GatewayResult};
use crate::gemtext::{self, Document};
use crate::http::response::{redirect, ErrorPage};
use crate::observability::metrics;
use crate::site::negotiate::{negotiate, wants_raw, Representation};
use crate::site::tenant::host_name;
use crate::site::{Protocol, Resource, Sites, Tenant, ATOM_MIME};
use crate::transcode::{render, render_page, LinkResolver, PageContext};

const GEMTEXT_CONTENT_TYPE: &str = "text/gemini; charset=utf-8";
const FILE_CHUNK_SIZE: usize = 16 * 1024;

/// Answer one HTTP request for a hosted site.
pub async fn serve_site(sites: Arc<Sites>, host: &str, method: &Method, uri: &Uri, headers: &HeaderMap) -> Response {
    let site_title = sites.site_title().to_string();
    let (outcome, response) = match serve(sites, host, method, uri, headers).await {
        Ok(response) => ("ok", response),
        Err(e) => {
            if matches!(e, GatewayError::Internal(_)) {
                tracing::error!(host = %host, path = %uri.path(), error = %e, "Site request failed");
            }
            ("error", ErrorPage::from_error(&e, &site_title).into_response())
        }
    };
    metrics::record_site_request(outcome, response.status().as_u16());
    response
}

async fn serve(sites: Arc<Sites>, host: &str, method: &Method, uri: &Uri, headers: &HeaderMap) -> GatewayResult<Response> {
    if method != Method::GET && method != Method::HEAD {
        return Err(GatewayError::MethodNotAllowed);
    }
    let tenant = sites.tenant_for(host).ok_or(GatewayError::NotFound)?;
    let hostname = host_name(host);
    let path = uri.path().to_string();

    let resource = Arc::clone(&sites)
        .resolve(tenant.clone(), hostname.clone(), path.clone(), Protocol::Http)
        .await?;

    let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok());
    let raw = wants_raw(uri.query());
    let page = PageInfo {
        sites: &sites,
        tenant: &tenant,
        hostname: &hostname,
        path: &path,
    };

    match resource {
        Resource::Redirect { location, permanent } => Ok(redirect(&location, permanent)),
        Resource::Forbidden => Err(GatewayError::Forbidden),
        Resource::NotFound => Err(GatewayError::NotFound),
        Resource::Feed { atom } => Ok(([(header::CONTENT_TYPE, ATOM_MIME)], atom).into_response()),
        Resource::Gemtext { document, modified } => {
            let response = match negotiate(gemtext::GEMTEXT_MIME, accept, raw) {
                Representation::Html => Html(page.render(&document)).into_response(),
                _ => ([(header::CONTENT_TYPE, GEMTEXT_CONTENT_TYPE)], document.to_gemtext()).into_response(),
            };
            Ok(with_last_modified(response, modified))
        }
        Resource::File { path: file, media_type, modified } => {
            let internal = |e: std::io::Error| GatewayError::Internal(format!("{}: {}", file.display(), e));
            let response = match negotiate(&media_type, accept, raw) {
                Representation::Html => {
                    let source = tokio::fs::read(&file).await.map_err(internal)?;
                    Html(page.render(&gemtext::parse(&source))).into_response()
                }
                Representation::Raw => stream_file(&file, GEMTEXT_CONTENT_TYPE).await.map_err(internal)?,
                Representation::Passthrough => stream_file(&file, &media_type).await.map_err(internal)?,
            };
            Ok(with_last_modified(response, modified))
        }
    }
}

/// Stream a file from disk without buffering it.
async fn stream_file(path: &Path, content_type: &str) -> std::io::Result<Response> {
    let file = tokio::fs::File::open(path).await?;
    let length = file.metadata().await?.len();
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let chunks = futures_util::stream::unfold(Some(file), |file| async move {
        let mut file = file?;
        let mut buf = vec![0u8; FILE_CHUNK_SIZE];
        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok::<_, std::io::Error>(Bytes::from(buf)), Some(file)))
            }
            Err(e) => Some((Err(e), None)),
        }
    });

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, HeaderValue::from(length)),
        ],
        Body::from_stream(chunks),
    )
        .into_response())
}

struct PageInfo<'a> {
    sites: &'a Sites,
    tenant: &'a Tenant,
    hostname: &'a str,
    path: &'a str,
}

impl PageInfo<'_> {
    fn render(&self, document: &Document) -> String {
        let fallback = match self.tenant {
            Tenant::Main => self.sites.site_title().to_string(),
            Tenant::User(name) => format!("{}{}", name, self.path),
        };
        let transcoded = render(document, &LinkResolver::local(), &fallback);
        let gemini_url = Url::parse(&format!("gemini://{}{}", self.hostname, self.path)).ok();
        render_page(&PageContext {
            site_title: self.sites.site_title(),
            title: &transcoded.title,
            body: &transcoded.body,
            gemini_url: gemini_url.as_ref(),
            proxied: false,
        })
    }
}

fn with_last_modified(mut response: Response, modified: Option<SystemTime>) -> Response {
    if let Some(modified) = modified {
        let date = DateTime::<Utc>::from(modified).format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        if let Ok(value) = HeaderValue::from_str(&date) {
            response.headers_mut().insert(header::LAST_MODIFIED, value);
        }
    }
    if response.status() == StatusCode::OK {
        response
            .headers_mut()
            .entry(header::CACHE_CONTROL)
            .or_insert(HeaderValue::from_static("no-cache"));
    }
    response
}
