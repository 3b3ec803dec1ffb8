//! Gateway request handling.
//!
//! # Responsibilities
//! - Accept GET/HEAD only; serve a disallow-all robots.txt
//! - Turn `/<host>/<path>?<query>` into a `gemini://` URL
//! - Fetch it under one deadline and map the outcome onto HTTP
//! - Transcode gemtext for browsers, stream everything else
//!
//! # Design Decisions
//! - Redirects are surfaced one hop at a time, never followed here
//! - The upstream connection is owned by the response value and closes on
//!   every exit path, including client disconnects mid-stream

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use url::Url;

use crate::config::ProxyConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::gemini::{GeminiClient, GeminiResponse, SCHEME};
use crate::gemtext;
use crate::http::response::{redirect, ErrorPage};
use crate::observability::metrics;
use crate::proxy::status::{map_status, Action, RedirectTarget};
use crate::site::negotiate::{negotiate, wants_raw, Representation};
use crate::transcode::{render, render_interstitial, render_page, LinkResolver, NativeLinks, PageContext};

const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /\n";

/// The gateway served on `proxy.<host>`.
#[derive(Clone)]
pub struct Gateway {
    client: GeminiClient,
    max_body_bytes: usize,
    site_title: String,
}

impl Gateway {
    pub fn new(config: &ProxyConfig, site_title: &str) -> Self {
        Self {
            client: GeminiClient::new(Duration::from_secs(config.timeout_secs))
                .with_default_port(config.default_port),
            max_body_bytes: config.max_body_bytes,
            site_title: site_title.to_string(),
        }
    }

    /// Answer one HTTP request addressed to the gateway.
    pub async fn handle(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> Response {
        let start = Instant::now();

        if method != Method::GET && method != Method::HEAD {
            return self.error(&GatewayError::MethodNotAllowed);
        }
        if uri.path() == "/robots.txt" {
            return ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], ROBOTS_TXT).into_response();
        }

        let url = match target_url(uri.path(), uri.query()) {
            Ok(url) => url,
            Err(e) => return self.error(&e),
        };

        let (native, response) = match self.client.request(&url).await {
            Ok(upstream) => {
                let native = upstream.header.status;
                (native, self.respond(upstream, uri, headers).await)
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Gateway request failed");
                (0, self.error(&e))
            }
        };

        tracing::info!(
            url = %url,
            native_status = native,
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Gateway request"
        );
        metrics::record_gateway_request(native, response.status().as_u16(), start);
        response
    }

    async fn respond(&self, upstream: GeminiResponse, uri: &Uri, headers: &HeaderMap) -> Response {
        let decision = map_status(upstream.header.status, &upstream.header.meta, &upstream.url);

        match decision.action {
            Action::PromptInput => ErrorPage::new(
                decision.status,
                format!(
                    "The remote server asks for input ({}), which this gateway does not support",
                    upstream.header.meta
                ),
                &self.site_title,
            )
            .into_response(),
            Action::ShowBodyAsError(message) => {
                ErrorPage::new(decision.status, message, &self.site_title).into_response()
            }
            Action::Unsupported(message) => self.error(&GatewayError::UnsupportedFeature(message)),
            Action::Redirect(RedirectTarget::Gateway(location)) => redirect(&location, false),
            Action::Redirect(RedirectTarget::External(destination)) => {
                (decision.status, Html(render_interstitial(&self.site_title, &destination))).into_response()
            }
            Action::ShowBody => match self.show_body(upstream, uri, headers).await {
                Ok(response) => response,
                Err(e) => self.error(&e),
            },
        }
    }

    async fn show_body(&self, upstream: GeminiResponse, uri: &Uri, headers: &HeaderMap) -> GatewayResult<Response> {
        let media_type = upstream.header.media_type().ok_or_else(|| {
            GatewayError::UpstreamProtocol(format!(
                "{} {}: not a media type",
                upstream.header.status, upstream.header.meta
            ))
        })?;

        let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok());
        match negotiate(&media_type, accept, wants_raw(uri.query())) {
            Representation::Html => {
                let url = upstream.url.clone();
                let source = upstream
                    .read_body(self.max_body_bytes, self.client.timeout().as_secs())
                    .await?;
                let document = gemtext::parse(&source);
                let links = LinkResolver::new(Some(&url), NativeLinks::ViaGateway);
                let page = render(&document, &links, url.as_str());
                let html = render_page(&PageContext {
                    site_title: &self.site_title,
                    title: &page.title,
                    body: &page.body,
                    gemini_url: Some(&url),
                    proxied: true,
                });
                Ok(Html(html).into_response())
            }
            Representation::Raw | Representation::Passthrough => {
                let content_type = HeaderValue::from_str(upstream.header.content_type())
                    .map_err(|_| GatewayError::UpstreamProtocol("unusable media type".to_string()))?;
                let body = Body::from_stream(upstream.into_stream());
                Ok((StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response())
            }
        }
    }

    fn error(&self, error: &GatewayError) -> Response {
        ErrorPage::from_error(error, &self.site_title).into_response()
    }
}

/// Build the upstream URL for a gateway path such as `/a.example/x/y`.
///
/// The first segment is the target authority; the query is carried over.
pub fn target_url(path: &str, query: Option<&str>) -> GatewayResult<Url> {
    let rest = path.strip_prefix('/').unwrap_or(path);
    if rest.is_empty() {
        return Err(GatewayError::NotFound);
    }
    let (authority, tail) = match rest.split_once('/') {
        Some((authority, tail)) => (authority, tail),
        None => (rest, ""),
    };
    if authority.is_empty() {
        return Err(GatewayError::BadRequest("missing target host".to_string()));
    }

    let mut url = Url::parse(&format!("{}://{}/{}", SCHEME, authority, tail))
        .map_err(|e| GatewayError::BadRequest(format!("invalid target {:?}: {}", rest, e)))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(GatewayError::BadRequest("missing target host".to_string()));
    }
    url.set_query(query);
    Ok(url)
}
