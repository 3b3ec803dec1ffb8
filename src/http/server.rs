//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router and wire up middleware (request ID, tracing,
//!   timeout, security headers)
//! - Dispatch each request by Host: `proxy.<host>` goes to the gateway,
//!   every other name to the hosted sites
//! - Serve until the shutdown broadcast fires

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::BridgeConfig;
use crate::http::request::{request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::http::site::serve_site;
use crate::proxy::Gateway;
use crate::security;
use crate::site::tenant::host_name;
use crate::site::Sites;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub sites: Arc<Sites>,
    /// Absent when the gateway is disabled.
    pub gateway: Option<Arc<Gateway>>,
    pub proxy_host: String,
}

/// HTTP front end for hosted sites and the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: Arc<BridgeConfig>, sites: Arc<Sites>) -> Self {
        let gateway = config
            .proxy
            .enabled
            .then(|| Arc::new(Gateway::new(&config.proxy, &config.site.site_title)));

        let state = AppState {
            sites,
            gateway,
            proxy_host: config.proxy_host().to_ascii_lowercase(),
        };

        Self {
            router: Self::build_router(&config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &BridgeConfig, state: AppState) -> Router {
        let mut router = Router::new().fallback(dispatch).with_state(state);
        if config.security.enable_headers {
            router = security::headers::apply(router);
        }

        router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id(request.headers()),
                        method = %request.method(),
                        host = request.headers().get(header::HOST).and_then(|v| v.to_str().ok()).unwrap_or("-"),
                        path = %request.uri().path(),
                    )
                }))
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                .layer(TimeoutLayer::new(Duration::from_secs(config.http.request_timeout_secs))),
        )
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Route by Host header.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
        .unwrap_or_default()
        .to_string();
    let (parts, _body) = request.into_parts();

    match &state.gateway {
        Some(gateway) if host_name(&host) == state.proxy_host => {
            gateway.handle(&parts.method, &parts.uri, &parts.headers).await
        }
        _ => serve_site(state.sites, &host, &parts.method, &parts.uri, &parts.headers).await,
    }
}
