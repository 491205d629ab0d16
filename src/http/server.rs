//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the edge handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Run the viewer-request function, the origin fetch and the
//!   viewer-response function for every request
//! - Swap state on configuration reload
//! - Observability (metrics, request IDs)

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::Response,
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::EdgeConfig;
use crate::edge::{EdgeEvent, EdgeRequest, FunctionAssociations, FunctionResult, Phase};
use crate::http::origin::{OriginClient, OriginError, RETRY_RESERVE};
use crate::http::request::{
    is_allowed_method, propagate_request_id_layer, set_request_id_layer, to_edge_request,
    RequestIdExt,
};
use crate::http::response::{apply_edge_response, edge_error, into_http_response, to_edge_response};
use crate::observability::metrics;
use crate::resilience::retries::RetryBudget;

/// Everything rebuilt on configuration reload.
#[derive(Debug)]
pub struct InnerState {
    pub config: EdgeConfig,
    pub functions: FunctionAssociations,
    pub origin: OriginClient,
}

impl InnerState {
    pub fn build(config: EdgeConfig, budget: Arc<RetryBudget>) -> Result<Self, OriginError> {
        let origin = OriginClient::with_budget(&config, budget)?;
        let functions = FunctionAssociations::from_config(&config.site, &config.functions);
        Ok(Self {
            config,
            functions,
            origin,
        })
    }
}

/// Counters exposed on the admin API.
#[derive(Debug, Default)]
pub struct EdgeStats {
    pub requests: AtomicU64,
    pub redirects: AtomicU64,
    pub function_errors: AtomicU64,
    pub origin_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub redirects: u64,
    pub function_errors: u64,
    pub origin_errors: u64,
}

impl EdgeStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_requests: self.requests.load(Ordering::Relaxed),
            redirects: self.redirects.load(Ordering::Relaxed),
            function_errors: self.function_errors.load(Ordering::Relaxed),
            origin_errors: self.origin_errors.load(Ordering::Relaxed),
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<InnerState>>,
    pub stats: Arc<EdgeStats>,
    /// Shared across reloads; `budget_ratio` changes need a restart.
    budget: Arc<RetryBudget>,
    limiter: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: EdgeConfig) -> Result<Self, OriginError> {
        let limiter = Arc::new(Semaphore::new(config.listener.max_connections));
        let budget = Arc::new(RetryBudget::new(config.retries.budget_ratio, RETRY_RESERVE));
        let inner = InnerState::build(config, budget.clone())?;
        Ok(Self {
            inner: Arc::new(ArcSwap::from_pointee(inner)),
            stats: Arc::new(EdgeStats::default()),
            budget,
            limiter,
        })
    }

    /// Replace functions and origin settings. In-flight requests finish on
    /// the state they started with.
    pub fn reload(&self, config: EdgeConfig) -> Result<(), OriginError> {
        let inner = InnerState::build(config, self.budget.clone())?;
        tracing::info!(
            domain = %inner.config.site.domain_name,
            origin = %inner.origin.base_url(),
            functions = ?inner.functions.describe(),
            "Configuration reloaded"
        );
        self.inner.store(Arc::new(inner));
        Ok(())
    }

    /// Refuse new requests with 503 while connections drain.
    pub fn close(&self) {
        self.limiter.close();
    }
}

/// HTTP server for the edge runtime.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: EdgeConfig) -> Result<Self, OriginError> {
        let request_timeout = Duration::from_secs(config.timeouts.request_secs);
        let state = AppState::new(config)?;
        let router = Self::build_router(request_timeout, state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(request_timeout: Duration, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(edge_handler))
            .route("/", any(edge_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(set_request_id_layer())
                    .layer(TraceLayer::new_for_http())
                    .layer(propagate_request_id_layer())
                    .layer(TimeoutLayer::new(request_timeout)),
            )
    }

    /// Shared state, for the admin API.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// The router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<EdgeConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::spawn(apply_config_updates(self.state.clone(), config_updates));

        let state = self.state.clone();
        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
                state.close();
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server behind TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<EdgeConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        tokio::spawn(apply_config_updates(self.state.clone(), config_updates));

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            state.close();
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(
                self.router
                    .into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

async fn apply_config_updates(state: AppState, mut updates: mpsc::UnboundedReceiver<EdgeConfig>) {
    while let Some(config) = updates.recv().await {
        if let Err(e) = state.reload(config) {
            tracing::error!(error = %e, "Rejected configuration update");
        }
    }
}

/// Main edge handler.
/// Runs viewer-request, fetches from the origin, runs viewer-response.
async fn edge_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    // Static objects only: the viewer body is never forwarded.
    let (parts, _body) = request.into_parts();
    let request = Request::from_parts(parts, ());
    let method = request.method().clone();

    let Ok(_permit) = state.limiter.clone().acquire_owned().await else {
        let (edge, body) = edge_error(StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down");
        return into_http_response(&edge, body);
    };

    state.stats.requests.fetch_add(1, Ordering::Relaxed);
    let inner = state.inner.load_full();
    let request_id = request.request_id().to_string();

    if !is_allowed_method(&method) {
        tracing::debug!(request_id = %request_id, method = %method, "Method not allowed");
        metrics::record_request(method.as_str(), 403, start_time);
        let (edge, body) = edge_error(StatusCode::FORBIDDEN, "Method not allowed");
        return into_http_response(&edge, body);
    }

    let mut event = EdgeEvent::viewer_request(to_edge_request(&request)).with_request_id(&request_id);
    event.context.distribution_domain_name = Some(inner.config.site.domain_name.clone());
    if let Some(ConnectInfo(peer)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        event = event.with_viewer_ip(peer.ip().to_string());
    }

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        uri = %event.request.uri,
        host = ?event.request.host(),
        "Edge request"
    );

    let forwarded = match inner.functions.run_viewer_request(event) {
        Ok(FunctionResult::Request(forwarded)) => forwarded,
        Ok(FunctionResult::Response(synthesized)) => {
            if (300..400).contains(&synthesized.status_code) {
                state.stats.redirects.fetch_add(1, Ordering::Relaxed);
                metrics::record_redirect();
            }
            tracing::debug!(
                request_id = %request_id,
                status = synthesized.status_code,
                location = ?synthesized.header("location"),
                "Viewer-request function answered"
            );
            metrics::record_request(method.as_str(), synthesized.status_code, start_time);
            return into_http_response(&synthesized, Body::empty());
        }
        Err(e) => {
            return function_failure(&state, Phase::ViewerRequest, &request_id, &e, &method, start_time);
        }
    };

    let origin_response = match inner
        .origin
        .fetch(&method, &forwarded.uri, request.uri().query(), request.headers())
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(request_id = %request_id, uri = %forwarded.uri, error = %e, "Origin error");
            state.stats.origin_errors.fetch_add(1, Ordering::Relaxed);
            metrics::record_origin_error(e.kind());
            let (edge, body) = edge_error(e.status(), "Origin unavailable");
            into_http_response(&edge, body)
        }
    };

    finish(&state, &inner, forwarded, origin_response, &request_id, &method, start_time)
}

/// Run viewer-response and write the result onto the outgoing response.
fn finish(
    state: &AppState,
    inner: &InnerState,
    forwarded: EdgeRequest,
    response: Response,
    request_id: &str,
    method: &axum::http::Method,
    start_time: Instant,
) -> Response {
    let (mut parts, body) = response.into_parts();
    let edge = to_edge_response(&parts);

    match inner.functions.run_viewer_response(forwarded, edge) {
        Ok(edge) => {
            apply_edge_response(&mut parts, &edge);
            metrics::record_request(method.as_str(), parts.status.as_u16(), start_time);
            Response::from_parts(parts, body)
        }
        Err(e) => function_failure(state, Phase::ViewerResponse, request_id, &e, method, start_time),
    }
}

fn function_failure(
    state: &AppState,
    phase: Phase,
    request_id: &str,
    error: &crate::edge::EdgeError,
    method: &axum::http::Method,
    start_time: Instant,
) -> Response {
    tracing::error!(request_id = %request_id, phase = %phase, error = %error, "Edge function failed");
    state.stats.function_errors.fetch_add(1, Ordering::Relaxed);
    metrics::record_function_error(phase);
    metrics::record_request(method.as_str(), 503, start_time);
    let (edge, body) = edge_error(StatusCode::SERVICE_UNAVAILABLE, "Edge function failed");
    into_http_response(&edge, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    fn server() -> HttpServer {
        let mut config = EdgeConfig::default();
        config.origin.url = "http://127.0.0.1:9".to_string();
        config.retries.enabled = false;
        HttpServer::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_www_redirect_short_circuits() {
        let response = server()
            .router()
            .oneshot(
                Request::builder()
                    .uri("/posts/")
                    .header("host", "www.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(
            response.headers()["location"],
            "https://example.com/posts/index.html"
        );
        // Redirects skip the viewer-response function
        assert!(response.headers().get("x-frame-options").is_none());
        assert!(response.headers().get("x-request-id").is_some());
    }

    #[tokio::test]
    async fn test_post_is_forbidden() {
        let response = server()
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/")
                    .header("host", "example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_host_is_function_error() {
        let server = server();
        let state = server.state();
        let response = server
            .router()
            .oneshot(Request::builder().uri("/about").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(state.stats.snapshot().function_errors, 1);
    }

    #[tokio::test]
    async fn test_origin_failure_still_gets_security_headers() {
        let server = server();
        let state = server.state();
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/about")
                    .header("host", "example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()["x-frame-options"], "DENY");
        assert_eq!(state.stats.snapshot().origin_errors, 1);
    }

    #[tokio::test]
    async fn test_closed_state_refuses_requests() {
        let server = server();
        server.state().close();
        let response = server
            .router()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header("host", "example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(server.state().stats.snapshot().total_requests, 0);
    }

    #[tokio::test]
    async fn test_reload_keeps_retry_budget() {
        let server = server();
        let state = server.state();
        let before = state.inner.load().origin.budget().clone();

        let config = state.inner.load().config.clone();
        state.reload(config).unwrap();

        assert!(Arc::ptr_eq(state.inner.load().origin.budget(), &before));
    }

    #[tokio::test]
    async fn test_reload_swaps_functions() {
        let server = server();
        let state = server.state();

        let mut config = state.inner.load().config.clone();
        config.functions.viewer_request = false;
        state.reload(config).unwrap();

        assert!(state
            .inner
            .load()
            .functions
            .get(Phase::ViewerRequest)
            .is_none());
    }
}
