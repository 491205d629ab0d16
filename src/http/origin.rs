//! Origin fetch.
//!
//! # Responsibilities
//! - Map the (normalized) viewer path onto the origin bucket endpoint
//! - Serve the default root object for `/`
//! - Retry idempotent fetches with backoff under a retry budget
//! - Replace configured error statuses with custom error pages
//!
//! # Design Decisions
//! - The raw viewer query string is forwarded unchanged
//! - Host and hop-by-hop headers are not forwarded; the client sets Host
//!   from the origin URL
//! - `http` and `https` origins share one client; https verifies against
//!   the webpki root set
//! - The retry budget is owned by the caller so it outlives reloads
//! - A custom error page that cannot be fetched falls back to the
//!   original origin response

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Method, Request, Response, StatusCode, Uri};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use url::Url;

use crate::config::{EdgeConfig, ErrorResponseConfig, RetryConfig};
use crate::observability::metrics;
use crate::resilience::backoff::origin_backoff;
use crate::resilience::retries::{is_retryable, RetryBudget};

/// Retries always available regardless of traffic volume.
pub const RETRY_RESERVE: u64 = 10;

const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Failure talking to the origin.
#[derive(Debug, Error)]
pub enum OriginError {
    #[error("invalid origin url: {0}")]
    InvalidUrl(String),

    #[error("origin request timed out after {0:?}")]
    Timeout(Duration),

    #[error("origin request failed: {0}")]
    Connect(String),
}

impl OriginError {
    /// Status returned to the viewer for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            OriginError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            OriginError::InvalidUrl(_) | OriginError::Connect(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            OriginError::InvalidUrl(_) => "invalid_url",
            OriginError::Timeout(_) => "timeout",
            OriginError::Connect(_) => "connect",
        }
    }

    fn is_retryable(&self) -> bool {
        !matches!(self, OriginError::InvalidUrl(_))
    }
}

/// HTTP client bound to one origin.
pub struct OriginClient {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    scheme: String,
    authority: String,
    path_prefix: String,
    default_root_object: String,
    error_responses: Vec<ErrorResponseConfig>,
    attempt_timeout: Duration,
    retries: RetryConfig,
    budget: Arc<RetryBudget>,
}

impl std::fmt::Debug for OriginClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OriginClient")
            .field("origin", &self.base_url())
            .field("default_root_object", &self.default_root_object)
            .finish_non_exhaustive()
    }
}

impl OriginClient {
    /// Client with a fresh retry budget.
    pub fn from_config(config: &EdgeConfig) -> Result<Self, OriginError> {
        let budget = Arc::new(RetryBudget::new(config.retries.budget_ratio, RETRY_RESERVE));
        Self::with_budget(config, budget)
    }

    /// Client that spends retries from a shared `budget`.
    pub fn with_budget(config: &EdgeConfig, budget: Arc<RetryBudget>) -> Result<Self, OriginError> {
        let origin = &config.origin;
        let url = Url::parse(&origin.url).map_err(|e| OriginError::InvalidUrl(e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| OriginError::InvalidUrl(format!("{} has no host", origin.url)))?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let path_prefix = format!(
            "{}{}",
            url.path().trim_end_matches('/'),
            origin.path_prefix.trim_end_matches('/')
        );

        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            scheme: url.scheme().to_string(),
            authority,
            path_prefix,
            default_root_object: origin.default_root_object.clone(),
            error_responses: origin.error_responses.clone(),
            attempt_timeout: Duration::from_secs(config.timeouts.origin_secs),
            retries: config.retries.clone(),
            budget,
        })
    }

    pub fn budget(&self) -> &Arc<RetryBudget> {
        &self.budget
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}{}", self.scheme, self.authority, self.path_prefix)
    }

    /// Object key path at the origin for a viewer path.
    pub fn object_path(&self, uri: &str) -> String {
        if uri == "/" {
            format!("{}/{}", self.path_prefix, self.default_root_object)
        } else {
            format!("{}{}", self.path_prefix, uri)
        }
    }

    fn target_uri(&self, path: &str, query: Option<&str>) -> Result<Uri, OriginError> {
        let target = match query {
            Some(q) if !q.is_empty() => format!("{}://{}{}?{}", self.scheme, self.authority, path, q),
            _ => format!("{}://{}{}", self.scheme, self.authority, path),
        };
        target
            .parse()
            .map_err(|e: axum::http::uri::InvalidUri| OriginError::InvalidUrl(e.to_string()))
    }

    fn error_page_for(&self, status: StatusCode) -> Option<&ErrorResponseConfig> {
        self.error_responses
            .iter()
            .find(|page| page.error_code == status.as_u16())
    }

    /// Fetch `uri` from the origin, applying custom error pages.
    pub async fn fetch(
        &self,
        method: &Method,
        uri: &str,
        query: Option<&str>,
        headers: &HeaderMap,
    ) -> Result<Response<Body>, OriginError> {
        self.budget.record_request();

        let path = self.object_path(uri);
        let response = self.fetch_with_retries(method, &path, query, headers).await?;

        let Some(page) = self.error_page_for(response.status()) else {
            return Ok(response);
        };

        let page_path = format!("{}{}", self.path_prefix, page.response_page_path);
        match self.fetch_with_retries(method, &page_path, None, headers).await {
            Ok(page_response) if page_response.status().is_success() => {
                tracing::debug!(
                    origin_status = %response.status(),
                    page = %page.response_page_path,
                    "Serving custom error page"
                );
                let (mut parts, body) = page_response.into_parts();
                if let Ok(status) = StatusCode::from_u16(page.response_code) {
                    parts.status = status;
                }
                if let Ok(value) = HeaderValue::from_str(&format!("max-age={}", page.ttl_secs)) {
                    parts.headers.insert(header::CACHE_CONTROL, value);
                }
                Ok(Response::from_parts(parts, body))
            }
            Ok(page_response) => {
                tracing::warn!(
                    page = %page.response_page_path,
                    status = %page_response.status(),
                    "Custom error page unavailable, serving origin response"
                );
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(page = %page.response_page_path, error = %e, "Custom error page fetch failed");
                Ok(response)
            }
        }
    }

    async fn fetch_with_retries(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
    ) -> Result<Response<Body>, OriginError> {
        let uri = self.target_uri(path, query)?;
        let max_attempts = if self.retries.enabled {
            self.retries.max_attempts.max(1)
        } else {
            1
        };

        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = self.attempt(method, uri.clone(), headers).await;

            let retryable = match &outcome {
                Ok(response) => is_retryable(method, Some(response.status()), false),
                Err(e) => e.is_retryable() && is_retryable(method, None, true),
            };

            if attempts < max_attempts && retryable && self.budget.can_retry() {
                let delay = origin_backoff(attempts, &self.retries);
                match &outcome {
                    Ok(response) => tracing::info!(
                        uri = %uri, attempt = attempts, delay = ?delay, status = %response.status(),
                        "Retrying origin fetch"
                    ),
                    Err(e) => tracing::info!(
                        uri = %uri, attempt = attempts, delay = ?delay, error = %e,
                        "Retrying origin fetch after error"
                    ),
                }
                metrics::record_origin_retry();
                tokio::time::sleep(delay).await;
                continue;
            }

            return outcome.map(|response| response.map(Body::new));
        }
    }

    async fn attempt(
        &self,
        method: &Method,
        uri: Uri,
        headers: &HeaderMap,
    ) -> Result<Response<Incoming>, OriginError> {
        let mut builder = Request::builder().method(method.clone()).uri(uri);
        if let Some(forwarded) = builder.headers_mut() {
            for (name, value) in headers {
                if *name == header::HOST || HOP_BY_HOP.contains(name) {
                    continue;
                }
                forwarded.append(name.clone(), value.clone());
            }
        }
        let request = builder
            .body(Body::empty())
            .map_err(|e| OriginError::InvalidUrl(e.to_string()))?;

        match tokio::time::timeout(self.attempt_timeout, self.client.request(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(OriginError::Connect(e.to_string())),
            Err(_) => Err(OriginError::Timeout(self.attempt_timeout)),
        }
    }
}
