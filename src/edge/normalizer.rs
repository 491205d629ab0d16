//! URI/Host normalizer (viewer-request function).
//!
//! # Responsibilities
//! - Resolve implicit `index.html` targets in the request path
//! - Redirect non-canonical hosts with a 301 to the canonical one
//!
//! # Design Decisions
//! - Path normalization runs before the host check, so a redirect
//!   carries the normalized path
//! - "Has an extension" means "contains a dot anywhere", directory
//!   segments included. `/v1.2/docs` is left untouched.

use serde::{Deserialize, Serialize};

use crate::edge::error::EdgeError;
use crate::edge::event::{EdgeEvent, EdgeRequest, EdgeResponse, FunctionResult};
use crate::edge::function::{EdgeFunction, Phase};

const WWW_PREFIX: &str = "www.";

/// How the canonical host is enforced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostPolicy {
    /// Redirect one exact legacy host to the canonical host.
    LegacyHost {
        legacy_host: String,
        canonical_host: String,
    },
    /// Redirect any `www.` host to the same host without the prefix.
    #[default]
    StripWww,
}

impl HostPolicy {
    /// Host to redirect to, or `None` when `host` is already canonical.
    pub fn redirect_host<'a>(&'a self, host: &'a str) -> Option<&'a str> {
        match self {
            HostPolicy::LegacyHost {
                legacy_host,
                canonical_host,
            } => (host == legacy_host).then_some(canonical_host.as_str()),
            HostPolicy::StripWww => host
                .strip_prefix(WWW_PREFIX)
                .filter(|stripped| !stripped.is_empty()),
        }
    }
}

/// Resolve an implicit `index.html` target.
///
/// ```
/// use static_edge::edge::normalize_uri;
///
/// assert_eq!(normalize_uri("/posts/"), "/posts/index.html");
/// assert_eq!(normalize_uri("/about"), "/about/index.html");
/// assert_eq!(normalize_uri("/style.css"), "/style.css");
/// ```
pub fn normalize_uri(uri: &str) -> String {
    if uri.ends_with('/') {
        format!("{uri}index.html")
    } else if !uri.contains('.') {
        format!("{uri}/index.html")
    } else {
        uri.to_string()
    }
}

/// The viewer-request function.
#[derive(Debug, Clone, Default)]
pub struct UriNormalizer {
    policy: HostPolicy,
}

impl UriNormalizer {
    pub fn new(policy: HostPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &HostPolicy {
        &self.policy
    }

    /// Normalize the path, then either redirect or hand the request back.
    pub fn handle(&self, mut request: EdgeRequest) -> Result<FunctionResult, EdgeError> {
        request.uri = normalize_uri(&request.uri);

        let host = request.host().ok_or(EdgeError::MissingHostHeader)?;

        if let Some(target) = self.policy.redirect_host(host) {
            let location = format!("https://{}{}", target, request.uri);
            tracing::debug!(host = %host, location = %location, "Redirecting to canonical host");
            return Ok(FunctionResult::Response(EdgeResponse::moved_permanently(
                location,
            )));
        }

        Ok(FunctionResult::Request(request))
    }
}

impl EdgeFunction for UriNormalizer {
    fn name(&self) -> &'static str {
        "uri-normalizer"
    }

    fn phase(&self) -> Phase {
        Phase::ViewerRequest
    }

    fn invoke(&self, event: EdgeEvent) -> Result<FunctionResult, EdgeError> {
        self.handle(event.request)
    }
}
