//! Security header injector (viewer-response function).
//!
//! Every response handed to the injector leaves with the same six headers,
//! whatever its status or content type. Existing values are overwritten.

use serde::{Deserialize, Serialize};

use crate::edge::error::EdgeError;
use crate::edge::event::{EdgeEvent, EdgeResponse, FunctionResult};
use crate::edge::function::{EdgeFunction, Phase};

pub const STRICT_TRANSPORT_SECURITY: &str = "max-age=63072000; includeSubdomains; preload";
pub const X_CONTENT_TYPE_OPTIONS: &str = "nosniff";
pub const X_XSS_PROTECTION: &str = "1; mode=block";
pub const REFERRER_POLICY: &str = "same-origin";
pub const X_FRAME_OPTIONS: &str = "DENY";

pub const CSP_SELF_WITH_ANALYTICS: &str = "default-src https://www.google-analytics.com; \
img-src 'self' https://www.google-analytics.com ssl.google-analytics.com www.google.com analytics.google.com; \
connect-src www.google-analytics.com stats.g.doubleclick.net ampcid.google.com analytics.google.com; \
script-src 'self' https://www.google-analytics.com https://ssl.google-analytics.com https://www.googletagmanager.com https://google-analytics.com 'sha256-0CvETIgOK2clmfWGF5sSIEiekhHQQDQzs6qA3VIIZiU=' 'sha256-a72MzDH/lZnJJFjeA4unJdesRzjwr3TeZVNYucgNkJk=' 'sha256-YuKrUzfHifZMvulN9J+ICcG12MJdVW5ShCH03Gb4RZ4=' 'sha256-X5avg43RTxt2cSum+E3xICbowEMaOBxeBiNh05CXDTY=' 'sha256-4O+m6kk1wMpldFXFB8ldHkY/86U5xWfKtcSWERnGmhA=' 'sha256-z2izUJPvGYTnFTpFb7prEv2Soyt9qIS/B/aWU80v7As=' 'sha256-0CvETIgOK2clmfWGF5sSIEiekhHQQDQzs6qA3VIIZiU=' 'sha256-a72MzDH/lZnJJFjeA4unJdesRzjwr3TeZVNYucgNkJk='; \
style-src 'self' https://cdnjs.cloudflare.com; \
object-src 'none'; \
frame-ancestors 'none'";

pub const CSP_LOCKED_DOWN: &str = "default-src 'none'; \
script-src 'self' https://*.googletagmanager.com 'unsafe-inline'; \
img-src 'self' https://*.google-analytics.com https://*.googletagmanager.com; \
connect-src https://*.google-analytics.com https://*.analytics.google.com https://*.googletagmanager.com; \
style-src 'self' 'unsafe-inline' https://cdnjs.cloudflare.com; \
object-src 'none'; \
form-action 'self'";

/// Content-Security-Policy flavour, fixed per deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CspVariant {
    /// Analytics allow-list with hash-pinned inline scripts.
    SelfWithAnalytics,
    /// `default-src 'none'` with explicit per-directive grants.
    #[default]
    LockedDown,
}

impl CspVariant {
    pub fn policy(self) -> &'static str {
        match self {
            CspVariant::SelfWithAnalytics => CSP_SELF_WITH_ANALYTICS,
            CspVariant::LockedDown => CSP_LOCKED_DOWN,
        }
    }
}

/// The viewer-response function.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityHeaders {
    csp: CspVariant,
}

impl SecurityHeaders {
    pub fn new(csp: CspVariant) -> Self {
        Self { csp }
    }

    pub fn csp(&self) -> CspVariant {
        self.csp
    }

    /// Header names and values in the order they are applied.
    pub fn entries(&self) -> [(&'static str, &'static str); 6] {
        [
            ("strict-transport-security", STRICT_TRANSPORT_SECURITY),
            ("content-security-policy", self.csp.policy()),
            ("x-content-type-options", X_CONTENT_TYPE_OPTIONS),
            ("x-xss-protection", X_XSS_PROTECTION),
            ("referrer-policy", REFERRER_POLICY),
            ("x-frame-options", X_FRAME_OPTIONS),
        ]
    }

    pub fn apply(&self, mut response: EdgeResponse) -> EdgeResponse {
        for (name, value) in self.entries() {
            response.set_header(name, value);
        }
        response
    }
}

impl EdgeFunction for SecurityHeaders {
    fn name(&self) -> &'static str {
        "security-headers"
    }

    fn phase(&self) -> Phase {
        Phase::ViewerResponse
    }

    fn invoke(&self, event: EdgeEvent) -> Result<FunctionResult, EdgeError> {
        let response = event
            .response
            .ok_or(EdgeError::MissingResponse(Phase::ViewerResponse))?;
        Ok(FunctionResult::Response(self.apply(response)))
    }
}
