//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::edge::{CspVariant, HostPolicy};

/// Root configuration for the edge runtime.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EdgeConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Site identity: domain, canonical host policy, CSP variant.
    pub site: SiteConfig,

    /// Which edge functions are associated.
    pub functions: FunctionsConfig,

    /// Origin (bucket endpoint) settings.
    pub origin: OriginConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Origin retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Site identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Apex domain the site is served from.
    pub domain_name: String,

    /// Canonical host enforcement for the viewer-request function.
    pub host_policy: HostPolicy,

    /// CSP flavour for the viewer-response function.
    pub content_security_policy: CspVariant,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            domain_name: "example.com".to_string(),
            host_policy: HostPolicy::StripWww,
            content_security_policy: CspVariant::LockedDown,
        }
    }
}

/// Function associations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FunctionsConfig {
    /// Attach the URI/host normalizer at viewer-request.
    pub viewer_request: bool,

    /// Attach the security header injector at viewer-response.
    pub viewer_response: bool,
}

impl Default for FunctionsConfig {
    fn default() -> Self {
        Self {
            viewer_request: true,
            viewer_response: true,
        }
    }
}

/// Origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Base URL of the origin (e.g., "http://127.0.0.1:9000").
    pub url: String,

    /// Path prepended to every origin request (e.g., "/site-bucket").
    pub path_prefix: String,

    /// Object served for requests to `/`.
    pub default_root_object: String,

    /// Error status rewrites.
    pub error_responses: Vec<ErrorResponseConfig>,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:9000".to_string(),
            path_prefix: String::new(),
            default_root_object: "index.html".to_string(),
            error_responses: vec![ErrorResponseConfig::default()],
        }
    }
}

/// Replace an origin error status with a custom page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ErrorResponseConfig {
    /// Origin status that triggers the rewrite.
    pub error_code: u16,

    /// Status sent to the viewer.
    pub response_code: u16,

    /// Page fetched from the origin instead.
    pub response_page_path: String,

    /// `cache-control: max-age` on the rewritten response.
    #[serde(default = "default_error_ttl")]
    pub ttl_secs: u64,
}

fn default_error_ttl() -> u64 {
    1800
}

impl Default for ErrorResponseConfig {
    fn default() -> Self {
        Self {
            error_code: 403,
            response_code: 403,
            response_page_path: "/404.html".to_string(),
            ttl_secs: default_error_ttl(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Per-attempt origin timeout in seconds.
    pub origin_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            origin_secs: 10,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, first one included.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Percentage of requests that can be retries (retry budget).
    /// e.g., 0.1 for 10% budget.
    pub budget_ratio: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            budget_ratio: 0.1,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: EdgeConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.site.host_policy, HostPolicy::StripWww);
        assert_eq!(config.origin.default_root_object, "index.html");
        assert_eq!(config.origin.error_responses, vec![ErrorResponseConfig::default()]);
        assert!(config.functions.viewer_request && config.functions.viewer_response);
    }

    #[test]
    fn test_full_site_section() {
        let raw = r#"
            [site]
            domain_name = "example.org"
            content_security_policy = "self_with_analytics"
            host_policy = { type = "legacy_host", legacy_host = "www.example.org", canonical_host = "example.org" }

            [functions]
            viewer_response = false

            [origin]
            url = "http://bucket.internal:9000"

            [[origin.error_responses]]
            error_code = 404
            response_code = 404
            response_page_path = "/missing.html"

            [observability]
            log_format = "json"
        "#;

        let config: EdgeConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.site.domain_name, "example.org");
        assert_eq!(config.site.content_security_policy, CspVariant::SelfWithAnalytics);
        assert_eq!(
            config.site.host_policy,
            HostPolicy::LegacyHost {
                legacy_host: "www.example.org".into(),
                canonical_host: "example.org".into(),
            }
        );
        assert!(config.functions.viewer_request);
        assert!(!config.functions.viewer_response);
        assert_eq!(config.origin.error_responses[0].ttl_secs, 1800);
        assert_eq!(config.origin.error_responses[0].error_code, 404);
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }
}
