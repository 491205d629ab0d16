//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, the origin URL and error page paths
//! - Validate value ranges (timeouts > 0, retry budget in [0, 1])
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EdgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::EdgeConfig;
use crate::edge::HostPolicy;

/// A single semantic problem with a config field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::new(
                "listener.tls",
                "cert_path and key_path are required",
            ));
        }
    }

    if config.site.domain_name.trim().is_empty() {
        errors.push(ValidationError::new("site.domain_name", "must not be empty"));
    }
    if let HostPolicy::LegacyHost {
        legacy_host,
        canonical_host,
    } = &config.site.host_policy
    {
        if legacy_host.is_empty() || canonical_host.is_empty() {
            errors.push(ValidationError::new(
                "site.host_policy",
                "legacy_host and canonical_host must not be empty",
            ));
        } else if legacy_host == canonical_host {
            errors.push(ValidationError::new(
                "site.host_policy",
                "legacy_host equals canonical_host (redirect loop)",
            ));
        }
    }

    match Url::parse(&config.origin.url) {
        Ok(url) if !matches!(url.scheme(), "http" | "https") => {
            errors.push(ValidationError::new("origin.url", "scheme must be http or https"));
        }
        Ok(url) if url.host_str().is_none() => {
            errors.push(ValidationError::new("origin.url", "missing host"));
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new("origin.url", e.to_string())),
    }
    if !config.origin.path_prefix.is_empty() && !config.origin.path_prefix.starts_with('/') {
        errors.push(ValidationError::new("origin.path_prefix", "must start with '/'"));
    }
    let root = &config.origin.default_root_object;
    if root.is_empty() || root.starts_with('/') {
        errors.push(ValidationError::new(
            "origin.default_root_object",
            "must be a non-empty object key without a leading '/'",
        ));
    }
    for (i, page) in config.origin.error_responses.iter().enumerate() {
        let field = format!("origin.error_responses[{i}]");
        if !(400..=599).contains(&page.error_code) {
            errors.push(ValidationError::new(&field, "error_code must be 400-599"));
        }
        if !(200..=599).contains(&page.response_code) {
            errors.push(ValidationError::new(&field, "response_code must be 200-599"));
        }
        if !page.response_page_path.starts_with('/') {
            errors.push(ValidationError::new(&field, "response_page_path must start with '/'"));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.timeouts.origin_secs == 0 {
        errors.push(ValidationError::new("timeouts.origin_secs", "must be > 0"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }
    if !(0.0..=1.0).contains(&config.retries.budget_ratio) {
        errors.push(ValidationError::new("retries.budget_ratio", "must be within 0.0-1.0"));
    }

    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }
    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if let Err(e) = value.parse::<SocketAddr>() {
        errors.push(ValidationError::new(field, format!("invalid address '{value}': {e}")));
    }
}
