//! Per-invocation edge records.
//!
//! The shapes mirror the CDN function event so that events captured from a
//! distribution can be replayed through `edge-cli invoke` unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::edge::function::Phase;

/// Header and query string maps: lowercase name to `{ "value": ... }`.
pub type HeaderMap = BTreeMap<String, FieldValue>;

/// A single header or query string value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldValue {
    pub value: String,
}

impl FieldValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// The viewer request as seen by an edge function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EdgeRequest {
    #[serde(default = "default_method")]
    pub method: String,

    /// Path only, no query string.
    pub uri: String,

    #[serde(default)]
    pub querystring: HeaderMap,

    #[serde(default)]
    pub headers: HeaderMap,
}

fn default_method() -> String {
    "GET".to_string()
}

impl EdgeRequest {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            querystring: HeaderMap::new(),
            headers: HeaderMap::new(),
        }
    }

    /// Builder-style header insert. Names are stored lowercase.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), FieldValue::new(value));
        self
    }

    /// Value of the `host` header, if present.
    pub fn host(&self) -> Option<&str> {
        self.headers.get("host").map(|h| h.value.as_str())
    }
}

/// A response produced by the origin or synthesized by a function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeResponse {
    pub status_code: u16,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status_description: String,

    #[serde(default)]
    pub headers: HeaderMap,
}

impl EdgeResponse {
    pub fn new(status_code: u16, status_description: impl Into<String>) -> Self {
        Self {
            status_code,
            status_description: status_description.into(),
            headers: HeaderMap::new(),
        }
    }

    /// 301 with a `location` header.
    pub fn moved_permanently(location: impl Into<String>) -> Self {
        let mut response = Self::new(301, "Moved Permanently");
        response
            .headers
            .insert("location".to_string(), FieldValue::new(location));
        response
    }

    /// Set a header, replacing any existing value.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .insert(name.to_ascii_lowercase(), FieldValue::new(value));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|h| h.value.as_str())
    }
}

/// Invocation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventContext {
    pub event_type: Phase,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_domain_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Viewer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// The full event handed to an edge function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EdgeEvent {
    #[serde(default = "default_version")]
    pub version: String,

    pub context: EventContext,

    #[serde(default)]
    pub viewer: Viewer,

    pub request: EdgeRequest,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<EdgeResponse>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl EdgeEvent {
    pub fn viewer_request(request: EdgeRequest) -> Self {
        Self {
            version: default_version(),
            context: EventContext {
                event_type: Phase::ViewerRequest,
                request_id: None,
                distribution_domain_name: None,
            },
            viewer: Viewer::default(),
            request,
            response: None,
        }
    }

    pub fn viewer_response(request: EdgeRequest, response: EdgeResponse) -> Self {
        Self {
            version: default_version(),
            context: EventContext {
                event_type: Phase::ViewerResponse,
                request_id: None,
                distribution_domain_name: None,
            },
            viewer: Viewer::default(),
            request,
            response: Some(response),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.context.request_id = Some(request_id.into());
        self
    }

    pub fn with_viewer_ip(mut self, ip: impl Into<String>) -> Self {
        self.viewer.ip = Some(ip.into());
        self
    }
}

/// What a function hands back: the request to forward, or a response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FunctionResult {
    Response(EdgeResponse),
    Request(EdgeRequest),
}

impl FunctionResult {
    pub fn kind(&self) -> &'static str {
        match self {
            FunctionResult::Response(_) => "response",
            FunctionResult::Request(_) => "request",
        }
    }
}
