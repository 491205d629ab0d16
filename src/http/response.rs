//! Response handling and transformation.
//!
//! # Responsibilities
//! - Convert origin responses into [`EdgeResponse`] records
//! - Write function results back onto the HTTP response
//! - Render synthesized responses (redirects, errors)
//!
//! # Design Decisions
//! - The edge record is authoritative for header names: headers the
//!   function dropped are removed, changed ones are replaced
//! - Untouched multi-value headers (e.g. set-cookie) keep every value
//! - Header values that are not valid HTTP are skipped with a warning

use axum::body::Body;
use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use axum::http::response::Parts;
use axum::http::StatusCode;
use axum::response::Response;

use crate::edge::{self, EdgeResponse, FieldValue};

fn joined(headers: &HeaderMap, name: &HeaderName) -> String {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(", ")
}

fn edge_headers(headers: &HeaderMap) -> edge::HeaderMap {
    headers
        .keys()
        .map(|name| (name.as_str().to_string(), FieldValue::new(joined(headers, name))))
        .collect()
}

/// Build the viewer-response record from origin response parts.
pub fn to_edge_response(parts: &Parts) -> EdgeResponse {
    EdgeResponse {
        status_code: parts.status.as_u16(),
        status_description: parts.status.canonical_reason().unwrap_or_default().to_string(),
        headers: edge_headers(&parts.headers),
    }
}

/// Sync status and headers of `parts` with a function's output.
pub fn apply_edge_response(parts: &mut Parts, edge: &EdgeResponse) {
    match StatusCode::from_u16(edge.status_code) {
        Ok(status) => parts.status = status,
        Err(_) => tracing::warn!(status = edge.status_code, "Ignoring invalid status code"),
    }

    let stale: Vec<HeaderName> = parts
        .headers
        .keys()
        .filter(|name| !edge.headers.contains_key(name.as_str()))
        .cloned()
        .collect();
    for name in stale {
        parts.headers.remove(&name);
    }

    for (name, field) in &edge.headers {
        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            tracing::warn!(header = %name, "Skipping invalid header name");
            continue;
        };
        if joined(&parts.headers, &header_name) == field.value {
            continue;
        }
        match HeaderValue::from_str(&field.value) {
            Ok(value) => {
                parts.headers.insert(header_name, value);
            }
            Err(_) => tracing::warn!(header = %name, "Skipping invalid header value"),
        }
    }
}

/// Render a record with no origin behind it (redirects, synthesized errors).
pub fn into_http_response(edge: &EdgeResponse, body: Body) -> Response {
    let (mut parts, body) = Response::new(body).into_parts();
    apply_edge_response(&mut parts, edge);
    Response::from_parts(parts, body)
}

/// Plain-text error produced by the edge itself, as a record plus its body.
pub fn edge_error(status: StatusCode, message: &'static str) -> (EdgeResponse, Body) {
    let mut response = EdgeResponse::new(
        status.as_u16(),
        status.canonical_reason().unwrap_or_default(),
    );
    response.set_header("content-type", "text/plain; charset=utf-8");
    (response, Body::from(message))
}
