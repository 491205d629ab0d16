//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) and echo it back to the viewer
//! - Convert the incoming HTTP request into an [`EdgeRequest`]
//! - Enforce the allowed method set
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Header names are lowercase in the edge record; repeated headers are
//!   joined with ", "
//! - Host falls back to the URI authority (HTTP/2 `:authority`)

use axum::http::{Method, Request};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::edge::{EdgeRequest, FieldValue};

pub const X_REQUEST_ID: &str = "x-request-id";

/// Methods the distribution accepts. Anything else gets 403.
pub const ALLOWED_METHODS: [Method; 3] = [Method::GET, Method::HEAD, Method::OPTIONS];

/// Layer that assigns a UUID request ID when the viewer did not send one.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer that copies the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

/// Access to the request ID assigned by [`set_request_id_layer`].
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> &str {
        self.headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

pub fn is_allowed_method(method: &Method) -> bool {
    ALLOWED_METHODS.contains(method)
}

/// Build the viewer-request record from an HTTP request.
pub fn to_edge_request<B>(request: &Request<B>) -> EdgeRequest {
    let uri = request.uri();
    let mut edge = EdgeRequest::new(request.method().as_str(), uri.path());

    if let Some(query) = uri.query() {
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            edge.querystring
                .insert(name.into_owned(), FieldValue::new(value.into_owned()));
        }
    }

    let headers = request.headers();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");
        edge.headers
            .insert(name.as_str().to_string(), FieldValue::new(joined));
    }

    if !edge.headers.contains_key("host") {
        if let Some(authority) = uri.authority() {
            edge.headers
                .insert("host".to_string(), FieldValue::new(authority.as_str()));
        }
    }

    edge
}
