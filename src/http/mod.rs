//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request ID, timeout)
//!     → request.rs (method check, http::Request → EdgeRequest)
//!     → [viewer-request function: redirect or forward]
//!     → origin.rs (bucket fetch, retries, custom error pages)
//!     → response.rs (EdgeResponse ↔ http::Response)
//!     → [viewer-response function: security headers]
//!     → Send to client
//! ```

pub mod origin;
pub mod request;
pub mod response;
pub mod server;

pub use origin::{OriginClient, OriginError};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
