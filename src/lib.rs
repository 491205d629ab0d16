//! Static site edge: CDN edge functions and the runtime that hosts them.

// Edge functions and their event model
pub mod edge;
pub mod stack;

// Runtime
pub mod config;
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::EdgeConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
