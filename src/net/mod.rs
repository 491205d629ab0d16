//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! listener.rs (bind viewer socket)
//!     → tls.rs (optional: PEM cert/key → rustls acceptor)
//!     → Hand off to HTTP layer
//! ```

pub mod listener;
pub mod tls;
