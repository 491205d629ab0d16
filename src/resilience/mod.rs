//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Origin fetch:
//!     → per-attempt timeout (tokio::time::timeout in http/origin.rs)
//!     → On failure: retries.rs (check if retryable, spend retry budget)
//!     → backoff.rs (exponential delay with jitter before next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every origin call has a deadline
//! - Retries only for idempotent requests (GET, HEAD, OPTIONS)

pub mod backoff;
pub mod retries;
