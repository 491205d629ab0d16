//! Edge function subsystem.
//!
//! # Data Flow
//! ```text
//! Viewer request:
//!     EdgeRequest
//!     → function.rs (build viewer-request EdgeEvent)
//!     → normalizer.rs (rewrite uri, maybe synthesize 301)
//!     → FunctionResult::Request (forward to origin)
//!       or FunctionResult::Response (short-circuit to client)
//!
//! Viewer response:
//!     EdgeRequest + EdgeResponse
//!     → function.rs (build viewer-response EdgeEvent)
//!     → headers.rs (inject security headers)
//!     → EdgeResponse (sent to client)
//! ```
//!
//! # Design Decisions
//! - Functions are pure: owned record in, new record out
//! - No shared state between the two phases
//! - The only failure path is a malformed event (e.g. no host header)

pub mod error;
pub mod event;
pub mod function;
pub mod headers;
pub mod normalizer;

pub use error::EdgeError;
pub use event::{EdgeEvent, EdgeRequest, EdgeResponse, FieldValue, FunctionResult, HeaderMap};
pub use function::{EdgeFunction, FunctionAssociations, Phase};
pub use headers::{CspVariant, SecurityHeaders};
pub use normalizer::{normalize_uri, HostPolicy, UriNormalizer};
