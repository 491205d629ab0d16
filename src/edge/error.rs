//! Edge function errors.

use thiserror::Error;

use crate::edge::function::Phase;

/// Failure raised by an edge function invocation.
///
/// The runtime never retries these; the viewer gets an error response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EdgeError {
    #[error("request has no host header")]
    MissingHostHeader,

    #[error("{0} event carries no response")]
    MissingResponse(Phase),

    #[error("{function} returned a {found} during the {phase} phase")]
    UnexpectedResult {
        function: &'static str,
        phase: Phase,
        found: &'static str,
    },
}
