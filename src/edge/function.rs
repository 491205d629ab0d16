//! Edge function trait and phase associations.
//!
//! # Responsibilities
//! - Define the invocation contract (event in, result out)
//! - Hold at most one function per phase
//! - Apply a function result back onto the request/response pair

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{FunctionsConfig, SiteConfig};
use crate::edge::error::EdgeError;
use crate::edge::event::{EdgeEvent, EdgeRequest, EdgeResponse, FunctionResult};
use crate::edge::headers::SecurityHeaders;
use crate::edge::normalizer::UriNormalizer;

/// Point in the request lifecycle where a function runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Before the origin fetch.
    ViewerRequest,
    /// Before the response leaves the edge.
    ViewerResponse,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::ViewerRequest => "viewer-request",
            Phase::ViewerResponse => "viewer-response",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer-request" => Ok(Phase::ViewerRequest),
            "viewer-response" => Ok(Phase::ViewerResponse),
            other => Err(format!("unknown phase: {other}")),
        }
    }
}

/// A stateless function invoked synchronously by the edge runtime.
pub trait EdgeFunction: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn phase(&self) -> Phase;

    fn invoke(&self, event: EdgeEvent) -> Result<FunctionResult, EdgeError>;
}

/// Functions attached to the distribution, one slot per phase.
#[derive(Debug, Clone, Default)]
pub struct FunctionAssociations {
    viewer_request: Option<Arc<dyn EdgeFunction>>,
    viewer_response: Option<Arc<dyn EdgeFunction>>,
}

impl FunctionAssociations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `function` to its phase, replacing any previous association.
    pub fn associate(mut self, function: Arc<dyn EdgeFunction>) -> Self {
        match function.phase() {
            Phase::ViewerRequest => self.viewer_request = Some(function),
            Phase::ViewerResponse => self.viewer_response = Some(function),
        }
        self
    }

    /// Build the normalizer and header injector from site configuration.
    pub fn from_config(site: &SiteConfig, functions: &FunctionsConfig) -> Self {
        let mut associations = Self::new();
        if functions.viewer_request {
            associations =
                associations.associate(Arc::new(UriNormalizer::new(site.host_policy.clone())));
        }
        if functions.viewer_response {
            associations = associations
                .associate(Arc::new(SecurityHeaders::new(site.content_security_policy)));
        }
        associations
    }

    pub fn get(&self, phase: Phase) -> Option<&Arc<dyn EdgeFunction>> {
        match phase {
            Phase::ViewerRequest => self.viewer_request.as_ref(),
            Phase::ViewerResponse => self.viewer_response.as_ref(),
        }
    }

    /// Names of associated functions, for the admin API.
    pub fn describe(&self) -> Vec<(Phase, &'static str)> {
        [Phase::ViewerRequest, Phase::ViewerResponse]
            .into_iter()
            .filter_map(|phase| self.get(phase).map(|f| (phase, f.name())))
            .collect()
    }

    /// Run the viewer-request function. Without one, the request passes through.
    pub fn run_viewer_request(&self, event: EdgeEvent) -> Result<FunctionResult, EdgeError> {
        match &self.viewer_request {
            Some(function) => function.invoke(event),
            None => Ok(FunctionResult::Request(event.request)),
        }
    }

    /// Run the viewer-response function and return the response to send.
    pub fn run_viewer_response(
        &self,
        request: EdgeRequest,
        response: EdgeResponse,
    ) -> Result<EdgeResponse, EdgeError> {
        let Some(function) = &self.viewer_response else {
            return Ok(response);
        };

        match function.invoke(EdgeEvent::viewer_response(request, response))? {
            FunctionResult::Response(response) => Ok(response),
            other => Err(EdgeError::UnexpectedResult {
                function: function.name(),
                phase: Phase::ViewerResponse,
                found: other.kind(),
            }),
        }
    }

    /// Dispatch a raw event to the function for its phase.
    pub fn invoke(&self, event: EdgeEvent) -> Result<FunctionResult, EdgeError> {
        match event.context.event_type {
            Phase::ViewerRequest => self.run_viewer_request(event),
            Phase::ViewerResponse => {
                let response = event
                    .response
                    .ok_or(EdgeError::MissingResponse(Phase::ViewerResponse))?;
                self.run_viewer_response(event.request, response)
                    .map(FunctionResult::Response)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::headers::CspVariant;
    use crate::edge::normalizer::HostPolicy;

    #[derive(Debug)]
    struct Echo;

    impl EdgeFunction for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn phase(&self) -> Phase {
            Phase::ViewerResponse
        }

        fn invoke(&self, event: EdgeEvent) -> Result<FunctionResult, EdgeError> {
            Ok(FunctionResult::Request(event.request))
        }
    }

    fn site() -> SiteConfig {
        SiteConfig {
            domain_name: "example.com".into(),
            host_policy: HostPolicy::StripWww,
            content_security_policy: CspVariant::LockedDown,
        }
    }

    #[test]
    fn test_from_config_respects_toggles() {
        let both = FunctionAssociations::from_config(&site(), &FunctionsConfig::default());
        assert_eq!(
            both.describe(),
            vec![
                (Phase::ViewerRequest, "uri-normalizer"),
                (Phase::ViewerResponse, "security-headers"),
            ]
        );

        let none = FunctionAssociations::from_config(
            &site(),
            &FunctionsConfig {
                viewer_request: false,
                viewer_response: false,
            },
        );
        assert!(none.describe().is_empty());
    }

    #[test]
    fn test_unassociated_phases_pass_through() {
        let associations = FunctionAssociations::new();
        let request = EdgeRequest::new("GET", "/about").with_header("host", "www.example.com");

        let result = associations
            .run_viewer_request(EdgeEvent::viewer_request(request.clone()))
            .unwrap();
        assert_eq!(result, FunctionResult::Request(request.clone()));

        let response = associations
            .run_viewer_response(request, EdgeResponse::new(200, "OK"))
            .unwrap();
        assert!(response.headers.is_empty());
    }

    #[test]
    fn test_viewer_response_rejects_request_result() {
        let associations = FunctionAssociations::new().associate(Arc::new(Echo));
        let err = associations
            .run_viewer_response(EdgeRequest::new("GET", "/"), EdgeResponse::new(200, "OK"))
            .unwrap_err();

        assert_eq!(
            err,
            EdgeError::UnexpectedResult {
                function: "echo",
                phase: Phase::ViewerResponse,
                found: "request",
            }
        );
    }

    #[test]
    fn test_invoke_dispatches_on_event_type() {
        let associations = FunctionAssociations::from_config(&site(), &FunctionsConfig::default());
        let request = EdgeRequest::new("GET", "/").with_header("host", "example.com");

        let event = EdgeEvent::viewer_response(request, EdgeResponse::new(200, "OK"));
        match associations.invoke(event).unwrap() {
            FunctionResult::Response(r) => assert_eq!(r.headers.len(), 6),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_phase_round_trips_through_str() {
        for phase in [Phase::ViewerRequest, Phase::ViewerResponse] {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
        assert!("origin-request".parse::<Phase>().is_err());
    }
}
