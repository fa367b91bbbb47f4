//! Per-request state shared by middleware and handlers

use crate::{Request, Response};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;
use trellis_router::{MatchOutcome, Method, Route};

/// Where a request is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Received,
    Matching,
    Matched,
    NotMatched,
    Dispatching,
    Dispatched,
    ThrowableCaught,
    Terminated,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Received => "received",
            Phase::Matching => "matching",
            Phase::Matched => "matched",
            Phase::NotMatched => "not_matched",
            Phase::Dispatching => "dispatching",
            Phase::Dispatched => "dispatched",
            Phase::ThrowableCaught => "throwable_caught",
            Phase::Terminated => "terminated",
        }
    }
}

/// Result of route matching, as seen by middleware
#[derive(Debug, Clone, Default)]
pub enum MatchState {
    /// Matching has not run (request-received stage)
    #[default]
    Pending,
    Matched(Arc<Route>),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

/// State carried through one pass of the router
#[derive(Debug)]
pub struct RequestContext {
    pub request: Request,
    phase: Phase,
    matched: MatchState,
    response: Option<Response>,
    attributes: HashMap<String, Value>,
    started: Instant,
}

impl RequestContext {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            phase: Phase::Received,
            matched: MatchState::Pending,
            response: None,
            attributes: HashMap::new(),
            started: Instant::now(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn enter(&mut self, phase: Phase) {
        trace!(from = self.phase.as_str(), to = phase.as_str(), path = %self.request.path, "Lifecycle transition");
        self.phase = phase;
    }

    pub fn match_state(&self) -> &MatchState {
        &self.matched
    }

    /// The matched route, once matching succeeded
    pub fn route(&self) -> Option<&Arc<Route>> {
        match &self.matched {
            MatchState::Matched(route) => Some(route),
            _ => None,
        }
    }

    /// Methods the path answers to, when the match failed with 405
    pub fn allowed_methods(&self) -> &[Method] {
        match &self.matched {
            MatchState::MethodNotAllowed(allowed) => allowed,
            _ => &[],
        }
    }

    /// Record a match outcome; captured parameters move onto the request
    pub(crate) fn record_match(&mut self, outcome: MatchOutcome) {
        self.matched = match outcome {
            MatchOutcome::Matched(m) => {
                self.request.params = m.params;
                MatchState::Matched(m.route)
            }
            MatchOutcome::MethodNotAllowed { allowed } => MatchState::MethodNotAllowed(allowed),
            MatchOutcome::NotFound => MatchState::NotFound,
        };
    }

    /// Final response; set before the terminated stage runs
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub(crate) fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    /// Attach a value for later middleware or the handler
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_router::{Dispatch, Matcher, RouteCollection};

    #[test]
    fn test_record_match_moves_params() {
        let mut routes = RouteCollection::new();
        routes
            .add(Route::new("show", [Method::Get], "/users/{id}", Dispatch::function("show")).unwrap())
            .unwrap();

        let mut ctx = RequestContext::new(Request::new(Method::Get, "/users/9"));
        assert!(matches!(ctx.match_state(), MatchState::Pending));

        ctx.record_match(Matcher::new(&routes).match_route(Method::Get, "/users/9"));
        assert_eq!(ctx.route().unwrap().name(), "show");
        assert_eq!(ctx.request.param("id"), Some("9"));
    }

    #[test]
    fn test_method_not_allowed_exposes_allowed() {
        let mut ctx = RequestContext::new(Request::new(Method::Post, "/"));
        ctx.record_match(MatchOutcome::MethodNotAllowed {
            allowed: vec![Method::Get, Method::Head],
        });
        assert!(ctx.route().is_none());
        assert_eq!(ctx.allowed_methods(), [Method::Get, Method::Head]);
    }

    #[test]
    fn test_attributes() {
        let mut ctx = RequestContext::new(Request::new(Method::Get, "/"));
        ctx.insert("user", Value::from(42));
        assert_eq!(ctx.get("user"), Some(&Value::from(42)));
        assert!(ctx.get("missing").is_none());
    }
}
