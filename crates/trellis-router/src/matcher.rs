//! Request matching against a [`RouteCollection`]
//!
//! ## Order
//! 1. Exact static lookup (no regex evaluated)
//! 2. Dynamic routes of the method, in registration order, first match wins
//! 3. HEAD falls back to GET when enabled
//!
//! No specificity scoring: when two dynamic routes both match, the one
//! registered first is returned.

use crate::pattern::normalize;
use crate::{Method, Params, Route, RouteCollection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a trailing slash on the request path is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingSlash {
    /// `/users/` matches `/users`
    #[default]
    Strip,
    /// Paths must match exactly; pair with a redirect middleware
    Strict,
}

/// Matcher behavior switches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    pub trailing_slash: TrailingSlash,
    /// Serve HEAD requests from GET routes when no HEAD route matches
    pub head_fallback: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            trailing_slash: TrailingSlash::Strip,
            head_fallback: true,
        }
    }
}

/// A matched route and its captured parameters
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    pub params: Params,
}

/// Result of matching a method and path
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Matched(RouteMatch),
    /// The path exists, but not for this method
    MethodNotAllowed { allowed: Vec<Method> },
    /// No route has this path
    NotFound,
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }

    pub fn into_match(self) -> Option<RouteMatch> {
        match self {
            MatchOutcome::Matched(m) => Some(m),
            _ => None,
        }
    }
}

/// Borrowing matcher over a route collection
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'a> {
    routes: &'a RouteCollection,
    options: MatchOptions,
}

impl<'a> Matcher<'a> {
    pub fn new(routes: &'a RouteCollection) -> Self {
        Self {
            routes,
            options: MatchOptions::default(),
        }
    }

    pub fn options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Match a request
    ///
    /// # Example
    /// ```
    /// use trellis_router::{Dispatch, Matcher, MatchOutcome, Method, Route, RouteCollection};
    ///
    /// let mut routes = RouteCollection::new();
    /// routes
    ///     .add(Route::new("user.show", [Method::Get], "/users/{id:num}", Dispatch::function("show")).unwrap())
    ///     .unwrap();
    ///
    /// let matcher = Matcher::new(&routes);
    /// let m = matcher.match_route(Method::Get, "/users/7").into_match().unwrap();
    /// assert_eq!(m.params.get("id"), Some("7"));
    /// assert!(matches!(matcher.match_route(Method::Post, "/users/7"), MatchOutcome::MethodNotAllowed { .. }));
    /// assert!(matches!(matcher.match_route(Method::Get, "/nope"), MatchOutcome::NotFound));
    /// ```
    pub fn match_route(&self, method: Method, path: &str) -> MatchOutcome {
        let path = self.normalize(path);

        if let Some(m) = self.find(method, path) {
            return MatchOutcome::Matched(m);
        }
        if method == Method::Head && self.options.head_fallback {
            if let Some(m) = self.find(Method::Get, path) {
                return MatchOutcome::Matched(m);
            }
        }

        let allowed = self.allowed_methods(path);
        if allowed.is_empty() {
            MatchOutcome::NotFound
        } else {
            MatchOutcome::MethodNotAllowed { allowed }
        }
    }

    /// Every method with a route for `path`, in canonical order
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let path = self.normalize(path);
        let mut allowed: Vec<Method> = Method::ALL
            .into_iter()
            .filter(|&m| self.find(m, path).is_some())
            .collect();
        if self.options.head_fallback
            && allowed.contains(&Method::Get)
            && !allowed.contains(&Method::Head)
        {
            allowed.push(Method::Head);
            allowed.sort();
        }
        allowed
    }

    fn normalize<'p>(&self, path: &'p str) -> &'p str {
        match self.options.trailing_slash {
            TrailingSlash::Strip => normalize(path),
            TrailingSlash::Strict => path,
        }
    }

    fn find(&self, method: Method, path: &str) -> Option<RouteMatch> {
        if let Some(route) = self.routes.static_route(method, path) {
            return Some(RouteMatch {
                route: Arc::clone(route),
                params: Params::new(),
            });
        }

        self.routes
            .dynamic_routes(method)
            .iter()
            .find_map(|route| {
                route.captures(path).map(|params| RouteMatch {
                    route: Arc::clone(route),
                    params,
                })
            })
    }
}
