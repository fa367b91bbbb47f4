//! Six-stage middleware pipeline
//!
//! Each stage is an ordered chain. A unit receives the context and a
//! [`Next`]; it may call `next.run(ctx)` and adjust the result, or return its
//! own response and skip everything after it, including the stage's
//! terminal step.
//!
//! | Stage               | Terminal step                             |
//! |---------------------|-------------------------------------------|
//! | `RequestReceived`   | route matching                            |
//! | `RouteMatched`      | handler resolution + `RouteDispatched`    |
//! | `RouteNotMatched`   | bare 404 / 405                            |
//! | `RouteDispatched`   | the handler                               |
//! | `ThrowableCaught`   | re-raise the error                        |
//! | `Terminated`        | none; the final response is already fixed |

pub mod access_log;
pub mod error_page;
pub mod maintenance;
pub mod not_matched;
pub mod secure;
pub mod trailing_slash;

pub use access_log::AccessLog;
pub use error_page::ErrorRenderer;
pub use maintenance::MaintenanceMode;
pub use not_matched::NotMatchedResponder;
pub use secure::{HstsConfig, RequireHttps};
pub use trailing_slash::RedirectTrailingSlash;

use crate::{Error, RequestContext, Response, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;
use trellis_router::{Route, RouteCollection};

/// Pipeline stages, in lifecycle order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    RequestReceived,
    RouteMatched,
    RouteNotMatched,
    RouteDispatched,
    ThrowableCaught,
    Terminated,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::RequestReceived => "request_received",
            Stage::RouteMatched => "route_matched",
            Stage::RouteNotMatched => "route_not_matched",
            Stage::RouteDispatched => "route_dispatched",
            Stage::ThrowableCaught => "throwable_caught",
            Stage::Terminated => "terminated",
        }
    }
}

/// How per-route middleware is merged with the route-matched stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiddlewareOrder {
    #[default]
    GlobalFirst,
    RouteFirst,
}

/// A unit of one stage
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<Response>;
}

impl<F> Middleware for F
where
    F: Fn(&mut RequestContext, Next<'_>) -> Result<Response> + Send + Sync,
{
    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<Response> {
        self(ctx, next)
    }
}

/// The rest of a stage's chain
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    terminal: &'a mut dyn FnMut(&mut RequestContext) -> Result<Response>,
}

impl<'a> Next<'a> {
    pub fn run(self, ctx: &mut RequestContext) -> Result<Response> {
        match self.chain.split_first() {
            Some((first, rest)) => first.handle(
                ctx,
                Next {
                    chain: rest,
                    terminal: self.terminal,
                },
            ),
            None => (self.terminal)(ctx),
        }
    }
}

/// A unit of the throwable-caught stage.
///
/// Return a response to handle the error, or pass it on with
/// `next.run(ctx, error)`. Errors that fall off the end of the chain are
/// re-raised to the caller unchanged.
pub trait ErrorMiddleware: Send + Sync {
    fn handle(&self, ctx: &mut RequestContext, error: Error, next: ErrorNext<'_>) -> Result<Response>;
}

impl<F> ErrorMiddleware for F
where
    F: Fn(&mut RequestContext, Error, ErrorNext<'_>) -> Result<Response> + Send + Sync,
{
    fn handle(&self, ctx: &mut RequestContext, error: Error, next: ErrorNext<'_>) -> Result<Response> {
        self(ctx, error, next)
    }
}

pub struct ErrorNext<'a> {
    chain: &'a [Arc<dyn ErrorMiddleware>],
}

impl ErrorNext<'_> {
    pub fn run(self, ctx: &mut RequestContext, error: Error) -> Result<Response> {
        match self.chain.split_first() {
            Some((first, rest)) => first.handle(ctx, error, ErrorNext { chain: rest }),
            None => Err(error),
        }
    }
}

/// Global middleware per stage, plus named middleware routes can opt into
#[derive(Clone, Default)]
pub struct Pipeline {
    request_received: Vec<Arc<dyn Middleware>>,
    route_matched: Vec<Arc<dyn Middleware>>,
    route_not_matched: Vec<Arc<dyn Middleware>>,
    route_dispatched: Vec<Arc<dyn Middleware>>,
    throwable_caught: Vec<Arc<dyn ErrorMiddleware>>,
    terminated: Vec<Arc<dyn Middleware>>,
    named: HashMap<String, Arc<dyn Middleware>>,
    order: MiddlewareOrder,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn order(&mut self, order: MiddlewareOrder) -> &mut Self {
        self.order = order;
        self
    }

    pub fn request_received(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.request_received.push(Arc::new(middleware));
        self
    }

    pub fn route_matched(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.route_matched.push(Arc::new(middleware));
        self
    }

    pub fn route_not_matched(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.route_not_matched.push(Arc::new(middleware));
        self
    }

    pub fn route_dispatched(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.route_dispatched.push(Arc::new(middleware));
        self
    }

    pub fn throwable_caught(&mut self, middleware: impl ErrorMiddleware + 'static) -> &mut Self {
        self.throwable_caught.push(Arc::new(middleware));
        self
    }

    pub fn terminated(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.terminated.push(Arc::new(middleware));
        self
    }

    /// Register middleware a route can name; it runs in the route-matched
    /// stage of that route only
    pub fn register(&mut self, name: impl Into<String>, middleware: impl Middleware + 'static) -> &mut Self {
        self.named.insert(name.into(), Arc::new(middleware));
        self
    }

    fn chain(&self, stage: Stage) -> &[Arc<dyn Middleware>] {
        match stage {
            Stage::RequestReceived => &self.request_received,
            Stage::RouteMatched => &self.route_matched,
            Stage::RouteNotMatched => &self.route_not_matched,
            Stage::RouteDispatched => &self.route_dispatched,
            Stage::Terminated => &self.terminated,
            Stage::ThrowableCaught => &[],
        }
    }

    /// Named middleware a route asks for, in the route's order
    pub fn route_middleware(&self, route: &Route) -> Result<Vec<Arc<dyn Middleware>>> {
        route
            .middleware_names()
            .iter()
            .map(|name| {
                self.named
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::MiddlewareNotFound(format!("{name} (route {})", route.name())))
            })
            .collect()
    }

    /// Check every middleware name in a collection is registered
    pub fn verify(&self, routes: &RouteCollection) -> Result<()> {
        for route in routes.all() {
            self.route_middleware(route)?;
        }
        Ok(())
    }

    /// Run one stage. `route` units are merged with the stage's globals
    /// according to [`MiddlewareOrder`].
    pub fn run(
        &self,
        stage: Stage,
        ctx: &mut RequestContext,
        route: &[Arc<dyn Middleware>],
        terminal: &mut dyn FnMut(&mut RequestContext) -> Result<Response>,
    ) -> Result<Response> {
        let globals = self.chain(stage);
        let merged: Vec<Arc<dyn Middleware>>;
        let chain: &[Arc<dyn Middleware>] = if route.is_empty() {
            globals
        } else {
            merged = match self.order {
                MiddlewareOrder::GlobalFirst => globals.iter().chain(route).cloned().collect(),
                MiddlewareOrder::RouteFirst => route.iter().chain(globals).cloned().collect(),
            };
            &merged
        };

        trace!(stage = stage.as_str(), units = chain.len(), "Running middleware stage");
        Next { chain, terminal }.run(ctx)
    }

    /// Run the throwable-caught stage; unhandled errors come back as `Err`
    pub fn run_error(&self, ctx: &mut RequestContext, error: Error) -> Result<Response> {
        trace!(
            stage = Stage::ThrowableCaught.as_str(),
            units = self.throwable_caught.len(),
            "Running middleware stage"
        );
        ErrorNext {
            chain: &self.throwable_caught,
        }
        .run(ctx, error)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut named: Vec<&str> = self.named.keys().map(String::as_str).collect();
        named.sort_unstable();
        f.debug_struct("Pipeline")
            .field("request_received", &self.request_received.len())
            .field("route_matched", &self.route_matched.len())
            .field("route_not_matched", &self.route_not_matched.len())
            .field("route_dispatched", &self.route_dispatched.len())
            .field("throwable_caught", &self.throwable_caught.len())
            .field("terminated", &self.terminated.len())
            .field("named", &named)
            .field("order", &self.order)
            .finish()
    }
}
