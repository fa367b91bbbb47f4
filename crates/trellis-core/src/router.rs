//! Request lifecycle orchestration
//!
//! Drives one request through matching, the six middleware stages and the
//! handler:
//!
//! ```text
//! Received -> Matching -> Matched -> Dispatching -> Dispatched -> Terminated
//!                      \-> NotMatched ----------------------------/
//!   any error from the stages above -> ThrowableCaught -> Terminated | Err
//! ```
//!
//! The route collection sits behind an [`ArcSwap`]; every request works on
//! the snapshot it loaded first, so [`Router::replace_routes`] never tears a
//! request in flight.

use crate::context::Phase;
use crate::middleware::{Pipeline, Stage};
use crate::{Container, Dispatcher, RequestContext, Response, Result};
use crate::{Error, Request};
use arc_swap::ArcSwap;
use http::StatusCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use trellis_router::{MatchOptions, MatchOutcome, Matcher, Method, Route, RouteCollection};

pub struct Router {
    routes: ArcSwap<RouteCollection>,
    pipeline: Pipeline,
    dispatcher: Dispatcher,
    options: MatchOptions,
    match_attempts: AtomicU64,
}

impl Router {
    pub fn new(routes: RouteCollection, pipeline: Pipeline, container: Container) -> Self {
        Self {
            routes: ArcSwap::from_pointee(routes),
            pipeline,
            dispatcher: Dispatcher::new(container),
            options: MatchOptions::default(),
            match_attempts: AtomicU64::new(0),
        }
    }

    pub fn options(mut self, options: MatchOptions) -> Self {
        self.options = options;
        self
    }

    /// Current route collection snapshot
    pub fn routes(&self) -> Arc<RouteCollection> {
        self.routes.load_full()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn container(&self) -> &Container {
        self.dispatcher.container()
    }

    /// Number of times matching has run
    pub fn match_count(&self) -> u64 {
        self.match_attempts.load(Ordering::Relaxed)
    }

    /// Check that every route's handler resolves and every middleware name
    /// is registered
    pub fn verify(&self) -> Result<()> {
        self.verify_collection(&self.routes.load())
    }

    fn verify_collection(&self, routes: &RouteCollection) -> Result<()> {
        self.pipeline.verify(routes)?;
        for route in routes.all() {
            self.dispatcher.resolve(route.handler()).map_err(|err| {
                warn!(route = route.name(), handler = %route.handler(), "Unresolvable handler");
                err
            })?;
        }
        Ok(())
    }

    /// Verify and atomically install a new collection. Requests already
    /// running finish against the old one.
    pub fn replace_routes(&self, routes: RouteCollection) -> Result<()> {
        self.verify_collection(&routes)?;
        let count = routes.len();
        self.routes.store(Arc::new(routes));
        info!(routes = count, "Route collection replaced");
        Ok(())
    }

    /// URL for a named route in the current collection
    pub fn url_for<'a>(
        &self,
        name: &str,
        params: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<String> {
        Ok(self.routes.load().url_for(name, params)?)
    }

    /// Run a request through the full lifecycle.
    ///
    /// Errors not handled by throwable-caught middleware are returned
    /// unchanged; the terminated stage does not run for them.
    pub fn dispatch(&self, request: Request) -> Result<Response> {
        let routes = self.routes.load_full();
        let mut ctx = RequestContext::new(request);

        let result = self.pipeline.run(Stage::RequestReceived, &mut ctx, &[], &mut |ctx| {
            self.route(&routes, ctx)
        });

        let response = match result {
            Ok(response) => response,
            Err(err) => {
                ctx.enter(Phase::ThrowableCaught);
                debug!(error = %err, "Error raised during request");
                self.pipeline.run_error(&mut ctx, err)?
            }
        };

        self.terminate(&mut ctx, response)
    }

    fn route(&self, routes: &RouteCollection, ctx: &mut RequestContext) -> Result<Response> {
        ctx.enter(Phase::Matching);
        self.match_attempts.fetch_add(1, Ordering::Relaxed);
        let outcome = Matcher::new(routes)
            .options(self.options)
            .match_route(ctx.request.method, &ctx.request.path);

        match outcome {
            MatchOutcome::Matched(matched) => {
                let route = Arc::clone(&matched.route);
                ctx.record_match(MatchOutcome::Matched(matched));
                ctx.enter(Phase::Matched);
                debug!(route = route.name(), "Route matched");

                let route_middleware = self.pipeline.route_middleware(&route)?;
                self.pipeline.run(Stage::RouteMatched, ctx, &route_middleware, &mut |ctx| {
                    self.dispatch_route(&route, ctx)
                })
            }
            outcome => {
                ctx.record_match(outcome);
                ctx.enter(Phase::NotMatched);
                self.pipeline
                    .run(Stage::RouteNotMatched, ctx, &[], &mut |ctx| Ok(not_matched(ctx)))
            }
        }
    }

    fn dispatch_route(&self, route: &Route, ctx: &mut RequestContext) -> Result<Response> {
        let handler = self.dispatcher.resolve(route.handler())?;
        ctx.enter(Phase::Dispatching);

        let mut handler = Some(handler);
        let response = self.pipeline.run(Stage::RouteDispatched, ctx, &[], &mut |ctx| {
            let handler = handler
                .take()
                .ok_or_else(|| Error::HandlerNotFound(route.handler().to_string()))?;
            let mut response = handler.invoke(ctx)?.into_response(self.container())?;
            if ctx.request.method == Method::Head {
                response.body = Default::default();
            }
            Ok(response)
        })?;

        ctx.enter(Phase::Dispatched);
        Ok(response)
    }

    fn terminate(&self, ctx: &mut RequestContext, response: Response) -> Result<Response> {
        ctx.enter(Phase::Terminated);
        ctx.set_response(response.clone());
        if let Err(err) = self.pipeline.run(Stage::Terminated, ctx, &[], &mut |ctx| {
            Ok(ctx.response().cloned().unwrap_or_default())
        }) {
            warn!(error = %err, "Terminate middleware failed");
        }
        Ok(response)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.load().len())
            .field("pipeline", &self.pipeline)
            .field("options", &self.options)
            .finish()
    }
}

/// Bare 404, or 405 with an `Allow` header
fn not_matched(ctx: &RequestContext) -> Response {
    let allowed = ctx.allowed_methods();
    if allowed.is_empty() {
        return Response::new(StatusCode::NOT_FOUND);
    }
    let mut res = Response::new(StatusCode::METHOD_NOT_ALLOWED);
    let allow: Vec<&str> = allowed.iter().map(Method::as_str).collect();
    res.set_header("allow", allow.join(", "));
    res
}
