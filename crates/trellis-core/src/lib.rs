//! trellis-core: request lifecycle for trellis
//!
//! Takes a request from arrival to response: route matching (via
//! trellis-router), a six-stage middleware pipeline, handler resolution
//! through a service container, and reply normalization.
//!
//! ## Example
//! ```
//! use trellis_core::{AppConfig, Application, Method, Request};
//! use trellis_router::Dispatch;
//!
//! let app = Application::builder(AppConfig::default())
//!     .services(|c| c.function("hello", |ctx| {
//!         Ok(format!("hello {}", ctx.request.param("name").unwrap_or("world")))
//!     }))
//!     .routes(|r| {
//!         r.get("/hello/{name:alpha}", Dispatch::function("hello")).name("hello");
//!     })
//!     .boot()
//!     .unwrap();
//!
//! let res = app.handle(Request::new(Method::Get, "/hello/ada"));
//! assert_eq!(res.body_string().unwrap(), "hello ada");
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod app;
pub mod config;
pub mod container;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod reply;
pub mod request;
pub mod response;
pub mod router;

// Re-exports
pub use app::{Application, ApplicationBuilder};
pub use config::{load_config, AppConfig, ConfigError};
pub use container::Container;
pub use context::{MatchState, Phase, RequestContext};
pub use dispatcher::{Controller, Dispatcher, HandlerFn, ResolvedHandler};
pub use error::{BoxError, Error, Result};
pub use reply::{Reply, View, ViewRenderer, VIEW_SERVICE};
pub use request::{Request, RequestBuilder};
pub use response::{Response, ResponseBuilder};
pub use router::Router;

// Middleware re-exports
pub use middleware::{ErrorMiddleware, ErrorNext, Middleware, MiddlewareOrder, Next, Pipeline, Stage};

pub use http::StatusCode;
pub use trellis_router::Method;
