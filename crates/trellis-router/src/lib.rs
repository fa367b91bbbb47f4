//! trellis-router: route compilation, collection and matching
//!
//! The routing half of trellis, used by trellis-core (request lifecycle) and
//! trellis-cli (route cache generation).
//!
//! ## Features
//! - Path templates compiled to anchored regexes: `/users/{id:num}`
//! - Constraint aliases (`num`, `alpha`, `alnum`, `slug`, `uuid`, `path`) and inline regex
//! - Optional trailing parameters: `/posts/{page?:num}`
//! - Per-method static buckets (O(1) lookup) and ordered dynamic buckets
//! - 404 / 405 distinction
//! - Reverse routing by name
//! - Cacheable, serde-serializable collection
//!
//! ## Priority
//! 1. Exact static match
//! 2. Dynamic routes in registration order (first match wins)
//!
//! ## Example
//! ```
//! use trellis_router::{Dispatch, Matcher, Routes};
//! use trellis_router::Method;
//!
//! let mut routes = Routes::new();
//! routes.get("/", Dispatch::closure("home")).name("home");
//! routes.get("/users/{id:num}", Dispatch::method("UserController", "show")).name("user.show");
//! let routes = routes.build().unwrap();
//!
//! let m = Matcher::new(&routes).match_route(Method::Get, "/users/7").into_match().unwrap();
//! assert_eq!(m.route.name(), "user.show");
//! assert_eq!(m.params.get("id"), Some("7"));
//! ```

pub mod cache;
pub mod collection;
pub mod dispatch;
pub mod error;
pub mod manifest;
pub mod matcher;
pub mod method;
pub mod pattern;
pub mod registrar;
pub mod route;

pub use cache::{CacheBlob, CachedRoute, CACHE_VERSION};
pub use collection::RouteCollection;
pub use dispatch::Dispatch;
pub use error::{Result, RouteError};
pub use manifest::{ManifestEntry, RouteManifest};
pub use matcher::{MatchOptions, MatchOutcome, Matcher, RouteMatch, TrailingSlash};
pub use method::Method;
pub use pattern::{compile, CompiledPath, ParamSpec};
pub use registrar::{Group, RouteDefinition, Routes};
pub use route::{Params, Route};
