//! Application kernel
//!
//! Boots a [`Router`] from configuration: routes come from the route cache
//! when `routing.use_cache` is on, otherwise from registrations. Boot
//! verifies every handler and middleware name, so misconfiguration fails
//! at startup rather than on the first request.

use crate::config::AppConfig;
use crate::middleware::{ErrorRenderer, Pipeline};
use crate::{Container, Request, Response, Result, Router};
use std::path::Path;
use tracing::{debug, error, info};
use trellis_router::{RouteCollection, RouteManifest, Routes};

pub struct ApplicationBuilder {
    config: AppConfig,
    container: Container,
    pipeline: Pipeline,
    routes: Routes,
    manifests: Vec<RouteManifest>,
    error_pages: bool,
}

impl ApplicationBuilder {
    /// Use an existing container instead of a fresh one
    pub fn container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    /// Bind services and handlers
    pub fn services(self, register: impl FnOnce(&Container)) -> Self {
        register(&self.container);
        self
    }

    /// Configure middleware stages
    pub fn middleware(mut self, configure: impl FnOnce(&mut Pipeline)) -> Self {
        configure(&mut self.pipeline);
        self
    }

    /// Declare routes in code
    pub fn routes(mut self, declare: impl FnOnce(&mut Routes)) -> Self {
        declare(&mut self.routes);
        self
    }

    /// Declare routes from a manifest
    pub fn manifest(mut self, manifest: RouteManifest) -> Self {
        self.manifests.push(manifest);
        self
    }

    /// Skip the built-in [`ErrorRenderer`], so unhandled errors reach
    /// the caller of [`Router::dispatch`]
    pub fn without_error_pages(mut self) -> Self {
        self.error_pages = false;
        self
    }

    /// Compile routes, build the router and verify it
    pub fn boot(self) -> Result<Application> {
        let ApplicationBuilder {
            config,
            container,
            mut pipeline,
            routes,
            manifests,
            error_pages,
        } = self;

        let collection = if config.routing.use_cache {
            load_cached(&config.routing.cache_path, routes, manifests)?
        } else {
            compile(routes, manifests)?
        };

        pipeline.order(config.routing.middleware_order);
        if error_pages {
            pipeline.throwable_caught(ErrorRenderer::new(config.app.debug));
        }

        let router = Router::new(collection, pipeline, container)
            .options(config.routing.match_options());
        router.verify()?;

        info!(
            app = %config.app.name,
            routes = router.routes().len(),
            cached = config.routing.use_cache,
            "Application booted"
        );
        Ok(Application { config, router })
    }
}

fn compile(mut routes: Routes, manifests: Vec<RouteManifest>) -> Result<RouteCollection> {
    for manifest in &manifests {
        manifest.register(&mut routes)?;
    }
    Ok(routes.build()?)
}

/// A present cache is authoritative and must be valid; a missing one falls
/// back to registrations
fn load_cached(path: &Path, routes: Routes, manifests: Vec<RouteManifest>) -> Result<RouteCollection> {
    if path.exists() {
        debug!(path = %path.display(), "Loading route cache");
        return Ok(RouteCollection::load_cache(path)?);
    }
    info!(path = %path.display(), "No route cache found; compiling registered routes");
    compile(routes, manifests)
}

pub struct Application {
    config: AppConfig,
    router: Router,
}

impl Application {
    pub fn builder(config: AppConfig) -> ApplicationBuilder {
        ApplicationBuilder {
            config,
            container: Container::new(),
            pipeline: Pipeline::new(),
            routes: Routes::new(),
            manifests: Vec::new(),
            error_pages: true,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn container(&self) -> &Container {
        self.router.container()
    }

    /// Serve one request. Errors that escape every error middleware are
    /// logged and answered with a bare 500.
    pub fn handle(&self, request: Request) -> Response {
        let method = request.method;
        let path = request.path.clone();
        match self.router.dispatch(request) {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, %method, path = %path, "Unhandled error");
                Response::internal_error("Internal Server Error")
            }
        }
    }

    /// Serve an `http` crate request
    pub fn handle_http(&self, request: http::Request<bytes::Bytes>) -> http::Response<bytes::Bytes> {
        match Request::from_http(request) {
            Ok(request) => self.handle(request).into_http(),
            Err(err) => {
                debug!(error = %err, "Rejecting malformed request");
                Response::new(err.status()).into_http()
            }
        }
    }

    /// Write the current route collection to the configured cache path
    pub fn cache_routes(&self) -> Result<()> {
        let path = &self.config.routing.cache_path;
        self.router.routes().to_cacheable().write_to(path)?;
        Ok(())
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("config", &self.config)
            .field("router", &self.router)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use trellis_router::{Dispatch, Method};

    fn config(use_cache: bool, cache_path: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.routing.use_cache = use_cache;
        config.routing.cache_path = cache_path.to_path_buf();
        config
    }

    fn builder(config: AppConfig) -> ApplicationBuilder {
        Application::builder(config)
            .services(|c| c.function("home", |_| Ok("home")))
            .routes(|r| {
                r.get("/", Dispatch::function("home")).name("home");
            })
    }

    #[test]
    fn test_boot_from_registrations() {
        let dir = tempfile::tempdir().unwrap();
        let app = builder(config(false, &dir.path().join("routes.json"))).boot().unwrap();
        let res = app.handle(Request::new(Method::Get, "/"));
        assert_eq!(res.body_string().unwrap(), "home");
    }

    #[test]
    fn test_boot_fails_on_unresolvable_handler() {
        let err = Application::builder(AppConfig::default())
            .routes(|r| {
                r.get("/", Dispatch::method("Ghost", "boo"));
            })
            .boot()
            .unwrap_err();
        assert!(matches!(err, crate::Error::HandlerNotFound(_)));
    }

    #[test]
    fn test_cache_round_trip_and_corrupt_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/routes.json");

        // no cache yet: falls back to registrations
        let app = builder(config(true, &path)).boot().unwrap();
        app.cache_routes().unwrap();
        assert!(path.exists());

        // cache wins over registrations
        let cached = Application::builder(config(true, &path))
            .services(|c| c.function("home", |_| Ok("home")))
            .boot()
            .unwrap();
        assert!(cached.router().routes().has("home"));

        std::fs::write(&path, "{ not json").unwrap();
        let err = builder(config(true, &path)).boot().unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Route(trellis_router::RouteError::CorruptCache(_))
        ));
    }

    #[test]
    fn test_unhandled_error_becomes_bare_500() {
        #[derive(Debug)]
        struct Boom;
        impl std::fmt::Display for Boom {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("boom")
            }
        }
        impl std::error::Error for Boom {}

        let app = Application::builder(AppConfig::default())
            .services(|c| c.function("boom", |_| -> Result<String> { Err(crate::Error::handler(Boom)) }))
            .routes(|r| {
                r.get("/boom", Dispatch::function("boom"));
            })
            .without_error_pages()
            .boot()
            .unwrap();

        let res = app.handle(Request::new(Method::Get, "/boom"));
        assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body_string().unwrap(), "Internal Server Error");
    }

    #[test]
    fn test_handle_http() {
        let app = builder(AppConfig::default()).boot().unwrap();
        let req = http::Request::builder()
            .uri("/")
            .body(bytes::Bytes::new())
            .unwrap();
        let res = app.handle_http(req);
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(&res.body()[..], b"home");
    }
}
