//! End-to-end request lifecycle tests

use serde_json::json;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use trellis_core::middleware::{
    AccessLog, MaintenanceMode, NotMatchedResponder, RedirectTrailingSlash, RequireHttps,
};
use trellis_core::{
    AppConfig, Application, Container, Controller, Error, ErrorNext, MatchState, Method, Next,
    Pipeline, Reply, Request, RequestBuilder, RequestContext, Response, Result, Router,
    StatusCode, View, ViewRenderer,
};
use trellis_router::{Dispatch, Group, RouteCollection, RouteManifest, Routes, TrailingSlash};

/// Records which route matched and its params
fn spy() -> (Arc<Mutex<Vec<String>>>, impl Fn(&mut RequestContext, Next<'_>) -> Result<Response>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let unit = move |ctx: &mut RequestContext, next: Next<'_>| -> Result<Response> {
        let entry = match ctx.match_state() {
            MatchState::Matched(route) => {
                let params: Vec<String> = ctx.request.params.iter().map(|(k, v)| format!("{k}={v}")).collect();
                format!("{} [{}]", route.name(), params.join(","))
            }
            MatchState::MethodNotAllowed(_) => "method-not-allowed".to_string(),
            MatchState::NotFound => "not-found".to_string(),
            MatchState::Pending => "pending".to_string(),
        };
        log.lock().unwrap().push(entry);
        next.run(ctx)
    };
    (seen, unit)
}

fn container() -> Container {
    let container = Container::new();
    container.closure("home", |_| Ok("home"));
    container.controller("UserController", |_| Ok(UserController));
    container
}

struct UserController;

impl Controller for UserController {
    fn actions(&self) -> &[&'static str] {
        &["show"]
    }

    fn call(&self, _action: &str, ctx: &mut RequestContext) -> Result<Reply> {
        let id = ctx.request.param("id").unwrap_or_default();
        Ok(json!({ "id": id }).into())
    }
}

fn routes() -> RouteCollection {
    let mut routes = Routes::new();
    routes.get("/", Dispatch::closure("home")).name("home");
    routes
        .get("/users/{id:num}", Dispatch::method("UserController", "show"))
        .name("user.show");
    routes.build().unwrap()
}

#[test]
fn test_home_user_show_and_not_matched() {
    let (seen, unit) = spy();
    let mut pipeline = Pipeline::new();
    pipeline.route_matched(unit);
    let (missed, miss_unit) = spy();
    pipeline.route_not_matched(miss_unit);
    let router = Router::new(routes(), pipeline, container());

    let res = router.dispatch(Request::new(Method::Get, "/")).unwrap();
    assert_eq!(res.body_string().unwrap(), "home");

    let res = router.dispatch(Request::new(Method::Get, "/users/7")).unwrap();
    assert_eq!(res.body_string().unwrap(), r#"{"id":"7"}"#);

    assert_eq!(*seen.lock().unwrap(), ["home []", "user.show [id=7]"]);

    let wrong_method = router.dispatch(Request::new(Method::Post, "/users/7")).unwrap();
    let wrong_path = router.dispatch(Request::new(Method::Get, "/nonexistent")).unwrap();
    assert_eq!(wrong_method.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(wrong_path.status, StatusCode::NOT_FOUND);
    assert_eq!(*missed.lock().unwrap(), ["method-not-allowed", "not-found"]);
}

#[test]
fn test_request_received_short_circuit_skips_matching() {
    let mut pipeline = Pipeline::new();
    pipeline.request_received(|_: &mut RequestContext, _: Next<'_>| -> Result<Response> {
        Ok(Response::text("cached"))
    });
    let router = Router::new(routes(), pipeline, container());

    let res = router.dispatch(Request::new(Method::Get, "/users/7")).unwrap();
    assert_eq!(res.body_string().unwrap(), "cached");
    assert_eq!(router.match_count(), 0);
}

#[derive(Debug, PartialEq)]
struct PaymentDeclined {
    code: u32,
}

impl fmt::Display for PaymentDeclined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "payment declined ({})", self.code)
    }
}

impl std::error::Error for PaymentDeclined {}

#[test]
fn test_unhandled_error_propagates_unchanged() {
    let container = container();
    container.function("pay", |_| -> Result<Reply> {
        Err(Error::handler(PaymentDeclined { code: 51 }))
    });
    let mut routes = Routes::new();
    routes.post("/pay", Dispatch::function("pay"));

    let terminated = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&terminated);
    let mut pipeline = Pipeline::new();
    pipeline.terminated(move |ctx: &mut RequestContext, next: Next<'_>| -> Result<Response> {
        counter.fetch_add(1, Ordering::SeqCst);
        next.run(ctx)
    });
    let router = Router::new(routes.build().unwrap(), pipeline, container);

    let err = router.dispatch(Request::new(Method::Post, "/pay")).unwrap_err();
    assert_eq!(err.downcast_ref::<PaymentDeclined>(), Some(&PaymentDeclined { code: 51 }));
    assert_eq!(terminated.load(Ordering::SeqCst), 0);
}

#[test]
fn test_handled_error_still_terminates() {
    let container = container();
    container.function("pay", |_| -> Result<Reply> {
        Err(Error::handler(PaymentDeclined { code: 51 }))
    });
    let mut routes = Routes::new();
    routes.post("/pay", Dispatch::function("pay"));

    let terminated = Arc::new(Mutex::new(None));
    let last = Arc::clone(&terminated);
    let mut pipeline = Pipeline::new();
    pipeline
        .throwable_caught(
            |ctx: &mut RequestContext, err: Error, next: ErrorNext<'_>| -> Result<Response> {
                match err.downcast_ref::<PaymentDeclined>() {
                    Some(declined) => Ok(Response::text(declined.to_string())),
                    None => next.run(ctx, err),
                }
            },
        )
        .terminated(move |ctx: &mut RequestContext, next: Next<'_>| -> Result<Response> {
            *last.lock().unwrap() = ctx.response().map(|r| r.status);
            next.run(ctx)
        });
    let router = Router::new(routes.build().unwrap(), pipeline, container);

    let res = router.dispatch(Request::new(Method::Post, "/pay")).unwrap();
    assert_eq!(res.body_string().unwrap(), "payment declined (51)");
    assert_eq!(*terminated.lock().unwrap(), Some(StatusCode::OK));
}

#[test]
fn test_route_middleware_can_abort() {
    let mut routes = Routes::new();
    routes.group(Group::new().prefix("/admin").name("admin.").middleware("auth"), |admin| {
        admin.get("/", Dispatch::closure("home")).name("home");
    });
    routes.get("/", Dispatch::closure("home")).name("home");

    let mut pipeline = Pipeline::new();
    pipeline.register("auth", |ctx: &mut RequestContext, next: Next<'_>| {
        match ctx.request.header("authorization") {
            Some("Bearer letmein") => next.run(ctx),
            _ => Err(Error::http(StatusCode::UNAUTHORIZED, "login required")),
        }
    });
    pipeline.throwable_caught(trellis_core::middleware::ErrorRenderer::new(false));
    let router = Router::new(routes.build().unwrap(), pipeline, container());

    let denied = router.dispatch(Request::new(Method::Get, "/admin")).unwrap();
    assert_eq!(denied.status, StatusCode::UNAUTHORIZED);

    let allowed = router
        .dispatch(
            RequestBuilder::new(Method::Get, "/admin")
                .header("Authorization", "Bearer letmein")
                .build(),
        )
        .unwrap();
    assert_eq!(allowed.body_string().unwrap(), "home");

    let open = router.dispatch(Request::new(Method::Get, "/")).unwrap();
    assert_eq!(open.body_string().unwrap(), "home");
}

#[test]
fn test_strict_trailing_slash_with_redirect() {
    let mut pipeline = Pipeline::new();
    pipeline.request_received(RedirectTrailingSlash);
    let router = Router::new(routes(), pipeline, container()).options(trellis_router::MatchOptions {
        trailing_slash: TrailingSlash::Strict,
        head_fallback: true,
    });

    let res = router.dispatch(Request::new(Method::Get, "/users/7/")).unwrap();
    assert_eq!(res.status, StatusCode::PERMANENT_REDIRECT);
    assert_eq!(res.header("location"), Some("/users/7"));
    assert_eq!(router.match_count(), 0);
}

#[test]
fn test_views_render_through_container() {
    struct Upper;
    impl ViewRenderer for Upper {
        fn render(&self, view: &View) -> Result<String> {
            Ok(format!("{}:{}", view.template, view.data["title"]).to_uppercase())
        }
    }

    let container = container();
    container.views_with(Upper);
    container.function("page", |_| Ok(View::new("page", json!({ "title": "about" }))));
    let mut routes = Routes::new();
    routes.get("/about", Dispatch::function("page"));
    let router = Router::new(routes.build().unwrap(), Pipeline::new(), container);

    let res = router.dispatch(Request::new(Method::Get, "/about")).unwrap();
    assert_eq!(res.body_string().unwrap(), "PAGE:\"ABOUT\"");
    assert_eq!(res.content_type(), Some("text/html; charset=utf-8"));
}

#[test]
fn test_application_with_built_in_middleware() {
    let manifest = RouteManifest::from_toml(
        r#"
        [[routes]]
        name = "home"
        methods = ["GET"]
        path = "/"
        handler = "closure:home"

        [[routes]]
        name = "account"
        methods = ["GET"]
        path = "/account"
        handler = "closure:home"
        secure = true
        "#,
    )
    .unwrap();

    let maintenance = MaintenanceMode::new().allow("/");
    let switch = maintenance.clone();
    let app = Application::builder(AppConfig::default())
        .container(container())
        .manifest(manifest)
        .middleware(|p| {
            p.request_received(maintenance)
                .route_matched(RequireHttps::new())
                .route_not_matched(NotMatchedResponder)
                .terminated(AccessLog);
        })
        .boot()
        .unwrap();

    let res = app.handle(
        RequestBuilder::new(Method::Get, "/account")
            .header("Host", "shop.test")
            .build(),
    );
    assert_eq!(res.header("location"), Some("https://shop.test/account"));

    let res = app.handle(
        RequestBuilder::new(Method::Get, "/missing")
            .header("Accept", "application/json")
            .build(),
    );
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.content_type(), Some("application/json"));

    switch.enable();
    let res = app.handle(Request::new(Method::Get, "/account"));
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(app.handle(Request::new(Method::Get, "/")).status, StatusCode::OK);
}

#[test]
fn test_cached_collection_dispatches_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("routes.json");
    routes().to_cacheable().write_to(&path).unwrap();

    let live = Router::new(routes(), Pipeline::new(), container());
    let cached = Router::new(RouteCollection::load_cache(&path).unwrap(), Pipeline::new(), container());
    cached.verify().unwrap();

    for (method, path) in [
        (Method::Get, "/"),
        (Method::Get, "/users/12"),
        (Method::Get, "/users/abc"),
        (Method::Delete, "/users/12"),
        (Method::Head, "/"),
    ] {
        let a = live.dispatch(Request::new(method, path)).unwrap();
        let b = cached.dispatch(Request::new(method, path)).unwrap();
        assert_eq!(a.status, b.status, "{method} {path}");
        assert_eq!(a.body, b.body, "{method} {path}");
    }
}

#[test]
fn test_concurrent_dispatch_during_route_swap() {
    let router = Arc::new(Router::new(routes(), Pipeline::new(), container()));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let router = Arc::clone(&router);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let res = router.dispatch(Request::new(Method::Get, "/")).unwrap();
                    assert_eq!(res.status, StatusCode::OK);
                }
            })
        })
        .collect();

    for _ in 0..20 {
        router.replace_routes(routes()).unwrap();
    }
    for handle in handles {
        handle.join().unwrap();
    }
}
