//! Trailing slash redirect
//!
//! Pairs with [`TrailingSlash::Strict`](trellis_router::TrailingSlash)
//! matching: `/users/` is answered with a permanent redirect to `/users`
//! before routing runs.

use super::{Middleware, Next};
use crate::{RequestContext, Response, Result};

/// Request-received middleware redirecting `/path/` to `/path`
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectTrailingSlash;

impl Middleware for RedirectTrailingSlash {
    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<Response> {
        let path = &ctx.request.path;
        if path.len() > 1 && path.ends_with('/') {
            let trimmed = path.trim_end_matches('/');
            let target = if trimmed.is_empty() { "/" } else { trimmed };
            let location = match &ctx.request.query {
                Some(query) => format!("{target}?{query}"),
                None => target.to_string(),
            };
            return Ok(Response::redirect(&location, true));
        }
        next.run(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{Pipeline, Stage};
    use crate::RequestBuilder;
    use http::StatusCode;
    use trellis_router::Method;

    fn run(path: &str, query: Option<&str>) -> Response {
        let mut pipeline = Pipeline::new();
        pipeline.request_received(RedirectTrailingSlash);
        let mut request = RequestBuilder::new(Method::Post, path);
        if let Some(query) = query {
            request = request.query(query);
        }
        let mut ctx = RequestContext::new(request.build());
        pipeline
            .run(Stage::RequestReceived, &mut ctx, &[], &mut |_| Ok(Response::text("routed")))
            .unwrap()
    }

    #[test]
    fn test_redirects_trailing_slash() {
        let res = run("/users/", Some("page=2"));
        assert_eq!(res.status, StatusCode::PERMANENT_REDIRECT);
        assert_eq!(res.header("location"), Some("/users?page=2"));

        let res = run("//", None);
        assert_eq!(res.header("location"), Some("/"));
    }

    #[test]
    fn test_passes_clean_paths() {
        assert_eq!(run("/", None).body_string().unwrap(), "routed");
        assert_eq!(run("/users", None).body_string().unwrap(), "routed");
    }
}
