//! Bodies for 404 and 405 responses

use super::{Middleware, Next};
use crate::{RequestContext, Response, Result};
use serde_json::json;

/// Route-not-matched middleware that fills the bare 404/405 with a body:
/// JSON when the client asks for it, plain text otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotMatchedResponder;

impl Middleware for NotMatchedResponder {
    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<Response> {
        let mut res = next.run(ctx)?;
        if !res.body.is_empty() {
            return Ok(res);
        }

        let reason = res.status.canonical_reason().unwrap_or("Error");

        if ctx.request.accepts_json() {
            let allowed: Vec<&str> = ctx.allowed_methods().iter().map(|m| m.as_str()).collect();
            let mut body = json!({ "status": res.status.as_u16(), "error": reason });
            if !allowed.is_empty() {
                body["allowed"] = json!(allowed);
            }
            res.set_header("content-type", "application/json");
            res.body = body.to_string().into();
        } else {
            res.set_header("content-type", "text/plain; charset=utf-8");
            res.body = reason.to_string().into();
        }
        Ok(res)
    }
}
