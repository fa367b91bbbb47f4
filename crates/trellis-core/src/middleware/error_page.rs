//! Error pages
//!
//! Throwable-caught middleware that converts any error into a response with
//! the error's status. With `debug` on, the error message is shown;
//! otherwise only the reason phrase.

use super::{ErrorMiddleware, ErrorNext};
use crate::{Error, RequestContext, Response, ResponseBuilder, Result};
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorRenderer {
    debug: bool,
}

impl ErrorRenderer {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl ErrorMiddleware for ErrorRenderer {
    fn handle(&self, ctx: &mut RequestContext, err: Error, _next: ErrorNext<'_>) -> Result<Response> {
        let status = err.status();
        if status.is_server_error() {
            error!(error = %err, path = %ctx.request.path, "Request failed");
        } else {
            warn!(error = %err, status = status.as_u16(), path = %ctx.request.path, "Request aborted");
        }

        let reason = status.canonical_reason().unwrap_or("Error");
        let message = if self.debug { err.to_string() } else { reason.to_string() };

        let res = if ctx.request.accepts_json() {
            ResponseBuilder::new(status)
                .header("content-type", "application/json")
                .body(json!({ "status": status.as_u16(), "error": message }).to_string())
                .build()
        } else {
            ResponseBuilder::new(status)
                .header("content-type", "text/plain; charset=utf-8")
                .body(message)
                .build()
        };
        Ok(res)
    }
}
