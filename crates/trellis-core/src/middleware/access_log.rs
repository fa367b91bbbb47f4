//! Access logging
//!
//! Terminated-stage middleware emitting one `tracing` event per request
//! with the method, path, matched route, status and duration.

use super::{Middleware, Next};
use crate::{RequestContext, Response, Result};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLog;

impl Middleware for AccessLog {
    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<Response> {
        let status = ctx.response().map(|r| r.status.as_u16()).unwrap_or(0);
        let route = ctx.route().map(|r| r.name().to_string()).unwrap_or_default();
        let elapsed_ms = ctx.elapsed().as_secs_f64() * 1000.0;

        if status >= 500 {
            warn!(
                method = %ctx.request.method,
                path = %ctx.request.path,
                route = %route,
                status,
                elapsed_ms,
                "Request completed"
            );
        } else {
            info!(
                method = %ctx.request.method,
                path = %ctx.request.path,
                route = %route,
                status,
                elapsed_ms,
                "Request completed"
            );
        }
        next.run(ctx)
    }
}
