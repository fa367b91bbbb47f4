//! Maintenance mode
//!
//! Answers every request with 503 while active, except for allow-listed
//! paths (health checks, status pages). Clones share the same switch, so
//! the application can flip it at runtime.

use super::{Middleware, Next};
use crate::{RequestContext, Response, ResponseBuilder, Result};
use http::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct MaintenanceMode {
    active: Arc<AtomicBool>,
    retry_after: Option<u64>,
    allow: Vec<String>,
}

impl MaintenanceMode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds sent in `Retry-After`
    pub fn retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Keep serving this path, and everything below it, while down
    pub fn allow(mut self, path: impl Into<String>) -> Self {
        self.allow.push(path.into());
        self
    }

    pub fn enable(&self) {
        self.active.store(true, Ordering::SeqCst);
        info!("Maintenance mode enabled");
    }

    pub fn disable(&self) {
        self.active.store(false, Ordering::SeqCst);
        info!("Maintenance mode disabled");
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    // Prefixes match whole segments: `/health` covers `/health/db`, not `/healthz`
    fn is_allowed(&self, path: &str) -> bool {
        self.allow.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            prefix.is_empty()
                || path == prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

impl Middleware for MaintenanceMode {
    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<Response> {
        if !self.is_active() || self.is_allowed(&ctx.request.path) {
            return next.run(ctx);
        }

        let mut res = ResponseBuilder::new(StatusCode::SERVICE_UNAVAILABLE)
            .header("content-type", "text/plain")
            .body("Service Unavailable")
            .build();
        if let Some(seconds) = self.retry_after {
            res.set_header("retry-after", seconds.to_string());
        }
        Ok(res)
    }
}
