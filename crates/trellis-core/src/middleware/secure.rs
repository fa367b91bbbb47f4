//! HTTPS enforcement for routes marked secure
//!
//! Runs in the route-matched stage. Plain-HTTP requests to a secure route
//! are redirected to the `https://` URL; secure responses can carry
//! `Strict-Transport-Security`.

use super::{Middleware, Next};
use crate::{Error, RequestContext, Response, Result};
use http::StatusCode;
use tracing::debug;

/// HSTS configuration
#[derive(Debug, Clone)]
pub struct HstsConfig {
    pub max_age: u64,
    pub include_subdomains: bool,
    pub preload: bool,
}

impl Default for HstsConfig {
    fn default() -> Self {
        Self {
            max_age: 31536000, // 1 year
            include_subdomains: true,
            preload: false,
        }
    }
}

impl HstsConfig {
    pub fn as_header_value(&self) -> String {
        let mut parts = vec![format!("max-age={}", self.max_age)];
        if self.include_subdomains {
            parts.push("includeSubDomains".to_string());
        }
        if self.preload {
            parts.push("preload".to_string());
        }
        parts.join("; ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct RequireHttps {
    hsts: Option<HstsConfig>,
}

impl RequireHttps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hsts(mut self, config: HstsConfig) -> Self {
        self.hsts = Some(config);
        self
    }
}

impl Middleware for RequireHttps {
    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<Response> {
        let secure_route = ctx.route().map(|r| r.is_secure()).unwrap_or(false);
        if !secure_route {
            return next.run(ctx);
        }

        if !ctx.request.is_secure() {
            let host = ctx
                .request
                .host()
                .ok_or_else(|| Error::http(StatusCode::FORBIDDEN, "HTTPS required"))?;
            let location = format!("https://{host}{}", ctx.request.path_and_query());
            debug!(location = %location, "Redirecting to HTTPS");
            return Ok(Response::redirect(&location, true));
        }

        let mut res = next.run(ctx)?;
        if let Some(hsts) = &self.hsts {
            res.set_header("strict-transport-security", hsts.as_header_value());
        }
        Ok(res)
    }
}
