//! Application configuration
//!
//! ```toml
//! [app]
//! name = "shop"
//! debug = false
//!
//! [routing]
//! trailing_slash = "strip"     # or "strict"
//! head_fallback = true
//! middleware_order = "global_first"
//! use_cache = true
//! cache_path = "bootstrap/cache/routes.json"
//!
//! [logging]
//! level = "info"
//! format = "compact"           # "pretty" | "compact" | "json"
//! ```
//!
//! Every section and key is optional.

use crate::logging::LogFormat;
use crate::middleware::MiddlewareOrder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use trellis_router::{MatchOptions, TrailingSlash};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub routing: RoutingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    /// Show error details in error pages
    pub debug: bool,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "trellis".to_string(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub trailing_slash: TrailingSlash,
    pub head_fallback: bool,
    pub middleware_order: MiddlewareOrder,
    /// Boot from the route cache instead of registrations
    pub use_cache: bool,
    pub cache_path: PathBuf,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            trailing_slash: TrailingSlash::Strip,
            head_fallback: true,
            middleware_order: MiddlewareOrder::GlobalFirst,
            use_cache: false,
            cache_path: PathBuf::from("bootstrap/cache/routes.json"),
        }
    }
}

impl RoutingConfig {
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            trailing_slash: self.trailing_slash,
            head_fallback: self.head_fallback,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl AppConfig {
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        if self.routing.use_cache && self.routing.cache_path.as_os_str().is_empty() {
            errors.push("routing.cache_path must be set when routing.use_cache is on".to_string());
        }
        if self.logging.level.trim().is_empty() {
            errors.push("logging.level must not be empty".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    AppConfig::from_toml(&content)
}
