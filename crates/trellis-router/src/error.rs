//! Error types for trellis-router

use crate::Method;
use thiserror::Error;

/// Result type alias for routing operations
pub type Result<T> = std::result::Result<T, RouteError>;

/// Registration, reverse-routing and cache errors.
///
/// Every variant is raised while routes are being built or loaded, never
/// while a request is being matched.
#[derive(Debug, Error)]
pub enum RouteError {
    /// Malformed path template
    #[error("Invalid route path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Unknown HTTP method
    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Handler string that does not describe a dispatch target
    #[error("Invalid handler descriptor: {0:?}")]
    InvalidHandler(String),

    /// Route declared without any method
    #[error("Route `{0}` must answer to at least one HTTP method")]
    NoMethods(String),

    /// Route name is empty
    #[error("Route name must not be empty (path `{0}`)")]
    EmptyName(String),

    /// Two routes share a name
    #[error("Duplicate route name: {0}")]
    DuplicateRouteName(String),

    /// Two static routes share a method and path
    #[error("Duplicate route: {method} {path}")]
    DuplicateRoute { method: Method, path: String },

    /// Reverse lookup for a name that was never registered
    #[error("Route not defined: {0}")]
    UnknownRoute(String),

    /// A required parameter was not supplied to `url_for`
    #[error("Missing parameter `{param}` for route `{route}`")]
    MissingParameter { route: String, param: String },

    /// A supplied parameter does not satisfy its constraint
    #[error("Parameter `{param}` of route `{route}` does not match `{pattern}`: {value}")]
    ParameterMismatch {
        route: String,
        param: String,
        pattern: String,
        value: String,
    },

    /// Cache blob is structurally or semantically invalid
    #[error("Corrupt route cache: {0}")]
    CorruptCache(String),

    /// Cache blob / manifest (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Manifest TOML could not be parsed
    #[error("Manifest parse error: {0}")]
    Manifest(#[from] toml::de::Error),

    /// Reading or writing a cache / manifest file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RouteError {
    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        RouteError::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
