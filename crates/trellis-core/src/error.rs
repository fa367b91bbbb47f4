//! Error types for trellis-core

use crate::config::ConfigError;
use http::StatusCode;
use thiserror::Error;
use trellis_router::RouteError;

/// Result type alias for trellis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error raised by application code
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error types for the trellis request lifecycle
#[derive(Debug, Error)]
pub enum Error {
    /// Route registration, cache or reverse-routing failure
    #[error(transparent)]
    Route(#[from] RouteError),

    /// No binding for a container key
    #[error("Service not registered: {0}")]
    ServiceNotFound(String),

    /// A shared service's factory asked for itself, directly or through
    /// other services
    #[error("Circular dependency while building service `{0}`")]
    ServiceCycle(String),

    /// Binding exists but holds a different type
    #[error("Service `{key}` is not a `{expected}`")]
    ServiceType { key: String, expected: &'static str },

    /// A dispatch descriptor points at nothing callable
    #[error("Handler not found: {0}")]
    HandlerNotFound(String),

    /// A route names middleware that was never registered
    #[error("Middleware not registered: {0}")]
    MiddlewareNotFound(String),

    /// Request could not be converted from the HTTP boundary
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Abort with an HTTP status (e.g. 403 from an auth check)
    #[error("{status}: {message}")]
    Http { status: StatusCode, message: String },

    /// View rendering failed
    #[error("View error: {0}")]
    View(String),

    /// Logging could not be initialized
    #[error("Logging error: {0}")]
    Logging(String),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Error raised by a handler or middleware
    #[error(transparent)]
    Handler(BoxError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Abort with a status and message
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Error::Http {
            status,
            message: message.into(),
        }
    }

    /// Wrap an application error
    pub fn handler(error: impl Into<BoxError>) -> Self {
        Error::Handler(error.into())
    }

    /// Status an error page should use for this error
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Http { status, .. } => *status,
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Borrow the wrapped application error as a concrete type
    pub fn downcast_ref<T: std::error::Error + 'static>(&self) -> Option<&T> {
        match self {
            Error::Handler(inner) => inner.downcast_ref::<T>(),
            _ => None,
        }
    }
}
