//! Handler return values and their normalization into responses

use crate::{Container, Error, Response, Result};
use serde::Serialize;
use serde_json::Value;

/// Container key the view renderer is bound under
pub const VIEW_SERVICE: &str = "view";

/// A template name plus the data to render it with
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    pub template: String,
    pub data: Value,
}

impl View {
    pub fn new(template: impl Into<String>, data: Value) -> Self {
        Self {
            template: template.into(),
            data,
        }
    }
}

/// Renders [`View`]s to HTML
pub trait ViewRenderer: Send + Sync {
    fn render(&self, view: &View) -> Result<String>;
}

/// What a handler may return
#[derive(Debug, Clone)]
pub enum Reply {
    /// 204 No Content
    Empty,
    Text(String),
    Html(String),
    Json(Value),
    View(View),
    Response(Response),
}

impl Reply {
    /// Serialize any value as a JSON reply
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Reply::Json)
            .map_err(Error::handler)
    }

    /// Normalize into a response; views are rendered through the
    /// container's [`VIEW_SERVICE`] binding
    pub fn into_response(self, container: &Container) -> Result<Response> {
        Ok(match self {
            Reply::Empty => Response::new(http::StatusCode::NO_CONTENT),
            Reply::Text(body) => Response::text(body),
            Reply::Html(body) => Response::html(body),
            Reply::Json(value) => Response::json(value.to_string()),
            Reply::View(view) => {
                let renderer = container.views()?;
                Response::html(renderer.render(&view)?)
            }
            Reply::Response(response) => response,
        })
    }
}

impl From<&str> for Reply {
    fn from(body: &str) -> Self {
        Reply::Text(body.to_string())
    }
}

impl From<String> for Reply {
    fn from(body: String) -> Self {
        Reply::Text(body)
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Json(value)
    }
}

impl From<View> for Reply {
    fn from(view: View) -> Self {
        Reply::View(view)
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Response(response)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}
