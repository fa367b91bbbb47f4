//! Declarative route manifests
//!
//! A manifest lists routes as data so they can be compiled and cached
//! without running application code:
//!
//! ```toml
//! [[routes]]
//! name = "user.show"
//! methods = ["GET"]
//! path = "/users/{id:num}"
//! handler = "UserController@show"
//! middleware = ["auth"]
//! ```

use crate::{Dispatch, Method, Result, RouteCollection, Routes};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One route record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Omitted names default to `METHODS path`
    #[serde(default)]
    pub name: Option<String>,
    #[serde(alias = "method")]
    pub methods: Vec<Method>,
    pub path: String,
    /// Handler in [`Dispatch`] string form
    pub handler: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub middleware: Vec<String>,
}

/// A list of routes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteManifest {
    #[serde(default)]
    pub routes: Vec<ManifestEntry>,
}

impl RouteManifest {
    pub fn from_toml(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Load a manifest, choosing the format from the file extension
    /// (`.json` is JSON, anything else TOML)
    pub fn from_path(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&source),
            _ => Self::from_toml(&source),
        }
    }

    /// Register every entry on a [`Routes`] registrar
    pub fn register(&self, routes: &mut Routes) -> Result<()> {
        for entry in &self.routes {
            let handler: Dispatch = entry.handler.parse()?;
            let definition = routes.add(entry.methods.iter().copied(), &entry.path, handler);
            if let Some(name) = &entry.name {
                definition.name(name.as_str());
            }
            if entry.secure {
                definition.secure();
            }
            for middleware in &entry.middleware {
                definition.middleware(middleware.as_str());
            }
        }
        Ok(())
    }

    /// Compile the manifest into a collection
    pub fn into_collection(self) -> Result<RouteCollection> {
        let mut routes = Routes::new();
        self.register(&mut routes)?;
        routes.build()
    }
}
