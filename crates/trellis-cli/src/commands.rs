//! Command implementations, kept apart from argument parsing for testing

use serde_json::json;
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;
use trellis_core::Result;
use trellis_router::{RouteCollection, RouteManifest};

/// Where `routes:list` reads routes from
#[derive(Debug, Clone)]
pub enum Source {
    Manifest(PathBuf),
    Cache(PathBuf),
}

/// Compile a manifest and write its cache; returns the route count
pub fn cache(manifest: &Path, output: &Path) -> Result<usize> {
    let routes = RouteManifest::from_path(manifest)?.into_collection()?;
    routes.to_cacheable().write_to(output)?;
    info!(manifest = %manifest.display(), output = %output.display(), routes = routes.len(), "Route cache generated");
    Ok(routes.len())
}

/// Remove a cache file; `false` when there was nothing to remove
pub fn clear(output: &Path) -> Result<bool> {
    match fs::remove_file(output) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Render the routes of a manifest or cache as a table or JSON
pub fn list(source: &Source, as_json: bool) -> Result<String> {
    let routes = match source {
        Source::Manifest(path) => RouteManifest::from_path(path)?.into_collection()?,
        Source::Cache(path) => RouteCollection::load_cache(path)?,
    };
    Ok(if as_json { render_json(&routes) } else { render_table(&routes) })
}

fn render_json(routes: &RouteCollection) -> String {
    let rows: Vec<_> = routes
        .all()
        .iter()
        .map(|route| {
            json!({
                "name": route.name(),
                "methods": route.methods().iter().map(|m| m.as_str()).collect::<Vec<_>>(),
                "path": route.path(),
                "handler": route.handler().to_string(),
                "secure": route.is_secure(),
                "middleware": route.middleware_names(),
            })
        })
        .collect();
    let mut out = serde_json::Value::from(rows).to_string();
    out.push('\n');
    out
}

fn render_table(routes: &RouteCollection) -> String {
    let rows: Vec<[String; 5]> = routes
        .all()
        .iter()
        .map(|route| {
            let methods: Vec<&str> = route.methods().iter().map(|m| m.as_str()).collect();
            [
                methods.join("|"),
                route.path().to_string(),
                route.name().to_string(),
                route.handler().to_string(),
                route.middleware_names().join(","),
            ]
        })
        .collect();

    let header = ["METHOD", "PATH", "NAME", "HANDLER", "MIDDLEWARE"];
    let mut widths = header.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let mut line = |cells: [&str; 5]| {
        let mut text = String::new();
        for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
            if i > 0 {
                text.push_str("  ");
            }
            let _ = write!(text, "{cell:<width$}");
        }
        out.push_str(text.trim_end());
        out.push('\n');
    };
    line(header);
    for row in &rows {
        line([&row[0], &row[1], &row[2], &row[3], &row[4]]);
    }
    out
}
