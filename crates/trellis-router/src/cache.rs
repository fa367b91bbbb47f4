//! Route cache: a flat, serializable form of a [`RouteCollection`]
//!
//! The blob stores every route's raw fields, including the generated regex
//! source, and the three indices as positions into the route list. Loading
//! it skips path compilation entirely. A blob that fails any consistency
//! check is rejected; there is no fallback to live registration.

use crate::pattern::{self, ParamSpec};
use crate::{Dispatch, Method, Result, Route, RouteCollection, RouteError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Bumped whenever the blob layout changes
pub const CACHE_VERSION: u32 = 1;

/// One route, as plain data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRoute {
    pub name: String,
    pub path: String,
    pub methods: Vec<Method>,
    pub parameters: Vec<ParamSpec>,
    /// Generated regex source, absent for static routes
    pub regex: Option<String>,
    pub handler: Dispatch,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub middleware: Vec<String>,
}

/// Serialization-ready route collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheBlob {
    pub version: u32,
    pub routes: Vec<CachedRoute>,
    #[serde(rename = "static")]
    pub static_index: BTreeMap<Method, BTreeMap<String, usize>>,
    pub dynamic: BTreeMap<Method, Vec<usize>>,
    pub named: BTreeMap<String, usize>,
}

impl CacheBlob {
    /// Write the blob as JSON, replacing any existing file atomically
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        info!(path = %path.display(), routes = self.routes.len(), "Route cache written");
        Ok(())
    }

    /// Read a blob; undecodable content is reported as a corrupt cache
    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(|e| RouteError::CorruptCache(e.to_string()))
    }
}

impl RouteCollection {
    /// Flatten into a cache blob
    pub fn to_cacheable(&self) -> CacheBlob {
        let positions: HashMap<*const Route, usize> = self
            .all()
            .iter()
            .enumerate()
            .map(|(i, r)| (Arc::as_ptr(r), i))
            .collect();
        let position = |route: &Arc<Route>| positions[&Arc::as_ptr(route)];

        let mut static_index: BTreeMap<Method, BTreeMap<String, usize>> = BTreeMap::new();
        let mut dynamic: BTreeMap<Method, Vec<usize>> = BTreeMap::new();
        for method in Method::ALL {
            for route in self
                .all()
                .iter()
                .filter(|r| !r.is_dynamic() && r.answers_to(method))
            {
                static_index
                    .entry(method)
                    .or_default()
                    .insert(route.path().to_string(), position(route));
            }
            let bucket = self.dynamic_routes(method);
            if !bucket.is_empty() {
                dynamic.insert(method, bucket.iter().map(position).collect());
            }
        }

        CacheBlob {
            version: CACHE_VERSION,
            routes: self.all().iter().map(|r| cached_route(r)).collect(),
            static_index,
            dynamic,
            named: self
                .all()
                .iter()
                .map(|r| (r.name().to_string(), position(r)))
                .collect(),
        }
    }

    /// Rebuild a collection from a cache blob without compiling any path
    pub fn from_cacheable(blob: CacheBlob) -> Result<Self> {
        if blob.version != CACHE_VERSION {
            return Err(RouteError::CorruptCache(format!(
                "unsupported cache version {} (expected {CACHE_VERSION})",
                blob.version
            )));
        }

        let routes = blob
            .routes
            .into_iter()
            .map(restore_route)
            .collect::<Result<Vec<_>>>()?;
        let lookup = |i: usize| -> Result<&Arc<Route>> {
            routes
                .get(i)
                .ok_or_else(|| RouteError::CorruptCache(format!("route index {i} out of range")))
        };

        let mut collection = RouteCollection::new();
        let mut covered: HashSet<(Method, usize)> = HashSet::new();

        for (method, paths) in &blob.static_index {
            for (path, &i) in paths {
                let route = lookup(i)?;
                if route.is_dynamic() || route.path() != path || !route.answers_to(*method) {
                    return Err(corrupt(format!("static entry {method} {path} -> #{i}")));
                }
                if !covered.insert((*method, i)) {
                    return Err(corrupt(format!("route #{i} indexed twice for {method}")));
                }
                collection.insert_static(*method, Arc::clone(route));
            }
        }
        for (method, indices) in &blob.dynamic {
            for &i in indices {
                let route = lookup(i)?;
                if !route.is_dynamic() || !route.answers_to(*method) {
                    return Err(corrupt(format!("dynamic entry {method} -> #{i}")));
                }
                if !covered.insert((*method, i)) {
                    return Err(corrupt(format!("route #{i} indexed twice for {method}")));
                }
                collection.insert_dynamic(*method, Arc::clone(route));
            }
        }

        // Entries are unique and each names one of its route's methods, so
        // equal counts mean every (method, route) pair is indexed exactly once
        let expected: usize = routes.iter().map(|r| r.methods().len()).sum();
        if covered.len() != expected {
            return Err(corrupt(format!(
                "indices cover {} method entries, routes declare {expected}",
                covered.len()
            )));
        }
        if blob.named.len() != routes.len() {
            return Err(corrupt("name index does not cover every route".to_string()));
        }
        for (name, &i) in &blob.named {
            let route = lookup(i)?;
            if route.name() != name {
                return Err(corrupt(format!("name `{name}` points at `{}`", route.name())));
            }
        }
        for route in routes {
            collection.insert_named(route);
        }

        debug!(routes = collection.len(), "Route collection restored from cache");
        Ok(collection)
    }

    /// Read and restore a cache file
    pub fn load_cache(path: &Path) -> Result<Self> {
        Self::from_cacheable(CacheBlob::read_from(path)?)
    }
}

fn corrupt(detail: String) -> RouteError {
    RouteError::CorruptCache(detail)
}

fn cached_route(route: &Route) -> CachedRoute {
    CachedRoute {
        name: route.name().to_string(),
        path: route.path().to_string(),
        methods: route.methods().to_vec(),
        parameters: route.parameters().to_vec(),
        regex: route.regex().map(|r| r.as_str().to_string()),
        handler: route.handler().clone(),
        secure: route.is_secure(),
        middleware: route.middleware_names().to_vec(),
    }
}

fn restore_route(cached: CachedRoute) -> Result<Arc<Route>> {
    let regex = match (&cached.regex, cached.parameters.is_empty()) {
        (None, true) => None,
        (Some(source), false) => {
            let regex = pattern::compile_regex(&cached.path, source)
                .map_err(|e| corrupt(format!("route `{}`: {e}", cached.name)))?;
            let groups: Vec<&str> = regex.capture_names().flatten().collect();
            if let Some(p) = cached.parameters.iter().find(|p| !groups.contains(&p.name.as_str())) {
                return Err(corrupt(format!(
                    "route `{}` has no capture group for `{}`",
                    cached.name, p.name
                )));
            }
            Some(regex)
        }
        _ => {
            return Err(corrupt(format!(
                "route `{}`: regex presence does not match its parameters",
                cached.name
            )))
        }
    };

    let route = Route::from_parts(
        cached.name,
        cached.methods.into_iter().collect(),
        cached.path,
        cached.parameters,
        regex,
        cached.handler,
    )
    .map_err(|e| corrupt(e.to_string()))?
    .secure(cached.secure)
    .middleware(cached.middleware);
    Ok(Arc::new(route))
}
