//! Route collection: per-method static and dynamic buckets plus a name index

use crate::{Method, Result, Route, RouteError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// In-memory index of every registered route.
///
/// - `static`: method -> exact path -> route, O(1) lookup
/// - `dynamic`: method -> routes in registration order, regex scanned
/// - `named`: route name -> route, for reverse routing
///
/// Built once and then only read. Replacing routes at runtime means building
/// a new collection and swapping it in whole.
#[derive(Debug, Clone, Default)]
pub struct RouteCollection {
    routes: Vec<Arc<Route>>,
    static_routes: HashMap<Method, HashMap<String, Arc<Route>>>,
    dynamic_routes: HashMap<Method, Vec<Arc<Route>>>,
    named: HashMap<String, Arc<Route>>,
}

impl RouteCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route.
    ///
    /// Fails with [`RouteError::DuplicateRouteName`] when the name is taken and
    /// with [`RouteError::DuplicateRoute`] when one of its methods already has
    /// a route with the same template. Nothing is indexed on failure.
    pub fn add(&mut self, route: Route) -> Result<()> {
        if self.named.contains_key(route.name()) {
            return Err(RouteError::DuplicateRouteName(route.name().to_string()));
        }
        for &method in route.methods() {
            if self.lookup_template(method, route.path(), route.is_dynamic()) {
                return Err(RouteError::DuplicateRoute {
                    method,
                    path: route.path().to_string(),
                });
            }
        }

        trace!(
            name = route.name(),
            path = route.path(),
            dynamic = route.is_dynamic(),
            "Route registered"
        );

        let route = Arc::new(route);
        for &method in route.methods() {
            if route.is_dynamic() {
                self.dynamic_routes
                    .entry(method)
                    .or_default()
                    .push(Arc::clone(&route));
            } else {
                self.static_routes
                    .entry(method)
                    .or_default()
                    .insert(route.path().to_string(), Arc::clone(&route));
            }
        }
        self.named
            .insert(route.name().to_string(), Arc::clone(&route));
        self.routes.push(route);
        Ok(())
    }

    // Raw index writes for cache restore; consistency is checked by the caller.
    pub(crate) fn insert_static(&mut self, method: Method, route: Arc<Route>) {
        self.static_routes
            .entry(method)
            .or_default()
            .insert(route.path().to_string(), route);
    }

    pub(crate) fn insert_dynamic(&mut self, method: Method, route: Arc<Route>) {
        self.dynamic_routes.entry(method).or_default().push(route);
    }

    pub(crate) fn insert_named(&mut self, route: Arc<Route>) {
        self.named.insert(route.name().to_string(), Arc::clone(&route));
        self.routes.push(route);
    }

    fn lookup_template(&self, method: Method, template: &str, dynamic: bool) -> bool {
        if dynamic {
            self.dynamic_routes
                .get(&method)
                .is_some_and(|routes| routes.iter().any(|r| r.path() == template))
        } else {
            self.static_route(method, template).is_some()
        }
    }

    /// Route registered under `name`
    pub fn get(&self, name: &str) -> Option<&Arc<Route>> {
        self.named.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    /// Every route in registration order
    pub fn all(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Exact static lookup, no normalization
    pub fn static_route(&self, method: Method, path: &str) -> Option<&Arc<Route>> {
        self.static_routes.get(&method)?.get(path)
    }

    /// Dynamic routes for a method, in registration order
    pub fn dynamic_routes(&self, method: Method) -> &[Arc<Route>] {
        self.dynamic_routes
            .get(&method)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Copy of this collection with one route renamed
    pub fn renamed(&self, from: &str, to: &str) -> Result<RouteCollection> {
        if !self.has(from) {
            return Err(RouteError::UnknownRoute(from.to_string()));
        }
        let mut copy = RouteCollection::new();
        for route in &self.routes {
            let route = if route.name() == from {
                route.renamed(to)?
            } else {
                Route::clone(route)
            };
            copy.add(route)?;
        }
        Ok(copy)
    }

    /// Reverse routing: build the URL of a named route
    ///
    /// # Example
    /// ```
    /// use trellis_router::{Dispatch, Method, Route, RouteCollection};
    ///
    /// let mut routes = RouteCollection::new();
    /// routes
    ///     .add(Route::new("user.show", [Method::Get], "/users/{id:num}", Dispatch::function("show")).unwrap())
    ///     .unwrap();
    /// assert_eq!(routes.url_for("user.show", [("id", "7")]).unwrap(), "/users/7");
    /// ```
    pub fn url_for<'a>(
        &self,
        name: &str,
        params: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<String> {
        self.get(name)
            .ok_or_else(|| RouteError::UnknownRoute(name.to_string()))?
            .url(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Dispatch;

    fn route(name: &str, methods: &[Method], path: &str) -> Route {
        Route::new(name, methods.iter().copied(), path, Dispatch::function(name)).unwrap()
    }

    #[test]
    fn test_partitions_static_and_dynamic() {
        let mut routes = RouteCollection::new();
        routes.add(route("home", &[Method::Get], "/")).unwrap();
        routes
            .add(route("user.show", &[Method::Get, Method::Head], "/users/{id}"))
            .unwrap();

        assert_eq!(routes.static_route(Method::Get, "/").unwrap().name(), "home");
        assert!(routes.static_route(Method::Post, "/").is_none());
        assert_eq!(routes.dynamic_routes(Method::Get).len(), 1);
        assert_eq!(routes.dynamic_routes(Method::Head).len(), 1);
        assert!(routes.dynamic_routes(Method::Delete).is_empty());
        assert_eq!(routes.len(), 2);
    }

    #[test]
    fn test_duplicate_name_keeps_first_route() {
        let mut routes = RouteCollection::new();
        routes.add(route("users", &[Method::Get], "/users")).unwrap();
        let err = routes
            .add(route("users", &[Method::Post], "/people"))
            .unwrap_err();

        assert!(matches!(err, RouteError::DuplicateRouteName(ref n) if n == "users"));
        assert_eq!(routes.len(), 1);
        assert_eq!(routes.get("users").unwrap().path(), "/users");
        assert!(routes.static_route(Method::Post, "/people").is_none());
    }

    #[test]
    fn test_duplicate_static_route_is_rejected() {
        let mut routes = RouteCollection::new();
        routes.add(route("a", &[Method::Get], "/users")).unwrap();
        let err = routes
            .add(route("b", &[Method::Post, Method::Get], "/users/"))
            .unwrap_err();

        assert!(matches!(err, RouteError::DuplicateRoute { method: Method::Get, .. }));
        assert!(!routes.has("b"));
        assert!(routes.static_route(Method::Post, "/users").is_none());
    }

    #[test]
    fn test_same_path_different_methods() {
        let mut routes = RouteCollection::new();
        routes.add(route("list", &[Method::Get], "/users")).unwrap();
        routes.add(route("create", &[Method::Post], "/users")).unwrap();
        assert_eq!(routes.static_route(Method::Post, "/users").unwrap().name(), "create");
    }

    #[test]
    fn test_duplicate_dynamic_template_is_rejected() {
        let mut routes = RouteCollection::new();
        routes.add(route("a", &[Method::Get], "/users/{id}")).unwrap();
        assert!(routes.add(route("b", &[Method::Get], "/users/{id}")).is_err());
        // Different template that overlaps is fine: registration order decides
        routes.add(route("c", &[Method::Get], "/users/{name:alpha}")).unwrap();
    }

    #[test]
    fn test_renamed_copy_leaves_original() {
        let mut routes = RouteCollection::new();
        routes.add(route("old", &[Method::Get], "/x")).unwrap();
        let copy = routes.renamed("old", "new").unwrap();

        assert!(routes.has("old"));
        assert!(copy.has("new"));
        assert!(!copy.has("old"));
        assert!(routes.renamed("missing", "y").is_err());
    }

    #[test]
    fn test_url_for_unknown_route() {
        let routes = RouteCollection::new();
        assert!(matches!(
            routes.url_for("nope", Vec::<(&str, &str)>::new()),
            Err(RouteError::UnknownRoute(_))
        ));
    }
}
