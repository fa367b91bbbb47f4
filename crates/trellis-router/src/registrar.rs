//! Route registration API with groups
//!
//! ```
//! use trellis_router::{Dispatch, Group, Routes};
//!
//! let mut routes = Routes::new();
//! routes.get("/", Dispatch::closure("home")).name("home");
//! routes.group(Group::new().prefix("/admin").name("admin.").middleware("auth"), |admin| {
//!     admin.get("/users/{id:num}", Dispatch::method("AdminUsers", "show")).name("users.show");
//! });
//!
//! let collection = routes.build().unwrap();
//! assert_eq!(collection.get("admin.users.show").unwrap().path(), "/admin/users/{id:num}");
//! ```

use crate::{Dispatch, Method, Result, Route, RouteCollection};
use tracing::debug;

/// Attributes shared by every route declared inside a group
#[derive(Debug, Clone, Default)]
pub struct Group {
    prefix: String,
    name_prefix: String,
    middleware: Vec<String>,
    secure: bool,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path prefix, e.g. `/admin`
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Name prefix, e.g. `admin.`
    pub fn name(mut self, name_prefix: impl Into<String>) -> Self {
        self.name_prefix = name_prefix.into();
        self
    }

    pub fn middleware(mut self, name: impl Into<String>) -> Self {
        self.middleware.push(name.into());
        self
    }

    /// Require HTTPS for every route in the group
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }
}

/// A route waiting to be compiled by [`Routes::build`]
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    methods: Vec<Method>,
    path: String,
    handler: Dispatch,
    name: Option<String>,
    name_prefix: String,
    secure: bool,
    middleware: Vec<String>,
}

impl RouteDefinition {
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn secure(&mut self) -> &mut Self {
        self.secure = true;
        self
    }

    pub fn middleware(&mut self, name: impl Into<String>) -> &mut Self {
        self.middleware.push(name.into());
        self
    }

    /// Final route name; unnamed routes are named after their methods and path
    fn resolved_name(&self) -> String {
        match &self.name {
            Some(name) => format!("{}{name}", self.name_prefix),
            None => default_name(&self.methods, &self.path),
        }
    }

    fn compile(self) -> Result<Route> {
        let name = self.resolved_name();
        Ok(Route::new(name, self.methods, &self.path, self.handler)?
            .secure(self.secure)
            .middleware(self.middleware))
    }
}

/// Name given to routes registered without one, e.g. `GET|POST /users`
pub fn default_name(methods: &[Method], path: &str) -> String {
    let mut methods = methods.to_vec();
    methods.sort();
    methods.dedup();
    let verbs: Vec<&str> = methods.iter().map(Method::as_str).collect();
    format!("{} {path}", verbs.join("|"))
}

/// Collects route definitions, then compiles them into a [`RouteCollection`]
#[derive(Debug, Default)]
pub struct Routes {
    definitions: Vec<RouteDefinition>,
    groups: Vec<Group>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route for an explicit set of methods
    pub fn add(
        &mut self,
        methods: impl IntoIterator<Item = Method>,
        path: &str,
        handler: Dispatch,
    ) -> &mut RouteDefinition {
        let mut prefix = String::new();
        let mut name_prefix = String::new();
        let mut middleware = Vec::new();
        let mut secure = false;
        for group in &self.groups {
            prefix = join_paths(&prefix, &group.prefix);
            name_prefix.push_str(&group.name_prefix);
            middleware.extend(group.middleware.iter().cloned());
            secure |= group.secure;
        }

        self.definitions.push(RouteDefinition {
            methods: methods.into_iter().collect(),
            path: join_paths(&prefix, path),
            handler,
            name: None,
            name_prefix,
            secure,
            middleware,
        });
        let last = self.definitions.len() - 1;
        &mut self.definitions[last]
    }

    pub fn get(&mut self, path: &str, handler: Dispatch) -> &mut RouteDefinition {
        self.add([Method::Get], path, handler)
    }

    pub fn post(&mut self, path: &str, handler: Dispatch) -> &mut RouteDefinition {
        self.add([Method::Post], path, handler)
    }

    pub fn put(&mut self, path: &str, handler: Dispatch) -> &mut RouteDefinition {
        self.add([Method::Put], path, handler)
    }

    pub fn patch(&mut self, path: &str, handler: Dispatch) -> &mut RouteDefinition {
        self.add([Method::Patch], path, handler)
    }

    pub fn delete(&mut self, path: &str, handler: Dispatch) -> &mut RouteDefinition {
        self.add([Method::Delete], path, handler)
    }

    pub fn options(&mut self, path: &str, handler: Dispatch) -> &mut RouteDefinition {
        self.add([Method::Options], path, handler)
    }

    /// Register a route for every supported method
    pub fn any(&mut self, path: &str, handler: Dispatch) -> &mut RouteDefinition {
        self.add(Method::ALL, path, handler)
    }

    /// Declare routes sharing a prefix, name prefix, middleware or HTTPS flag.
    /// Groups nest.
    pub fn group(&mut self, group: Group, routes: impl FnOnce(&mut Routes)) -> &mut Self {
        self.groups.push(group);
        routes(self);
        self.groups.pop();
        self
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Compile every definition, in declaration order.
    ///
    /// The first invalid template, duplicate name or duplicate route aborts
    /// the build.
    pub fn build(self) -> Result<RouteCollection> {
        let mut collection = RouteCollection::new();
        for definition in self.definitions {
            collection.add(definition.compile()?)?;
        }
        debug!(routes = collection.len(), "Route collection built");
        Ok(collection)
    }
}

fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => format!("/{path}"),
        (false, true) => prefix.to_string(),
        (false, false) => {
            let sep = if prefix.starts_with('/') { "" } else { "/" };
            format!("{sep}{prefix}/{path}")
        }
    }
}
