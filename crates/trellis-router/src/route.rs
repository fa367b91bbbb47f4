//! Route value object

use crate::pattern::{self, ParamSpec};
use crate::{Dispatch, Method, Result, RouteError};
use regex::Regex;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Path parameters captured by a match, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(SmallVec<[(String, String); 4]>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Value of a parameter, if it was captured
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get params as HashMap for convenient access
    pub fn to_map(&self) -> HashMap<String, String> {
        self.0.iter().cloned().collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Params(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// An immutable route definition.
///
/// Built once at registration time (or from a route cache). Operations that
/// change a route, such as [`Route::renamed`], return a new value.
#[derive(Debug, Clone)]
pub struct Route {
    name: String,
    path: String,
    methods: SmallVec<[Method; 2]>,
    parameters: Vec<ParamSpec>,
    regex: Option<Regex>,
    handler: Dispatch,
    secure: bool,
    middleware: Vec<String>,
}

impl Route {
    /// Compile a new route
    ///
    /// # Example
    /// ```
    /// use trellis_router::{Dispatch, Method, Route};
    ///
    /// let route = Route::new(
    ///     "user.show",
    ///     [Method::Get],
    ///     "/users/{id:num}",
    ///     Dispatch::method("UserController", "show"),
    /// )
    /// .unwrap();
    /// assert!(route.is_dynamic());
    /// ```
    pub fn new(
        name: impl Into<String>,
        methods: impl IntoIterator<Item = Method>,
        path: &str,
        handler: Dispatch,
    ) -> Result<Self> {
        let compiled = pattern::compile(path)?;
        Self::from_parts(
            name.into(),
            methods.into_iter().collect(),
            compiled.template,
            compiled.parameters,
            compiled.regex,
            handler,
        )
    }

    pub(crate) fn from_parts(
        name: String,
        mut methods: SmallVec<[Method; 2]>,
        path: String,
        parameters: Vec<ParamSpec>,
        regex: Option<Regex>,
        handler: Dispatch,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(RouteError::EmptyName(path));
        }
        methods.sort();
        methods.dedup();
        if methods.is_empty() {
            return Err(RouteError::NoMethods(name));
        }

        Ok(Self {
            name,
            path,
            methods,
            parameters,
            regex,
            handler,
            secure: false,
            middleware: Vec::new(),
        })
    }

    /// Require HTTPS for this route
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Attach named middleware, appended in order
    pub fn middleware<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middleware.extend(names.into_iter().map(Into::into));
        self
    }

    /// Copy of this route under a different name
    pub fn renamed(&self, name: impl Into<String>) -> Result<Route> {
        let name = name.into();
        if name.is_empty() {
            return Err(RouteError::EmptyName(self.path.clone()));
        }
        Ok(Route {
            name,
            ..self.clone()
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical path template
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Methods in canonical order
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn answers_to(&self, method: Method) -> bool {
        self.methods.contains(&method)
    }

    pub fn parameters(&self) -> &[ParamSpec] {
        &self.parameters
    }

    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    pub fn handler(&self) -> &Dispatch {
        &self.handler
    }

    pub fn is_dynamic(&self) -> bool {
        !self.parameters.is_empty()
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Per-route middleware names
    pub fn middleware_names(&self) -> &[String] {
        &self.middleware
    }

    /// Match a normalized path against this route's regex and bind parameters.
    ///
    /// Static routes never capture; callers look them up by exact path.
    pub fn captures(&self, path: &str) -> Option<Params> {
        let caps = self.regex.as_ref()?.captures(path)?;
        let mut params = Params::new();
        for spec in &self.parameters {
            if let Some(value) = caps.name(&spec.name) {
                params.push(spec.name.as_str(), value.as_str());
            }
        }
        Some(params)
    }

    /// Build a URL for this route from parameter values.
    ///
    /// Absent optional parameters are dropped together with their leading
    /// `/`; leaving one out while supplying a later one is an error. Every
    /// supplied value must satisfy its constraint.
    pub fn url<'a>(&self, params: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<String> {
        let values: HashMap<&str, &str> = params.into_iter().collect();
        let mut url = String::with_capacity(self.path.len());
        let mut specs = self.parameters.iter();
        let mut chars = self.path.chars();

        while let Some(ch) = chars.next() {
            if ch != '{' {
                url.push(ch);
                continue;
            }

            let mut depth = 1usize;
            for inner in chars.by_ref() {
                match inner {
                    '{' => depth += 1,
                    '}' => depth -= 1,
                    _ => {}
                }
                if depth == 0 {
                    break;
                }
            }

            let Some(spec) = specs.next() else {
                break;
            };
            match values.get(spec.name.as_str()) {
                Some(value) => {
                    self.check_value(spec, value)?;
                    url.push_str(value);
                }
                None if spec.optional => {
                    // A later value cannot be placed without this segment
                    if specs.clone().any(|later| values.contains_key(later.name.as_str())) {
                        return Err(RouteError::MissingParameter {
                            route: self.name.clone(),
                            param: spec.name.clone(),
                        });
                    }
                    if url.len() > 1 && url.ends_with('/') {
                        url.pop();
                    }
                    break;
                }
                None => {
                    return Err(RouteError::MissingParameter {
                        route: self.name.clone(),
                        param: spec.name.clone(),
                    })
                }
            }
        }

        Ok(url)
    }

    fn check_value(&self, spec: &ParamSpec, value: &str) -> Result<()> {
        let check = pattern::compile_regex(&self.path, &format!("^(?:{})$", spec.pattern))?;
        if check.is_match(value) {
            Ok(())
        } else {
            Err(RouteError::ParameterMismatch {
                route: self.name.clone(),
                param: spec.name.clone(),
                pattern: spec.pattern.clone(),
                value: value.to_string(),
            })
        }
    }
}
