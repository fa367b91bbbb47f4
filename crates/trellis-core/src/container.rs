//! Service container
//!
//! String-keyed registry of lazily built services, plus the controller,
//! function and closure registries handler dispatch resolves against.

use crate::dispatcher::{Controller, HandlerFn};
use crate::{Error, Reply, RequestContext, Result, ViewRenderer, VIEW_SERVICE};
use parking_lot::{ReentrantMutex, RwLock};
use serde_json::Value;
use std::any::{type_name, Any};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

type Shared = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Container, &[Value]) -> Result<Shared> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifetime {
    /// One instance, built on first use
    Shared,
    /// A fresh instance per `get`
    Transient,
}

struct Binding {
    lifetime: Lifetime,
    factory: Factory,
    instance: OnceLock<Shared>,
    // Held while the factory runs; the flag marks a build in progress on the
    // owning thread so a dependency cycle is reported instead of recursing
    init: ReentrantMutex<Cell<bool>>,
}

impl Binding {
    fn new(lifetime: Lifetime, factory: Factory) -> Self {
        Self {
            lifetime,
            factory,
            instance: OnceLock::new(),
            init: ReentrantMutex::new(Cell::new(false)),
        }
    }

    /// Build the shared instance at most once, even under concurrent first use
    fn shared(&self, key: &str, container: &Container) -> Result<Shared> {
        if let Some(instance) = self.instance.get() {
            return Ok(Arc::clone(instance));
        }
        let building = self.init.lock();
        if let Some(instance) = self.instance.get() {
            return Ok(Arc::clone(instance));
        }
        if building.replace(true) {
            return Err(Error::ServiceCycle(key.to_string()));
        }
        let result = (self.factory)(container, &[]);
        building.set(false);

        let instance = result?;
        let _ = self.instance.set(Arc::clone(&instance));
        Ok(instance)
    }

    fn build(&self, key: &str, container: &Container, args: &[Value]) -> Result<Shared> {
        match self.lifetime {
            Lifetime::Shared => self.shared(key, container),
            Lifetime::Transient => (self.factory)(container, args),
        }
    }
}

#[derive(Default)]
struct Registry {
    bindings: RwLock<HashMap<String, Arc<Binding>>>,
    functions: RwLock<HashMap<String, HandlerFn>>,
    closures: RwLock<HashMap<String, HandlerFn>>,
}

/// Resolves services, controllers and callable handlers by key.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone, Default)]
pub struct Container {
    registry: Arc<Registry>,
}

impl Container {
    pub fn new() -> Self {
        debug!("Creating service container");
        Self::default()
    }

    /// Bind a lazily-built shared instance
    pub fn singleton<T, F>(&self, key: impl Into<String>, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T> + Send + Sync + 'static,
    {
        let factory: Factory =
            Arc::new(move |c: &Container, _: &[Value]| Ok(Arc::new(factory(c)?) as Shared));
        self.insert(key.into(), Binding::new(Lifetime::Shared, factory));
    }

    /// Bind a factory that builds a new instance per [`Container::get`]
    pub fn bind<T, F>(&self, key: impl Into<String>, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Container, &[Value]) -> Result<T> + Send + Sync + 'static,
    {
        let factory: Factory = Arc::new(move |c: &Container, args: &[Value]| {
            Ok(Arc::new(factory(c, args)?) as Shared)
        });
        self.insert(key.into(), Binding::new(Lifetime::Transient, factory));
    }

    /// Bind an already-built instance
    pub fn instance<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        let missing = key.clone();
        let factory: Factory =
            Arc::new(move |_: &Container, _: &[Value]| Err(Error::ServiceNotFound(missing.clone())));
        let binding = Binding::new(Lifetime::Shared, factory);
        let _ = binding.instance.set(Arc::new(value) as Shared);
        self.insert(key, binding);
    }

    fn insert(&self, key: String, binding: Binding) {
        trace!(key = %key, lifetime = ?binding.lifetime, "Binding service");
        self.registry.bindings.write().insert(key, Arc::new(binding));
    }

    fn binding(&self, key: &str) -> Result<Arc<Binding>> {
        self.registry
            .bindings
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::ServiceNotFound(key.to_string()))
    }

    /// The shared instance for `key`. Factory bindings are built once and
    /// cached on first call.
    pub fn get_singleton<T: Send + Sync + 'static>(&self, key: &str) -> Result<Arc<T>> {
        let instance = self.binding(key)?.shared(key, self)?;
        downcast(key, instance)
    }

    /// An instance for `key`, built with `args` when the binding is a factory
    pub fn get<T: Send + Sync + 'static>(&self, key: &str, args: &[Value]) -> Result<Arc<T>> {
        let instance = self.binding(key)?.build(key, self, args)?;
        downcast(key, instance)
    }

    pub fn has(&self, key: &str) -> bool {
        self.registry.bindings.read().contains_key(key)
    }

    /// Bind a controller class; each non-static dispatch builds a new one
    pub fn controller<C, F>(&self, class: impl Into<String>, factory: F)
    where
        C: Controller + 'static,
        F: Fn(&Container) -> Result<C> + Send + Sync + 'static,
    {
        self.bind(class, move |c, _| Ok(Arc::new(factory(c)?) as Arc<dyn Controller>));
    }

    /// Resolve a controller bound with [`Container::controller`]
    pub fn resolve_controller(&self, class: &str, is_static: bool) -> Result<Arc<dyn Controller>> {
        let controller = if is_static {
            self.get_singleton::<Arc<dyn Controller>>(class)?
        } else {
            self.get::<Arc<dyn Controller>>(class, &[])?
        };
        Ok(Arc::clone(&*controller))
    }

    /// Register a named free-function handler
    pub fn function<F, R>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut RequestContext) -> Result<R> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        let handler: HandlerFn = Arc::new(move |ctx: &mut RequestContext| handler(ctx).map(Into::into));
        self.registry.functions.write().insert(name.into(), handler);
    }

    /// Register a closure handler under an id
    pub fn closure<F, R>(&self, id: impl Into<String>, handler: F)
    where
        F: Fn(&mut RequestContext) -> Result<R> + Send + Sync + 'static,
        R: Into<Reply>,
    {
        let handler: HandlerFn = Arc::new(move |ctx: &mut RequestContext| handler(ctx).map(Into::into));
        self.registry.closures.write().insert(id.into(), handler);
    }

    pub fn resolve_function(&self, name: &str) -> Option<HandlerFn> {
        self.registry.functions.read().get(name).cloned()
    }

    pub fn resolve_closure(&self, id: &str) -> Option<HandlerFn> {
        self.registry.closures.read().get(id).cloned()
    }

    /// Bind the renderer used for view replies
    pub fn views_with(&self, renderer: impl ViewRenderer + 'static) {
        self.instance(VIEW_SERVICE, Arc::new(renderer) as Arc<dyn ViewRenderer>);
    }

    pub fn views(&self) -> Result<Arc<dyn ViewRenderer>> {
        let renderer = self.get_singleton::<Arc<dyn ViewRenderer>>(VIEW_SERVICE)?;
        Ok(Arc::clone(&*renderer))
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("bindings", &self.registry.bindings.read().len())
            .field("functions", &self.registry.functions.read().len())
            .field("closures", &self.registry.closures.read().len())
            .finish()
    }
}

fn downcast<T: Send + Sync + 'static>(key: &str, instance: Shared) -> Result<Arc<T>> {
    instance.downcast::<T>().map_err(|_| Error::ServiceType {
        key: key.to_string(),
        expected: type_name::<T>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct Mailer {
        from: String,
    }

    #[test]
    fn test_singleton_is_lazy_and_shared() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let container = Container::new();
        container.singleton("mailer", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Mailer { from: "noreply@example.com".into() })
        });
        assert_eq!(built.load(Ordering::SeqCst), 0);

        let a = container.get_singleton::<Mailer>("mailer").unwrap();
        let b = container.get::<Mailer>("mailer", &[]).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.from, "noreply@example.com");
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_use_builds_once() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let container = Container::new();
        container.singleton("slow", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(std::time::Duration::from_millis(10));
            Ok(7u32)
        });

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let container = container.clone();
                thread::spawn(move || *container.get_singleton::<u32>("slow").unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 7);
        }
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bind_builds_with_args() {
        let container = Container::new();
        container.bind("greeting", |_, args| {
            let name = args.first().and_then(Value::as_str).unwrap_or("world");
            Ok(format!("hello {name}"))
        });

        let a = container.get::<String>("greeting", &[Value::from("ada")]).unwrap();
        let b = container.get::<String>("greeting", &[]).unwrap();
        assert_eq!(*a, "hello ada");
        assert_eq!(*b, "hello world");

        // the singleton view of a factory binding is cached separately
        let s1 = container.get_singleton::<String>("greeting").unwrap();
        let s2 = container.get_singleton::<String>("greeting").unwrap();
        assert!(Arc::ptr_eq(&s1, &s2));
    }

    #[test]
    fn test_factories_resolve_dependencies() {
        let container = Container::new();
        container.instance("dsn", "sqlite::memory:".to_string());
        container.singleton("db", |c| {
            let dsn = c.get_singleton::<String>("dsn")?;
            Ok(format!("connected to {dsn}"))
        });
        assert_eq!(*container.get_singleton::<String>("db").unwrap(), "connected to sqlite::memory:");
    }

    #[test]
    fn test_singleton_cycle_is_an_error() {
        let container = Container::new();
        container.singleton("a", |c| Ok(*c.get_singleton::<u32>("b")? + 1));
        container.singleton("b", |c| Ok(*c.get_singleton::<u32>("a")? + 1));

        assert!(matches!(
            container.get_singleton::<u32>("a"),
            Err(Error::ServiceCycle(key)) if key == "a"
        ));
        // the failed build is not cached; breaking the cycle recovers
        container.instance("b", 1u32);
        assert_eq!(*container.get_singleton::<u32>("a").unwrap(), 2);
    }

    #[test]
    fn test_missing_and_mistyped() {
        let container = Container::new();
        assert!(matches!(
            container.get_singleton::<u32>("nope"),
            Err(Error::ServiceNotFound(key)) if key == "nope"
        ));

        container.instance("port", 8080u16);
        assert!(matches!(
            container.get_singleton::<String>("port"),
            Err(Error::ServiceType { .. })
        ));
        assert!(container.has("port"));
    }

    #[test]
    fn test_factory_error_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts);
        let container = Container::new();
        container.singleton("flaky", move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::ServiceNotFound("upstream".into()))
            } else {
                Ok(1u8)
            }
        });

        assert!(container.get_singleton::<u8>("flaky").is_err());
        assert_eq!(*container.get_singleton::<u8>("flaky").unwrap(), 1);
    }

    #[test]
    fn test_function_and_closure_registries() {
        let container = Container::new();
        container.function("ping", |_| Ok("pong"));
        container.closure("home", |_| Ok(Reply::Empty));

        assert!(container.resolve_function("ping").is_some());
        assert!(container.resolve_closure("home").is_some());
        assert!(container.resolve_function("home").is_none());
    }
}
