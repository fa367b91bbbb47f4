//! Turns a route's [`Dispatch`] descriptor into something callable

use crate::{Container, Error, Reply, RequestContext, Result};
use std::sync::Arc;
use tracing::trace;
use trellis_router::Dispatch;

/// A registered free function or closure handler
pub type HandlerFn = Arc<dyn Fn(&mut RequestContext) -> Result<Reply> + Send + Sync>;

/// A class of actions resolved through the container.
///
/// # Example
/// ```
/// use trellis_core::{Controller, Reply, RequestContext, Result};
///
/// struct Users;
///
/// impl Controller for Users {
///     fn actions(&self) -> &[&'static str] {
///         &["show"]
///     }
///
///     fn call(&self, action: &str, ctx: &mut RequestContext) -> Result<Reply> {
///         let id = ctx.request.param("id").unwrap_or_default();
///         Ok(format!("{action} user {id}").into())
///     }
/// }
/// ```
pub trait Controller: Send + Sync {
    /// Names [`Controller::call`] accepts
    fn actions(&self) -> &[&'static str];

    fn call(&self, action: &str, ctx: &mut RequestContext) -> Result<Reply>;

    /// A readable property, for property-style routes
    fn property(&self, _name: &str) -> Option<Reply> {
        None
    }
}

/// A dispatch descriptor with its target resolved
pub enum ResolvedHandler {
    Action {
        controller: Arc<dyn Controller>,
        action: String,
    },
    Property(Reply),
    Callable(HandlerFn),
}

impl ResolvedHandler {
    pub fn invoke(self, ctx: &mut RequestContext) -> Result<Reply> {
        match self {
            ResolvedHandler::Action { controller, action } => controller.call(&action, ctx),
            ResolvedHandler::Property(reply) => Ok(reply),
            ResolvedHandler::Callable(handler) => handler(ctx),
        }
    }
}

impl std::fmt::Debug for ResolvedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedHandler::Action { action, .. } => write!(f, "Action({action})"),
            ResolvedHandler::Property(reply) => write!(f, "Property({reply:?})"),
            ResolvedHandler::Callable(_) => f.write_str("Callable"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    container: Container,
}

impl Dispatcher {
    pub fn new(container: Container) -> Self {
        Self { container }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Resolve a descriptor. Unknown classes, actions, properties,
    /// functions and closures are [`Error::HandlerNotFound`].
    pub fn resolve(&self, dispatch: &Dispatch) -> Result<ResolvedHandler> {
        trace!(handler = %dispatch, "Resolving handler");
        match dispatch {
            Dispatch::Method {
                class,
                method,
                is_static,
            } => {
                let controller = self.controller(class, *is_static, dispatch)?;
                if !controller.actions().contains(&method.as_str()) {
                    return Err(Error::HandlerNotFound(dispatch.to_string()));
                }
                Ok(ResolvedHandler::Action {
                    controller,
                    action: method.clone(),
                })
            }
            Dispatch::Property {
                class,
                property,
                is_static,
            } => self
                .controller(class, *is_static, dispatch)?
                .property(property)
                .map(ResolvedHandler::Property)
                .ok_or_else(|| Error::HandlerNotFound(dispatch.to_string())),
            Dispatch::Function { name } => self
                .container
                .resolve_function(name)
                .map(ResolvedHandler::Callable)
                .ok_or_else(|| Error::HandlerNotFound(dispatch.to_string())),
            Dispatch::Closure { id } => self
                .container
                .resolve_closure(id)
                .map(ResolvedHandler::Callable)
                .ok_or_else(|| Error::HandlerNotFound(dispatch.to_string())),
        }
    }

    fn controller(
        &self,
        class: &str,
        is_static: bool,
        dispatch: &Dispatch,
    ) -> Result<Arc<dyn Controller>> {
        if !self.container.has(class) {
            return Err(Error::HandlerNotFound(dispatch.to_string()));
        }
        self.container.resolve_controller(class, is_static)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use trellis_router::Method;

    struct Users {
        serial: usize,
    }

    impl Controller for Users {
        fn actions(&self) -> &[&'static str] {
            &["show"]
        }

        fn call(&self, action: &str, ctx: &mut RequestContext) -> Result<Reply> {
            Ok(format!("{action}:{}:{}", ctx.request.param("id").unwrap_or("-"), self.serial).into())
        }

        fn property(&self, name: &str) -> Option<Reply> {
            (name == "title").then(|| Reply::from("Users"))
        }
    }

    fn container() -> Container {
        let built = Arc::new(AtomicUsize::new(0));
        let container = Container::new();
        container.controller("Users", move |_| {
            Ok(Users {
                serial: built.fetch_add(1, Ordering::SeqCst),
            })
        });
        container.function("ping", |_| Ok("pong"));
        container.closure("home", |_| Ok("home"));
        container
    }

    fn text(reply: Reply) -> String {
        match reply {
            Reply::Text(body) => body,
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_instance_methods_get_fresh_controllers() {
        let dispatcher = Dispatcher::new(container());
        let mut ctx = RequestContext::new(Request::new(Method::Get, "/"));
        let show = Dispatch::method("Users", "show");

        let first = dispatcher.resolve(&show).unwrap().invoke(&mut ctx).unwrap();
        let second = dispatcher.resolve(&show).unwrap().invoke(&mut ctx).unwrap();
        assert_eq!(text(first), "show:-:0");
        assert_eq!(text(second), "show:-:1");
    }

    #[test]
    fn test_static_methods_share_a_controller() {
        let dispatcher = Dispatcher::new(container());
        let mut ctx = RequestContext::new(Request::new(Method::Get, "/"));
        let show = Dispatch::static_method("Users", "show");

        let first = dispatcher.resolve(&show).unwrap().invoke(&mut ctx).unwrap();
        let second = dispatcher.resolve(&show).unwrap().invoke(&mut ctx).unwrap();
        assert_eq!(text(first), text(second));
    }

    #[test]
    fn test_property_function_and_closure() {
        let dispatcher = Dispatcher::new(container());
        let mut ctx = RequestContext::new(Request::new(Method::Get, "/"));

        let title = dispatcher.resolve(&Dispatch::property("Users", "title")).unwrap();
        assert_eq!(text(title.invoke(&mut ctx).unwrap()), "Users");

        let ping = dispatcher.resolve(&Dispatch::function("ping")).unwrap();
        assert_eq!(text(ping.invoke(&mut ctx).unwrap()), "pong");

        let home = dispatcher.resolve(&Dispatch::closure("home")).unwrap();
        assert_eq!(text(home.invoke(&mut ctx).unwrap()), "home");
    }

    #[test]
    fn test_unresolvable_descriptors() {
        let dispatcher = Dispatcher::new(container());
        for dispatch in [
            Dispatch::method("Missing", "show"),
            Dispatch::method("Users", "destroy"),
            Dispatch::property("Users", "secret"),
            Dispatch::function("nope"),
            Dispatch::closure("nope"),
        ] {
            assert!(
                matches!(dispatcher.resolve(&dispatch), Err(Error::HandlerNotFound(_))),
                "{dispatch} should not resolve"
            );
        }
    }
}
