//! Dispatch descriptors: what to call when a route matches

use crate::RouteError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference to a route handler.
///
/// The router never invokes a descriptor itself; it hands it to a dispatcher
/// backed by the service container. Closures are referenced by registry id so
/// that every descriptor can be written to a route cache.
///
/// String form (used by manifests and `routes:list`):
///
/// | form              | variant                                   |
/// |-------------------|-------------------------------------------|
/// | `Class@method`    | `Method { is_static: false }`             |
/// | `Class::method`   | `Method { is_static: true }`              |
/// | `Class@$prop`     | `Property { is_static: false }`           |
/// | `Class::$prop`    | `Property { is_static: true }`            |
/// | `closure:id`      | `Closure`                                 |
/// | `name`            | `Function`                                |
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dispatch {
    /// A method on a container-resolved controller
    Method {
        class: String,
        method: String,
        is_static: bool,
    },
    /// A property read off a container-resolved controller
    Property {
        class: String,
        property: String,
        is_static: bool,
    },
    /// A free function registered by name
    Function { name: String },
    /// A closure registered under an id
    Closure { id: String },
}

impl Dispatch {
    /// `Class@method`
    pub fn method(class: impl Into<String>, method: impl Into<String>) -> Self {
        Dispatch::Method {
            class: class.into(),
            method: method.into(),
            is_static: false,
        }
    }

    /// `Class::method`
    pub fn static_method(class: impl Into<String>, method: impl Into<String>) -> Self {
        Dispatch::Method {
            class: class.into(),
            method: method.into(),
            is_static: true,
        }
    }

    /// `Class@$property`
    pub fn property(class: impl Into<String>, property: impl Into<String>) -> Self {
        Dispatch::Property {
            class: class.into(),
            property: property.into(),
            is_static: false,
        }
    }

    /// `Class::$property`
    pub fn static_property(class: impl Into<String>, property: impl Into<String>) -> Self {
        Dispatch::Property {
            class: class.into(),
            property: property.into(),
            is_static: true,
        }
    }

    pub fn function(name: impl Into<String>) -> Self {
        Dispatch::Function { name: name.into() }
    }

    pub fn closure(id: impl Into<String>) -> Self {
        Dispatch::Closure { id: id.into() }
    }

    /// Controller class this descriptor resolves through, if any
    pub fn class(&self) -> Option<&str> {
        match self {
            Dispatch::Method { class, .. } | Dispatch::Property { class, .. } => Some(class),
            Dispatch::Function { .. } | Dispatch::Closure { .. } => None,
        }
    }
}

impl fmt::Display for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = |is_static: bool| if is_static { "::" } else { "@" };
        match self {
            Dispatch::Method {
                class,
                method,
                is_static,
            } => write!(f, "{class}{}{method}", sep(*is_static)),
            Dispatch::Property {
                class,
                property,
                is_static,
            } => write!(f, "{class}{}${property}", sep(*is_static)),
            Dispatch::Function { name } => f.write_str(name),
            Dispatch::Closure { id } => write!(f, "closure:{id}"),
        }
    }
}

impl FromStr for Dispatch {
    type Err = RouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RouteError::InvalidHandler(s.to_string());
        let non_empty = |part: &str| (!part.is_empty()).then(|| part.to_string()).ok_or_else(invalid);

        if let Some(id) = s.strip_prefix("closure:") {
            return Ok(Dispatch::Closure { id: non_empty(id)? });
        }

        let split = s
            .split_once("::")
            .map(|(c, m)| (c, m, true))
            .or_else(|| s.split_once('@').map(|(c, m)| (c, m, false)));

        match split {
            Some((class, member, is_static)) => {
                let class = non_empty(class)?;
                match member.strip_prefix('$') {
                    Some(property) => Ok(Dispatch::Property {
                        class,
                        property: non_empty(property)?,
                        is_static,
                    }),
                    None => Ok(Dispatch::Method {
                        class,
                        method: non_empty(member)?,
                        is_static,
                    }),
                }
            }
            None => Ok(Dispatch::Function { name: non_empty(s)? }),
        }
    }
}
