//! Path template compiler
//!
//! Turns a route template such as `/users/{id:num}/posts/{slug:slug}` into an
//! anchored regular expression with one named capture group per parameter,
//! plus the ordered parameter list.
//!
//! ## Template syntax
//! - `{name}` - one path segment (`[^/]+`)
//! - `{name:alias}` - a named constraint, see [`constraint_alias`]
//! - `{name:regex}` - an inline regex fragment, braces may nest (`{year:\d{4}}`)
//! - `{name?}` / `{name?:alias}` - optional, only allowed at the end of the template
//!
//! A constraint made only of ASCII letters, digits and `_` is looked up as an
//! alias. Anything else is treated as a regex fragment.

use crate::{Result, RouteError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Pattern used for parameters declared without a constraint
pub const DEFAULT_PATTERN: &str = "[^/]+";

/// Resolve a named constraint alias to its regex fragment
pub fn constraint_alias(name: &str) -> Option<&'static str> {
    match name {
        "any" => Some(DEFAULT_PATTERN),
        "num" => Some("[0-9]+"),
        "alpha" => Some("[A-Za-z]+"),
        "alnum" => Some("[A-Za-z0-9]+"),
        "slug" => Some("[A-Za-z0-9_-]+"),
        "uuid" => Some(
            "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        ),
        "path" => Some(".+"),
        _ => None,
    }
}

/// A single declared path parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name, unique within its template
    pub name: String,
    /// Resolved regex fragment the value must match
    pub pattern: String,
    /// Whether the parameter (and its leading `/`) may be absent
    #[serde(default)]
    pub optional: bool,
}

/// Result of compiling a path template
#[derive(Debug, Clone)]
pub struct CompiledPath {
    /// Canonical template (trailing slash removed, except for `/`)
    pub template: String,
    /// Parameters in order of appearance
    pub parameters: Vec<ParamSpec>,
    /// Anchored matcher, `None` for static templates
    pub regex: Option<Regex>,
}

impl CompiledPath {
    /// True when the template has at least one parameter
    pub fn is_dynamic(&self) -> bool {
        !self.parameters.is_empty()
    }
}

#[derive(Debug)]
enum Token {
    Literal(String),
    Param(ParamSpec),
}

/// Strip a trailing slash from a path, keeping the root as `/`
pub fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

/// Compile a path template
///
/// # Example
/// ```
/// use trellis_router::pattern::compile;
///
/// let compiled = compile("/users/{id:num}").unwrap();
/// assert_eq!(compiled.parameters[0].name, "id");
/// assert!(compiled.regex.unwrap().is_match("/users/42"));
/// ```
pub fn compile(template: &str) -> Result<CompiledPath> {
    if !template.starts_with('/') {
        return Err(RouteError::invalid_path(template, "must start with `/`"));
    }
    let canonical = normalize(template);
    let tokens = tokenize(canonical)?;
    check_optional_tail(canonical, &tokens)?;

    let parameters: Vec<ParamSpec> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Param(p) => Some(p.clone()),
            Token::Literal(_) => None,
        })
        .collect();

    let regex = if parameters.is_empty() {
        None
    } else {
        let source = build_regex(&tokens);
        Some(compile_regex(canonical, &source)?)
    };

    Ok(CompiledPath {
        template: canonical.to_string(),
        parameters,
        regex,
    })
}

/// Compile a previously generated regex source, e.g. one read from a route cache
pub fn compile_regex(template: &str, source: &str) -> Result<Regex> {
    Regex::new(source).map_err(|e| RouteError::invalid_path(template, e.to_string()))
}

fn tokenize(template: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut seen = HashSet::new();
    let mut literal = String::new();
    let mut chars = template.char_indices();

    while let Some((start, ch)) = chars.next() {
        match ch {
            '{' => {
                let mut depth = 1usize;
                let mut body = String::new();
                for (_, inner) in chars.by_ref() {
                    match inner {
                        '{' => depth += 1,
                        '}' => depth -= 1,
                        _ => {}
                    }
                    if depth == 0 {
                        break;
                    }
                    body.push(inner);
                }
                if depth != 0 {
                    return Err(RouteError::invalid_path(
                        template,
                        format!("unterminated `{{` at offset {start}"),
                    ));
                }

                let param = parse_param(template, &body)?;
                if !seen.insert(param.name.clone()) {
                    return Err(RouteError::invalid_path(
                        template,
                        format!("duplicate parameter `{}`", param.name),
                    ));
                }
                if !literal.is_empty() {
                    tokens.push(Token::Literal(std::mem::take(&mut literal)));
                }
                tokens.push(Token::Param(param));
            }
            '}' => {
                return Err(RouteError::invalid_path(
                    template,
                    format!("unmatched `}}` at offset {start}"),
                ));
            }
            _ => literal.push(ch),
        }
    }

    if !literal.is_empty() {
        tokens.push(Token::Literal(literal));
    }
    Ok(tokens)
}

fn parse_param(template: &str, body: &str) -> Result<ParamSpec> {
    let (head, constraint) = match body.split_once(':') {
        Some((head, constraint)) => (head, Some(constraint)),
        None => (body, None),
    };
    let (name, optional) = match head.strip_suffix('?') {
        Some(name) => (name, true),
        None => (head, false),
    };

    if !is_identifier(name) {
        return Err(RouteError::invalid_path(
            template,
            format!("invalid parameter name `{name}`"),
        ));
    }

    let pattern = match constraint {
        None => DEFAULT_PATTERN.to_string(),
        Some("") => {
            return Err(RouteError::invalid_path(
                template,
                format!("empty constraint for parameter `{name}`"),
            ))
        }
        Some(c) if c.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') => {
            constraint_alias(c)
                .ok_or_else(|| {
                    RouteError::invalid_path(template, format!("unknown constraint alias `{c}`"))
                })?
                .to_string()
        }
        Some(c) => {
            if c.contains("(?P<") || c.contains("(?<") {
                return Err(RouteError::invalid_path(
                    template,
                    format!("named groups are not allowed in the constraint of `{name}`"),
                ));
            }
            Regex::new(&format!("^(?:{c})$")).map_err(|e| {
                RouteError::invalid_path(template, format!("invalid constraint for `{name}`: {e}"))
            })?;
            c.to_string()
        }
    };

    Ok(ParamSpec {
        name: name.to_string(),
        pattern,
        optional,
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Once an optional parameter appears, only `/` separators and further
/// optional parameters may follow it.
fn check_optional_tail(template: &str, tokens: &[Token]) -> Result<()> {
    let Some(first) = tokens
        .iter()
        .position(|t| matches!(t, Token::Param(p) if p.optional))
    else {
        return Ok(());
    };

    for (i, token) in tokens.iter().enumerate().skip(first + 1) {
        let ok = match token {
            Token::Param(p) => p.optional,
            Token::Literal(l) => {
                l == "/" && matches!(tokens.get(i + 1), Some(Token::Param(p)) if p.optional)
            }
        };
        if !ok {
            return Err(RouteError::invalid_path(
                template,
                "optional parameters may only appear at the end of the path",
            ));
        }
    }
    Ok(())
}

fn build_regex(tokens: &[Token]) -> String {
    let mut source = String::from("^");
    let mut open_groups = 0usize;
    let mut iter = tokens.iter().peekable();

    while let Some(token) = iter.next() {
        match token {
            Token::Literal(text) => {
                let next_optional = matches!(iter.peek(), Some(Token::Param(p)) if p.optional);
                match text.strip_suffix('/') {
                    // The separator before an optional segment belongs to the group
                    // except at the root, where `/` alone must still match
                    Some(head) if next_optional && !(head.is_empty() && source == "^") => {
                        source.push_str(&regex::escape(head));
                        source.push_str("(?:/");
                        open_groups += 1;
                    }
                    _ => source.push_str(&regex::escape(text)),
                }
            }
            Token::Param(param) => {
                if param.optional && !source.ends_with("(?:/") {
                    source.push_str("(?:");
                    open_groups += 1;
                }
                source.push_str(&format!("(?P<{}>{})", param.name, param.pattern));
            }
        }
    }

    for _ in 0..open_groups {
        source.push_str(")?");
    }
    source.push('$');
    source
}
