//! Route paths and header-based route expansion.

use serde_json::{Map, Value};

use crate::entity::{Entity, EntityContext};
use crate::error::CompileError;
use crate::naming::{sanitize_capture_name, separator, MAX_CAPTURE_NAME_LEN};
use crate::spec_parser::{Document, Parameter};

/// Priority of routes whose path has no parameters.
pub const LITERAL_PATH_PRIORITY: i64 = 200;
/// Priority of routes whose path has parameters.
pub const PARAMETERIZED_PATH_PRIORITY: i64 = 100;

/// Regex metacharacters escaped in literal path segments.
const REGEX_SPECIALS: &[char] = &['(', ')', '+', '.', '?', '*', '[', '$'];

/// A compiled route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePath {
    /// Regex path, `~`-prefixed and `$`-anchored.
    pub regex: String,
    pub priority: i64,
}

/// Compile an OpenAPI path template into a regex route path.
///
/// Each `{name}` becomes a named capture that matches anything but `#`, `?`
/// and `/`; it may match the empty string when the parameter's schema has
/// `minLength: 0`. `default_priority` comes from the route defaults and is
/// lowered by one for parameterized paths.
pub fn build_route_path(
    template: &str,
    params: &[Parameter],
    doc: &Document,
    inso_compat: bool,
    default_priority: Option<i64>,
) -> Result<RoutePath, CompileError> {
    let mut regex = String::with_capacity(template.len() + 16);
    regex.push('~');
    let mut parameterized = false;

    let mut rest = template;
    while let Some(open) = rest.find('{') {
        push_escaped(&mut regex, &rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            CompileError::InvalidPathTemplate(format!("unclosed '{{' in '{}'", template))
        })?;
        let name = &after[..close];
        if name.is_empty() || name.contains('{') {
            return Err(CompileError::InvalidPathTemplate(format!(
                "invalid parameter segment in '{}'",
                template
            )));
        }

        let capture = sanitize_capture_name(name, inso_compat);
        if capture.len() > MAX_CAPTURE_NAME_LEN {
            return Err(CompileError::CaptureNameTooLong {
                name: name.to_string(),
                path: template.to_string(),
                capture,
                max: MAX_CAPTURE_NAME_LEN,
            });
        }
        let quantifier = if allows_empty(doc, params, name)? {
            '*'
        } else {
            '+'
        };
        regex.push_str(&format!("(?<{}>[^#?/]{})", capture, quantifier));
        parameterized = true;

        rest = &after[close + 1..];
    }
    push_escaped(&mut regex, rest);
    regex.push('$');

    let priority = match (default_priority, parameterized) {
        (Some(priority), true) => priority.saturating_sub(1),
        (Some(priority), false) => priority,
        (None, true) => PARAMETERIZED_PATH_PRIORITY,
        (None, false) => LITERAL_PATH_PRIORITY,
    };

    Ok(RoutePath { regex, priority })
}

fn push_escaped(out: &mut String, literal: &str) {
    for ch in literal.chars() {
        if REGEX_SPECIALS.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
}

/// Whether the path parameter `name` may be empty (`minLength: 0`).
fn allows_empty(doc: &Document, params: &[Parameter], name: &str) -> Result<bool, CompileError> {
    let Some(schema) = params
        .iter()
        .find(|p| p.location == "path" && p.name == name)
        .and_then(|p| p.schema.as_ref())
    else {
        return Ok(false);
    };
    let schema = doc.resolve(schema)?;
    Ok(schema.get("minLength").and_then(|v| v.as_u64()) == Some(0))
}

/// Clone `route` once per combination of enum-valued header parameters.
///
/// Each clone gets a `headers` match and the name `<base_name>_<n>` (or
/// `-<n>` in Inso mode), `n` counting from 1, with a matching identifier.
/// Without such headers the route is returned unchanged.
pub fn expand_header_routes(
    route: Entity,
    params: &[Parameter],
    doc: &Document,
    inso_compat: bool,
    base_name: &str,
    ctx: &EntityContext,
) -> Result<Vec<Entity>, CompileError> {
    let mut headers: Vec<(&str, Vec<String>)> = Vec::new();
    for param in params.iter().filter(|p| p.location == "header") {
        let Some(schema) = param.schema.as_ref() else {
            continue;
        };
        let values = match doc.resolve(schema)?.get("enum") {
            Some(Value::Array(values)) if !values.is_empty() => values
                .iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            _ => continue,
        };
        headers.push((param.name.as_str(), values));
    }
    if headers.is_empty() {
        return Ok(vec![route]);
    }
    headers.sort_by(|a, b| a.0.cmp(b.0));

    let combinations = headers.iter().fold(vec![Vec::new()], |acc, (_, values)| {
        acc.iter()
            .flat_map(|prefix: &Vec<&str>| {
                values.iter().map(move |value| {
                    let mut next = prefix.clone();
                    next.push(value.as_str());
                    next
                })
            })
            .collect()
    });

    let sep = separator(inso_compat);
    let routes = combinations
        .into_iter()
        .enumerate()
        .map(|(i, combination)| {
            let name = format!("{}{}{}", base_name, sep, i + 1);
            let mut clone = route.clone();
            ctx.stamp(&mut clone, &name, "route");
            clone.insert("name".into(), Value::String(name));

            let matches = headers
                .iter()
                .zip(combination)
                .map(|((header, _), value)| {
                    (
                        header.to_string(),
                        Value::Array(vec![Value::String(value.to_string())]),
                    )
                })
                .collect::<Map<_, _>>();
            clone.insert("headers".into(), Value::Object(matches));
            clone
        })
        .collect();
    Ok(routes)
}
