//! `x-kong-*` directive extraction.
//!
//! Directives are copied verbatim from the document. Object-valued
//! directives may instead be a `$ref` into `#/components/x-kong/...`.

use serde_json::{Map, Value};

use crate::error::CompileError;
use crate::spec_parser::Document;

pub const KONG_NAME: &str = "x-kong-name";
pub const KONG_TAGS: &str = "x-kong-tags";
pub const SERVICE_DEFAULTS: &str = "x-kong-service-defaults";
pub const UPSTREAM_DEFAULTS: &str = "x-kong-upstream-defaults";
pub const ROUTE_DEFAULTS: &str = "x-kong-route-defaults";
pub const PLUGIN_PREFIX: &str = "x-kong-plugin-";
pub const SECURITY_OIDC: &str = "x-kong-security-openid-connect";

const KONG_COMPONENTS_PREFIX: &str = "#/components/x-kong/";

/// `x-kong-name` of a scope object, if set.
pub fn kong_name(obj: &Map<String, Value>) -> Result<Option<&str>, CompileError> {
    match obj.get(KONG_NAME) {
        None => Ok(None),
        Some(Value::String(name)) => Ok(Some(name.as_str())),
        Some(_) => Err(CompileError::InvalidDirective {
            key: KONG_NAME.into(),
            reason: "expected a string".into(),
        }),
    }
}

/// Document-level `x-kong-tags`, if set.
pub fn kong_tags(doc: &Document) -> Result<Option<Vec<String>>, CompileError> {
    let Some(value) = doc.root().get(KONG_TAGS) else {
        return Ok(None);
    };
    let invalid = || CompileError::InvalidDirective {
        key: KONG_TAGS.into(),
        reason: "expected an array of strings".into(),
    };
    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|tag| tag.as_str().map(str::to_string).ok_or_else(invalid))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// The `components.x-kong` map, if present.
fn kong_components(doc: &Document) -> Result<Option<&Map<String, Value>>, CompileError> {
    let Some(value) = doc.root().get("components").and_then(|c| c.get("x-kong")) else {
        return Ok(None);
    };
    value
        .as_object()
        .map(Some)
        .ok_or_else(|| CompileError::extension("/components/x-kong", "expected a JSON object"))
}

/// Read the object-valued directive `key` from a scope object.
///
/// Returns an owned copy so callers can stamp computed fields on it.
pub fn kong_object(
    doc: &Document,
    obj: &Map<String, Value>,
    key: &str,
) -> Result<Option<Map<String, Value>>, CompileError> {
    match obj.get(key) {
        None => Ok(None),
        Some(Value::Object(map)) => dereference(doc, map).map(|m| Some(m.clone())),
        Some(_) => Err(CompileError::extension(key, "expected a JSON object")),
    }
}

/// Resolve a `{"$ref": "#/components/x-kong/..."}` object; any other object
/// is returned unchanged.
fn dereference<'a>(
    doc: &'a Document,
    value: &'a Map<String, Value>,
) -> Result<&'a Map<String, Value>, CompileError> {
    let pointer = match value.get("$ref") {
        None => return Ok(value),
        Some(Value::String(pointer)) => pointer,
        Some(_) => {
            return Err(CompileError::kong_ref(
                "$ref",
                "expected '$ref' pointer to be a string",
            ))
        }
    };

    let Some(relative) = pointer.strip_prefix(KONG_COMPONENTS_PREFIX) else {
        return Err(CompileError::kong_ref(
            pointer.as_str(),
            "all 'x-kong-...' references must be at '#/components/x-kong/...'",
        ));
    };

    let mut current = kong_components(doc)?
        .ok_or_else(|| CompileError::kong_ref(pointer.as_str(), "reference not found"))?;
    let mut walked = String::from("#/components/x-kong");
    for segment in relative.split('/') {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        walked.push('/');
        walked.push_str(&segment);
        current = match current.get(&segment) {
            None => return Err(CompileError::kong_ref(pointer.as_str(), "reference not found")),
            Some(Value::Object(next)) => next,
            Some(_) => {
                return Err(CompileError::kong_ref(
                    pointer.as_str(),
                    format!("expected '{}' to be a JSON object", walked),
                ))
            }
        };
    }
    Ok(current)
}
