//! JSON Schema extraction for request validation.
//!
//! A schema taken out of an OpenAPI document may reference other component
//! schemas. The extractor collects every reachable subschema once, embeds
//! them under `definitions` and points the references there, so the result
//! is a self-contained draft-4 schema.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use crate::error::CompileError;
use crate::spec_parser::{Document, ParseError};

/// Schema draft tag set on generated validator configurations.
pub const JSON_SCHEMA_VERSION: &str = "draft4";

const COMPONENT_SCHEMAS: &str = "#/components/schemas/";
const DEFINITIONS: &str = "#/definitions/";

/// Keywords whose value is a list of subschemas.
const SCHEMA_LISTS: &[&str] = &["allOf", "anyOf", "oneOf"];
/// Keywords whose value is a single subschema.
const SCHEMA_SINGLES: &[&str] = &["not", "items", "additionalProperties"];

/// Serialize `schema` into a self-contained JSON Schema string.
///
/// Returns an empty string when there is no schema.
pub fn extract_schema(doc: &Document, schema: Option<&Value>) -> Result<String, CompileError> {
    let Some(schema) = schema else {
        return Ok(String::new());
    };

    let mut collected = Collected::default();
    collect(doc, schema, &mut collected)?;

    let mut result = match schema.get("$ref").and_then(|v| v.as_str()) {
        Some(ref_str) => {
            let mut primary = Map::new();
            primary.insert("$ref".into(), Value::String(ref_str.to_string()));
            Value::Object(primary)
        }
        None => schema.clone(),
    };

    if let Value::Object(obj) = &mut result {
        if !collected.definitions.is_empty() {
            let definitions = std::mem::take(&mut collected.definitions)
                .into_iter()
                .collect::<Map<_, _>>();
            obj.insert("definitions".into(), Value::Object(definitions));
        }
    }
    rewrite_refs(&mut result, &collected.targets);

    Ok(serde_json::to_string(&result)?)
}

#[derive(Default)]
struct Collected {
    /// Original `$ref` -> rewritten `$ref`. Doubles as the seen-set.
    targets: BTreeMap<String, String>,
    /// Definition name -> subschema body.
    definitions: BTreeMap<String, Value>,
}

/// Record every subschema reachable from `schema`.
fn collect(doc: &Document, schema: &Value, collected: &mut Collected) -> Result<(), CompileError> {
    let Some(obj) = schema.as_object() else {
        return Ok(());
    };

    if let Some(ref_str) = obj.get("$ref").and_then(|v| v.as_str()) {
        if collected.targets.contains_key(ref_str) {
            return Ok(());
        }
        let target = doc
            .resolve_ref(ref_str)
            .ok_or_else(|| ParseError::UnresolvedRef(ref_str.to_string()))?;

        let escaped = definition_name(ref_str);
        let name = escaped.replace("~1", "/").replace("~0", "~");
        collected
            .targets
            .insert(ref_str.to_string(), format!("{}{}", DEFINITIONS, escaped));
        collected.definitions.insert(name, target.clone());
        return collect(doc, target, collected);
    }

    for key in SCHEMA_LISTS {
        if let Some(Value::Array(list)) = obj.get(*key) {
            for sub in list {
                collect(doc, sub, collected)?;
            }
        }
    }
    if let Some(Value::Object(properties)) = obj.get("properties") {
        for sub in properties.values() {
            collect(doc, sub, collected)?;
        }
    }
    for key in SCHEMA_SINGLES {
        // additionalProperties may be a boolean; only schema objects are walked
        if let Some(sub) = obj.get(*key).filter(|v| v.is_object()) {
            collect(doc, sub, collected)?;
        }
    }
    Ok(())
}

/// Escaped definition name for a reference.
///
/// `#/components/schemas/User` becomes `User`; any other local pointer is
/// flattened with `_` between its segments.
fn definition_name(ref_str: &str) -> String {
    match ref_str.strip_prefix(COMPONENT_SCHEMAS) {
        Some(name) => name.to_string(),
        None => ref_str.trim_start_matches("#/").replace('/', "_"),
    }
}

/// Point every collected `$ref` at its definition.
fn rewrite_refs(value: &mut Value, targets: &BTreeMap<String, String>) {
    match value {
        Value::Object(obj) => {
            for (key, sub) in obj.iter_mut() {
                if key == "$ref" {
                    if let Some(target) = sub.as_str().and_then(|r| targets.get(r)) {
                        *sub = Value::String(target.clone());
                    }
                } else {
                    rewrite_refs(sub, targets);
                }
            }
        }
        Value::Array(arr) => {
            for sub in arr {
                rewrite_refs(sub, targets);
            }
        }
        _ => {}
    }
}
