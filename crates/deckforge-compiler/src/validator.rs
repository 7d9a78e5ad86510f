//! Request validator synthesis.
//!
//! Validation is opt-in: an operation only gets a `request-validator` plugin
//! when some enclosing scope declared one, even an empty one. The declared
//! plugin acts as a template; schema fields it leaves out are generated from
//! the operation's parameters and request body.

use serde_json::{Map, Value};

use crate::entity::{Entity, EntityContext};
use crate::error::CompileError;
use crate::naming::sanitize_capture_name;
use crate::plugins::{restamp, VALIDATOR_PLUGIN};
use crate::schema::{extract_schema, JSON_SCHEMA_VERSION};
use crate::spec_parser::{Document, Parameter, RequestBody};

/// Generate the request validator for an operation.
///
/// Returns `None` when no validator template is in scope, or when there is
/// nothing to validate.
pub fn generate_validator_plugin(
    template: Option<&Entity>,
    params: &[Parameter],
    request_body: Option<&RequestBody>,
    doc: &Document,
    base_name: &str,
    inso_compat: bool,
    ctx: &EntityContext,
) -> Result<Option<Entity>, CompileError> {
    let Some(template) = template else {
        return Ok(None);
    };

    let mut plugin = template.clone();
    plugin.insert("name".into(), Value::String(VALIDATOR_PLUGIN.to_string()));
    let mut plugin = restamp(&plugin, base_name, ctx);

    let mut config = match plugin.remove("config") {
        Some(Value::Object(config)) => config,
        _ => Map::new(),
    };

    if !config.contains_key("parameter_schema") {
        let entries = params
            .iter()
            .map(|param| parameter_entry(doc, param, inso_compat))
            .collect::<Result<Vec<_>, _>>()?;
        if !entries.is_empty() {
            config.insert("parameter_schema".into(), Value::Array(entries));
        }
    }

    if !config.contains_key("body_schema") {
        let schema = request_body
            .and_then(json_media_schema)
            .map(|schema| extract_schema(doc, Some(schema)))
            .transpose()?
            .unwrap_or_default();
        if !schema.is_empty() {
            config.insert("body_schema".into(), Value::String(schema));
        }
    }

    let has_params = config.contains_key("parameter_schema");
    let has_body = config.contains_key("body_schema");
    if !has_params && !has_body {
        if !config.contains_key("allowed_content_types") {
            return Ok(None);
        }
        // an empty body schema still activates the content-type check
        config.insert("body_schema".into(), Value::String("{}".into()));
    }
    config.insert(
        "version".into(),
        Value::String(JSON_SCHEMA_VERSION.to_string()),
    );

    if !config.contains_key("allowed_content_types") {
        if let Some(body) = request_body.filter(|b| !b.content.is_empty()) {
            // content is a BTreeMap, so the media types come out sorted
            let types = body.content.keys().cloned().map(Value::String).collect();
            config.insert("allowed_content_types".into(), Value::Array(types));
        }
    }

    plugin.insert("config".into(), Value::Object(config));
    Ok(Some(plugin))
}

fn parameter_entry(
    doc: &Document,
    param: &Parameter,
    inso_compat: bool,
) -> Result<Value, CompileError> {
    let (name, default_style) = match param.location.as_str() {
        "path" => (sanitize_capture_name(&param.name, inso_compat), "simple"),
        "header" => (param.name.clone(), "simple"),
        _ => (param.name.clone(), "form"),
    };

    let mut entry = Map::new();
    entry.insert("in".into(), Value::String(param.location.clone()));
    entry.insert("name".into(), Value::String(name));
    entry.insert("required".into(), Value::Bool(param.required));
    entry.insert(
        "style".into(),
        Value::String(param.style.clone().unwrap_or_else(|| default_style.into())),
    );
    entry.insert("explode".into(), Value::Bool(param.explode.unwrap_or(false)));
    entry.insert(
        "schema".into(),
        Value::String(extract_schema(doc, param.schema.as_ref())?),
    );
    Ok(Value::Object(entry))
}

/// Schema of the first JSON media type (`application/json` or `*+json`).
fn json_media_schema(body: &RequestBody) -> Option<&Value> {
    body.content
        .iter()
        .find(|(media_type, _)| is_json_media_type(media_type))
        .and_then(|(_, content)| content.schema.as_ref())
}

fn is_json_media_type(media_type: &str) -> bool {
    let essence = media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}
