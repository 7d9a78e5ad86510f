use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use super::error::ParseError;
use super::model::{ContentSchema, Document, Parameter, RequestBody};

/// HTTP methods recognized in a path item, in alphabetical order.
const HTTP_METHODS: &[&str] = &[
    "delete", "get", "head", "options", "patch", "post", "put", "trace",
];

/// Longest `$ref` chain followed before giving up.
const MAX_REF_HOPS: usize = 32;

/// Parse an OpenAPI 3.x document from a YAML/JSON string.
pub fn parse_spec(input: &str) -> Result<Document, ParseError> {
    // Parse YAML (also handles JSON since JSON is valid YAML)
    let root: Value =
        serde_yaml::from_str(input).map_err(|e| ParseError::ParseError(e.to_string()))?;

    let Value::Object(root) = root else {
        return Err(ParseError::ParseError("document root must be an object".into()));
    };

    let version = detect_version(&root)?;

    match root.get("paths") {
        Some(Value::Object(_)) => {}
        Some(_) => {
            return Err(ParseError::SchemaError("'paths' must be an object".into()));
        }
        None => return Err(ParseError::SchemaError("missing '.paths' object".into())),
    }

    Ok(Document { root, version })
}

/// Check the `openapi` field and return the version string.
fn detect_version(root: &Map<String, Value>) -> Result<String, ParseError> {
    let Some(version) = root.get("openapi").and_then(|v| v.as_str()) else {
        return Err(ParseError::UnknownFormat);
    };
    if !version.starts_with("3.") {
        return Err(ParseError::SchemaError(format!(
            "unsupported OpenAPI version: {} (only 3.x supported)",
            version
        )));
    }
    Ok(version.to_string())
}

impl Document {
    /// The root object of the document.
    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    /// The `openapi` version string.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The `info.title` field, if present and non-empty.
    pub fn title(&self) -> Option<&str> {
        self.root
            .get("info")
            .and_then(|info| info.get("title"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Document-level `servers` entries (empty when absent).
    pub fn servers(&self) -> &[Value] {
        servers_of(&self.root)
    }

    /// Document-level `security` requirements, if declared.
    pub fn security(&self) -> Option<&Value> {
        self.root.get("security")
    }

    /// Path items sorted by path template.
    ///
    /// Keys that are not path templates (e.g. `x-` extensions on the Paths
    /// object) are skipped.
    pub fn paths(&self) -> Result<Vec<(&str, &Map<String, Value>)>, ParseError> {
        let Some(paths) = self.root.get("paths").and_then(|v| v.as_object()) else {
            return Err(ParseError::SchemaError("missing '.paths' object".into()));
        };

        let mut keys: Vec<&String> = paths.keys().filter(|k| k.starts_with('/')).collect();
        keys.sort();

        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            let item = self.resolve(&paths[key.as_str()])?;
            let obj = item.as_object().ok_or_else(|| {
                ParseError::SchemaError(format!("path item for '{}' must be an object", key))
            })?;
            items.push((key.as_str(), obj));
        }
        Ok(items)
    }

    /// Resolve a JSON Reference like `#/components/schemas/User` from the document root.
    ///
    /// Only local references (`#/...`) are supported. Returns `None` for external refs.
    pub fn resolve_ref(&self, ref_path: &str) -> Option<&Value> {
        let pointer = ref_path.strip_prefix("#/")?;
        let mut segments = pointer.split('/').map(unescape_pointer);
        let first = segments.next()?;
        let mut current = self.root.get(&first)?;
        for segment in segments {
            current = match current {
                Value::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
                other => other.get(&segment)?,
            };
        }
        Some(current)
    }

    /// Follow a `$ref` chain until a concrete value is reached.
    pub fn resolve<'a>(&'a self, value: &'a Value) -> Result<&'a Value, ParseError> {
        let mut current = value;
        for _ in 0..MAX_REF_HOPS {
            let Some(ref_str) = current.get("$ref").and_then(|v| v.as_str()) else {
                return Ok(current);
            };
            current = self
                .resolve_ref(ref_str)
                .ok_or_else(|| ParseError::UnresolvedRef(ref_str.to_string()))?;
        }
        Err(ParseError::CircularRef(format!(
            "reference chain longer than {} hops",
            MAX_REF_HOPS
        )))
    }

    /// Look up a security scheme by name under `components.securitySchemes`.
    pub fn security_scheme(&self, name: &str) -> Result<&Map<String, Value>, ParseError> {
        let pointer = format!("#/components/securitySchemes/{}", escape_pointer(name));
        let raw = self
            .resolve_ref(&pointer)
            .ok_or_else(|| ParseError::UnresolvedRef(pointer.clone()))?;
        self.resolve(raw)?.as_object().ok_or_else(|| {
            ParseError::SchemaError(format!("security scheme '{}' must be an object", name))
        })
    }

    /// Find a circular `$ref` among `components.schemas`.
    ///
    /// Returns the reference that closes the first cycle found, walking
    /// schemas in name order.
    pub fn find_circular_schema_ref(&self) -> Option<String> {
        let schemas = self
            .root
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(|s| s.as_object())?;

        let mut names: Vec<&String> = schemas.keys().collect();
        names.sort();

        let mut done = HashSet::new();
        for name in names {
            let ref_str = format!("#/components/schemas/{}", escape_pointer(name));
            if done.contains(&ref_str) {
                continue;
            }
            let mut chain = HashSet::from([ref_str.clone()]);
            if let Some(cycle) = self.walk_refs(&schemas[name.as_str()], &mut chain, &mut done) {
                return Some(cycle);
            }
            done.insert(ref_str);
        }
        None
    }

    /// Depth-first walk over every `$ref` reachable from `value`.
    ///
    /// `chain` holds the references on the current path, `done` the ones
    /// already proven acyclic.
    fn walk_refs(
        &self,
        value: &Value,
        chain: &mut HashSet<String>,
        done: &mut HashSet<String>,
    ) -> Option<String> {
        match value {
            Value::Object(obj) => {
                if let Some(ref_str) = obj.get("$ref").and_then(|v| v.as_str()) {
                    if chain.contains(ref_str) {
                        return Some(ref_str.to_string());
                    }
                    if !done.contains(ref_str) {
                        if let Some(target) = self.resolve_ref(ref_str) {
                            chain.insert(ref_str.to_string());
                            let found = self.walk_refs(target, chain, done);
                            chain.remove(ref_str);
                            if found.is_some() {
                                return found;
                            }
                        }
                        done.insert(ref_str.to_string());
                    }
                }
                obj.iter()
                    .filter(|(k, _)| k.as_str() != "$ref")
                    .find_map(|(_, v)| self.walk_refs(v, chain, done))
            }
            Value::Array(arr) => arr.iter().find_map(|v| self.walk_refs(v, chain, done)),
            _ => None,
        }
    }
}

/// `servers` entries of a document, path item or operation object.
pub fn servers_of(obj: &Map<String, Value>) -> &[Value] {
    obj.get("servers")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Operations of a path item, sorted by method name.
pub fn operations<'a>(
    path: &str,
    path_item: &'a Map<String, Value>,
) -> Result<Vec<(&'static str, &'a Map<String, Value>)>, ParseError> {
    let mut ops = Vec::new();
    for method in HTTP_METHODS {
        if let Some(op_value) = path_item.get(*method) {
            let op_obj = op_value.as_object().ok_or_else(|| {
                ParseError::SchemaError(format!(
                    "operation {} {} must be an object",
                    method.to_uppercase(),
                    path
                ))
            })?;
            ops.push((*method, op_obj));
        }
    }
    Ok(ops)
}

/// Parameters for an operation: path-level parameters merged with the
/// operation-level ones, which override by `(name, in)`.
pub fn parse_parameters(
    doc: &Document,
    path_item: &Map<String, Value>,
    operation: &Map<String, Value>,
) -> Result<Vec<Parameter>, ParseError> {
    let mut params = collect_parameters(doc, path_item)?;
    for param in collect_parameters(doc, operation)? {
        match params
            .iter_mut()
            .find(|p| p.name == param.name && p.location == param.location)
        {
            Some(existing) => *existing = param,
            None => params.push(param),
        }
    }
    Ok(params)
}

/// Parse the `parameters` array of a path item or operation object.
fn collect_parameters(
    doc: &Document,
    obj: &Map<String, Value>,
) -> Result<Vec<Parameter>, ParseError> {
    let Some(arr) = obj.get("parameters").and_then(|v| v.as_array()) else {
        return Ok(Vec::new());
    };

    let mut params = Vec::with_capacity(arr.len());
    for item in arr {
        let Some(param_obj) = doc.resolve(item)?.as_object() else {
            continue;
        };
        let Some(location) = param_obj.get("in").and_then(|v| v.as_str()) else {
            continue;
        };
        let Some(name) = param_obj.get("name").and_then(|v| v.as_str()) else {
            continue;
        };

        // Parameters may carry `content` instead of `schema`
        let schema = param_obj
            .get("schema")
            .cloned()
            .or_else(|| extract_content_schema(param_obj));

        params.push(Parameter {
            name: name.to_string(),
            location: location.to_string(),
            required: param_obj
                .get("required")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            style: param_obj
                .get("style")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            explode: param_obj.get("explode").and_then(|v| v.as_bool()),
            schema,
        });
    }
    Ok(params)
}

/// Extract schema from a parameter's `content` map (first media type entry).
fn extract_content_schema(param_obj: &Map<String, Value>) -> Option<Value> {
    let content = param_obj.get("content")?.as_object()?;
    let (_media_type, media_obj) = content.iter().next()?;
    media_obj.as_object()?.get("schema").cloned()
}

/// Parse request body from an operation object.
pub fn parse_request_body(
    doc: &Document,
    operation: &Map<String, Value>,
) -> Result<Option<RequestBody>, ParseError> {
    let Some(raw) = operation.get("requestBody") else {
        return Ok(None);
    };
    let Some(body) = doc.resolve(raw)?.as_object() else {
        return Ok(None);
    };

    let Some(content_obj) = body.get("content").and_then(|v| v.as_object()) else {
        return Ok(None);
    };

    let content = content_obj
        .iter()
        .map(|(media_type, media_obj)| {
            let schema = media_obj.as_object().and_then(|o| o.get("schema").cloned());
            (media_type.clone(), ContentSchema { schema })
        })
        .collect::<BTreeMap<_, _>>();

    Ok(Some(RequestBody { content }))
}

fn unescape_pointer(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
