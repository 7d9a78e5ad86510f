use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// A parsed OpenAPI 3.x document.
///
/// The tree is kept untyped: the compiler only reads the handful of fields it
/// needs and copies `x-kong-*` payloads verbatim.
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) root: Map<String, Value>,
    /// The `openapi` version string (e.g. "3.0.3").
    pub(crate) version: String,
}

/// A parameter of an operation, after `$ref` resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name as declared.
    pub name: String,
    /// Location: "path", "query", "header" or "cookie".
    pub location: String,
    pub required: bool,
    /// Serialization style, if declared.
    pub style: Option<String>,
    /// Explode flag, if declared.
    pub explode: Option<bool>,
    /// Parameter schema. Schema `$ref`s are left in place.
    pub schema: Option<Value>,
}

/// Request body definition for an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    /// Media type -> schema. BTreeMap keeps media types sorted.
    pub content: BTreeMap<String, ContentSchema>,
}

/// Schema declared for one media type of a request body.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSchema {
    pub schema: Option<Value>,
}
