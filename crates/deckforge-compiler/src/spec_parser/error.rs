use thiserror::Error;

/// Errors produced while reading an OpenAPI document (E1001–E1005).
#[derive(Debug, Error)]
pub enum ParseError {
    /// E1001: File is not an OpenAPI document.
    #[error("E1001: not an OpenAPI document (missing 'openapi' version field)")]
    UnknownFormat,

    /// E1002: YAML/JSON parse error.
    #[error("E1002: parse error: {0}")]
    ParseError(String),

    /// E1003: Unresolved $ref.
    #[error("E1003: unresolved $ref: {0}")]
    UnresolvedRef(String),

    /// E1004: Structural error in the document.
    #[error("E1004: schema validation error: {0}")]
    SchemaError(String),

    /// E1005: Circular schema reference.
    #[error("E1005: circular $ref detected: {0}")]
    CircularRef(String),
}
