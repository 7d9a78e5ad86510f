use thiserror::Error;

use crate::spec_parser::ParseError;

/// Errors produced during compilation.
///
/// Any of these aborts the whole compilation; no partial output is returned.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Document parsing failed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// E2001: An `x-kong-*` extension has the wrong shape.
    #[error("E2001: invalid extension '{key}': {reason}")]
    InvalidExtension { key: String, reason: String },

    /// E2002: A `$ref` inside an `x-kong-*` extension is dangling or points
    /// outside `#/components/x-kong/`.
    #[error("E2002: invalid x-kong reference '{reference}': {reason}")]
    InvalidKongRef { reference: String, reason: String },

    /// E2003: A server URL could not be parsed.
    #[error("E2003: failed to parse server url '{url}': {reason}")]
    InvalidServerUrl { url: String, reason: String },

    /// E2004: Path template syntax error.
    #[error("E2004: invalid path template: {0}")]
    InvalidPathTemplate(String),

    /// E2005: Sanitized path-parameter name exceeds the capture-name limit.
    #[error("E2005: path parameter '{name}' in '{path}' yields capture name '{capture}' longer than {max} characters")]
    CaptureNameTooLong {
        name: String,
        path: String,
        capture: String,
        max: usize,
    },

    /// E2006: Security requirement shape is not supported.
    #[error("E2006: unsupported security configuration: {0}")]
    UnsupportedSecurity(String),

    /// E2007: `x-kong-name` or `x-kong-tags` has the wrong type.
    #[error("E2007: invalid {key}: {reason}")]
    InvalidDirective { key: String, reason: String },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompileError {
    pub(crate) fn extension(key: impl Into<String>, reason: impl Into<String>) -> Self {
        CompileError::InvalidExtension {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn kong_ref(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        CompileError::InvalidKongRef {
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}
