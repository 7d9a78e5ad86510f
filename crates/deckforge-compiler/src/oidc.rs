//! OpenID-Connect plugin synthesis from security requirements.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::warn;

use crate::entity::Entity;
use crate::error::CompileError;
use crate::extensions::{kong_object, SECURITY_OIDC};
use crate::spec_parser::Document;

/// Name of the authentication plugin generated for OpenID-Connect schemes.
pub const OIDC_PLUGIN: &str = "openid-connect";

/// Derive the OpenID-Connect plugin for a `security` requirement list.
///
/// Only a single requirement naming a single `openIdConnect` scheme is
/// supported. No requirements (or an empty requirement) keep `inherited`.
/// Any other shape fails, or keeps `inherited` when `ignore_errors` is set.
///
/// The returned plugin carries no identifier; each owning scope re-stamps it.
pub fn generate_oidc_defaults(
    requirements: Option<&Value>,
    doc: &Document,
    inherited: Option<&Entity>,
    ignore_errors: bool,
) -> Result<Option<Entity>, CompileError> {
    let unsupported = |reason: String| {
        if ignore_errors {
            warn!(reason = %reason, "ignoring unsupported security configuration");
            Ok(inherited.cloned())
        } else {
            Err(CompileError::UnsupportedSecurity(reason))
        }
    };

    let requirements = match requirements {
        None => return Ok(inherited.cloned()),
        Some(Value::Array(list)) => list,
        Some(_) => return unsupported("'security' must be an array".into()),
    };
    let requirement = match requirements.as_slice() {
        [] => return Ok(inherited.cloned()),
        [single] => single,
        _ => {
            return unsupported(format!(
                "only a single security requirement is supported, found {}",
                requirements.len()
            ))
        }
    };
    let Some(requirement) = requirement.as_object() else {
        return unsupported("security requirement must be an object".into());
    };

    let mut schemes = requirement.iter();
    let (scheme_name, required_scopes) = match (schemes.next(), schemes.next()) {
        (None, _) => return Ok(inherited.cloned()),
        (Some(entry), None) => entry,
        (Some(_), Some(_)) => {
            return unsupported(format!(
                "a security requirement may name only one scheme, found {}",
                requirement.len()
            ))
        }
    };

    let scheme = doc.security_scheme(scheme_name)?;
    let scheme_type = scheme.get("type").and_then(|v| v.as_str()).unwrap_or("");
    if scheme_type != "openIdConnect" {
        return unsupported(format!(
            "security scheme '{}' has type '{}', only 'openIdConnect' is supported",
            scheme_name, scheme_type
        ));
    }

    let mut plugin = kong_object(doc, scheme, SECURITY_OIDC)?.unwrap_or_default();
    let mut config = match plugin.remove("config") {
        Some(Value::Object(config)) => config,
        Some(_) => {
            return Err(CompileError::extension(
                SECURITY_OIDC,
                "expected 'config' to be a JSON object",
            ))
        }
        None => Map::new(),
    };

    let scopes: BTreeSet<String> = scope_list(config.get("scopes_required"))
        .chain(scope_list(Some(required_scopes)))
        .collect();
    config.insert(
        "scopes_required".into(),
        Value::Array(scopes.into_iter().map(Value::String).collect()),
    );

    if !config.contains_key("issuer") {
        if let Some(url) = scheme.get("openIdConnectUrl").and_then(|v| v.as_str()) {
            config.insert("issuer".into(), Value::String(url.to_string()));
        }
    }

    plugin.insert("name".into(), Value::String(OIDC_PLUGIN.to_string()));
    plugin.insert("config".into(), Value::Object(config));
    Ok(Some(plugin))
}

fn scope_list(value: Option<&Value>) -> impl Iterator<Item = String> + '_ {
    value
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter_map(|scope| scope.as_str().map(str::to_string))
}
