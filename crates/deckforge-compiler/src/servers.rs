//! Server URL resolution.
//!
//! Turns an OpenAPI `servers` block into concrete targets: template
//! variables take their declared defaults, and missing host, scheme or port
//! are filled in from conventions.

use serde_json::Value;

use crate::error::CompileError;

/// A resolved server URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTarget {
    /// Lowercase scheme, if known.
    pub scheme: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Never empty; at least `/`.
    pub path: String,
}

impl ServerTarget {
    /// Target used when no servers are declared.
    fn root() -> Self {
        Self {
            scheme: None,
            host: None,
            port: None,
            path: "/".to_string(),
        }
    }

    /// Host name without port.
    pub fn hostname(&self) -> &str {
        self.host.as_deref().unwrap_or("localhost")
    }

    /// `host:port`, or just the host when the port is unknown.
    pub fn authority(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.hostname(), port),
            None => self.hostname().to_string(),
        }
    }
}

/// Parse a `servers` block into targets.
///
/// An empty block yields a single `/` target.
pub fn parse_servers(servers: &[Value]) -> Result<Vec<ServerTarget>, CompileError> {
    if servers.is_empty() {
        return Ok(vec![ServerTarget::root()]);
    }
    servers.iter().map(parse_server).collect()
}

fn parse_server(server: &Value) -> Result<ServerTarget, CompileError> {
    let template = server.get("url").and_then(|v| v.as_str()).ok_or_else(|| {
        CompileError::InvalidServerUrl {
            url: server.to_string(),
            reason: "server entry has no 'url' string".into(),
        }
    })?;
    let url = substitute_variables(template, server.get("variables"));

    let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| {
        CompileError::InvalidServerUrl {
            url: url.clone(),
            reason: e.to_string(),
        }
    })?;

    let path = match uri.path() {
        "" => "/".to_string(),
        path => path.to_string(),
    };

    Ok(ServerTarget {
        scheme: uri.scheme_str().map(|s| s.to_ascii_lowercase()),
        host: uri.host().map(|h| h.to_string()),
        port: uri.port_u16(),
        path,
    })
}

/// Replace `{name}` placeholders with each variable's `default`.
fn substitute_variables(template: &str, variables: Option<&Value>) -> String {
    let Some(variables) = variables.and_then(|v| v.as_object()) else {
        return template.to_string();
    };
    variables
        .iter()
        .filter_map(|(name, var)| {
            let default = match var.get("default")? {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((name, default))
        })
        .fold(template.to_string(), |url, (name, default)| {
            url.replace(&format!("{{{}}}", name), &default)
        })
}

/// Fill in host, scheme and port where they can be inferred.
///
/// Hosts default to `localhost`. A missing scheme is taken from a well-known
/// port (80/443), else `fallback_scheme`. A missing port is taken from an
/// http/https scheme.
pub fn apply_default_scheme(targets: &mut [ServerTarget], fallback_scheme: &str) {
    for target in targets {
        if target.host.is_none() {
            target.host = Some("localhost".to_string());
        }
        if target.scheme.is_none() {
            let scheme = match target.port {
                Some(80) => "http",
                Some(443) => "https",
                _ => fallback_scheme,
            };
            target.scheme = Some(scheme.to_string());
        }
        if target.port.is_none() {
            target.port = match target.scheme.as_deref() {
                Some("http") => Some(80),
                Some("https") => Some(443),
                _ => None,
            };
        }
    }
}
