//! Service and upstream synthesis.
//!
//! Entities are untyped JSON objects: whatever the `x-kong-*-defaults`
//! directive provided is copied, then the computed fields are set on top.

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::CompileError;
use crate::naming::derive_id;
use crate::servers::{apply_default_scheme, parse_servers, ServerTarget};

/// A declarative-config entity (service, upstream, route, plugin or target).
pub type Entity = Map<String, Value>;

/// Per-document values stamped on every generated entity.
#[derive(Debug, Clone)]
pub struct EntityContext {
    pub tags: Vec<String>,
    pub namespace: Uuid,
    pub skip_id: bool,
}

impl EntityContext {
    pub fn new(tags: Vec<String>, namespace: Uuid, skip_id: bool) -> Self {
        Self {
            tags,
            namespace,
            skip_id,
        }
    }

    /// The tag set as a JSON array.
    pub fn tags_value(&self) -> Value {
        Value::Array(self.tags.iter().cloned().map(Value::String).collect())
    }

    /// Set `id` (unless identifiers are disabled) and `tags` on `entity`.
    pub fn stamp(&self, entity: &mut Entity, base_name: &str, suffix: &str) {
        if !self.skip_id {
            entity.insert(
                "id".into(),
                Value::String(derive_id(&self.namespace, base_name, suffix)),
            );
        }
        entity.insert("tags".into(), self.tags_value());
    }
}

/// Defaults JSON for the entity kinds that cascade through the scopes.
///
/// A child scope's own defaults replace its parent's, per kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeDefaults {
    pub service: Option<Entity>,
    pub upstream: Option<Entity>,
    pub route: Option<Entity>,
}

/// Create a service, plus an upstream when the targets call for one.
///
/// An upstream is created when the service defaults set no `host` and there
/// is either more than one target or upstream defaults were given.
pub fn create_service(
    base_name: &str,
    servers: &[Value],
    defaults: &ScopeDefaults,
    ctx: &EntityContext,
) -> Result<(Entity, Option<Entity>), CompileError> {
    let mut service = defaults.service.clone().unwrap_or_default();

    ctx.stamp(&mut service, base_name, "service");
    service.insert("name".into(), Value::String(base_name.to_string()));
    service.insert("plugins".into(), Value::Array(Vec::new()));
    service.insert("routes".into(), Value::Array(Vec::new()));

    let mut targets = parse_servers(servers)?;
    let fallback_scheme = service
        .get("protocol")
        .and_then(|v| v.as_str())
        .unwrap_or("https")
        .to_string();
    apply_default_scheme(&mut targets, &fallback_scheme);

    // parse_servers never returns an empty list
    let first = &targets[0];
    if !service.contains_key("protocol") {
        let scheme = first.scheme.clone().unwrap_or(fallback_scheme);
        service.insert("protocol".into(), Value::String(scheme));
    }
    if !service.contains_key("path") {
        service.insert("path".into(), Value::String(first.path.clone()));
    }
    if !service.contains_key("port") {
        let port = first.port.unwrap_or(match first.scheme.as_deref() {
            Some("http") => 80,
            _ => 443,
        });
        service.insert("port".into(), Value::from(port));
    }

    if service.contains_key("host") {
        return Ok((service, None));
    }

    if targets.len() == 1 && defaults.upstream.is_none() {
        service.insert("host".into(), Value::String(first.hostname().to_string()));
        return Ok((service, None));
    }

    let upstream = create_upstream(base_name, &targets, defaults.upstream.as_ref(), ctx);
    if let Some(name) = upstream.get("name") {
        service.insert("host".into(), name.clone());
    }
    Ok((service, Some(upstream)))
}

/// Create an upstream named `<base_name>.upstream`.
///
/// Targets declared in the defaults are kept as-is (tags re-stamped);
/// otherwise one target per server is generated.
pub fn create_upstream(
    base_name: &str,
    targets: &[ServerTarget],
    defaults: Option<&Entity>,
    ctx: &EntityContext,
) -> Entity {
    let mut upstream = defaults.cloned().unwrap_or_default();

    ctx.stamp(&mut upstream, base_name, "upstream");
    upstream.insert(
        "name".into(),
        Value::String(format!("{}.upstream", base_name)),
    );

    let target_list = match upstream.remove("targets") {
        Some(Value::Array(declared)) => declared
            .into_iter()
            .map(|target| match target {
                Value::Object(mut obj) => {
                    obj.insert("tags".into(), ctx.tags_value());
                    Value::Object(obj)
                }
                other => other,
            })
            .collect(),
        _ => targets
            .iter()
            .map(|target| {
                let mut obj = Map::new();
                obj.insert("target".into(), Value::String(target.authority()));
                obj.insert("tags".into(), ctx.tags_value());
                Value::Object(obj)
            })
            .collect(),
    };
    upstream.insert("targets".into(), Value::Array(target_list));

    upstream
}
