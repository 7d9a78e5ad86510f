//! Plugin lists per scope.
//!
//! Every scope owns a name-sorted list holding at most one plugin per name.
//! Lists cascade: a child scope starts from a copy of its parent's list and
//! its own `x-kong-plugin-<name>` directives override by name.

use serde_json::{Map, Value};

use crate::entity::{Entity, EntityContext};
use crate::error::CompileError;
use crate::extensions::{kong_object, PLUGIN_PREFIX};
use crate::spec_parser::Document;

/// Name of the request validation plugin.
pub const VALIDATOR_PLUGIN: &str = "request-validator";

/// Foreign keys a plugin may carry besides its owner nesting.
const FOREIGN_KEYS: &[&str] = &["service", "route"];

/// Name of a plugin entity, or `""` when unset.
pub fn plugin_name(plugin: &Entity) -> &str {
    plugin.get("name").and_then(|v| v.as_str()).unwrap_or("")
}

/// Re-derive a plugin's identifier and tags for a new owning scope.
pub fn restamp(plugin: &Entity, base_name: &str, ctx: &EntityContext) -> Entity {
    let mut plugin = plugin.clone();
    let suffix = format!("plugin.{}", plugin_name(&plugin));
    ctx.stamp(&mut plugin, base_name, &suffix);
    plugin
}

/// Build the plugin list for a scope.
///
/// `inherited` entries are re-stamped under `base_name`; the scope's own
/// `x-kong-plugin-*` directives are added on top, replacing inherited plugins
/// of the same name.
pub fn build_plugin_list(
    doc: &Document,
    scope: &Map<String, Value>,
    inherited: &[Entity],
    base_name: &str,
    ctx: &EntityContext,
) -> Result<Vec<Entity>, CompileError> {
    let mut list: Vec<Entity> = inherited
        .iter()
        .map(|plugin| restamp(plugin, base_name, ctx))
        .collect();
    list.sort_by(|a, b| plugin_name(a).cmp(plugin_name(b)));

    for key in scope.keys().filter(|k| k.starts_with(PLUGIN_PREFIX)) {
        let name = &key[PLUGIN_PREFIX.len()..];
        if name.is_empty() {
            return Err(CompileError::extension(key.as_str(), "missing plugin name"));
        }
        let Some(mut plugin) = kong_object(doc, scope, key)? else {
            continue;
        };
        for fk in FOREIGN_KEYS {
            plugin.remove(*fk);
        }
        plugin.insert("name".into(), Value::String(name.to_string()));
        let plugin = restamp(&plugin, base_name, ctx);

        insert_plugin(&mut list, plugin);
    }

    Ok(list)
}

/// Take the request validator out of `list`.
///
/// Returns the validator found in `list`, or `fallback` when there is none,
/// together with the remaining plugins.
pub fn extract_validator_plugin(
    list: Vec<Entity>,
    fallback: Option<Entity>,
) -> (Option<Entity>, Vec<Entity>) {
    let (validators, rest): (Vec<Entity>, Vec<Entity>) = list
        .into_iter()
        .partition(|plugin| plugin_name(plugin) == VALIDATOR_PLUGIN);
    (validators.into_iter().next().or(fallback), rest)
}

/// Insert `plugin` into a name-sorted list, replacing a plugin of the same name.
pub fn insert_plugin(list: &mut Vec<Entity>, plugin: Entity) {
    match list.binary_search_by(|p| plugin_name(p).cmp(plugin_name(&plugin))) {
        Ok(pos) => list[pos] = plugin,
        Err(pos) => list.insert(pos, plugin),
    }
}

/// Move consumer-scoped plugins out of `scoped` into `top_level`.
///
/// A plugin with a non-empty `consumer` needs two foreign keys, which only the
/// top-level plugin array can express. Moved plugins get `fk_field` set to
/// `fk_value`. Returns the plugins that stay with their owner.
pub fn bubble_consumer_scoped_plugins(
    top_level: &mut Vec<Entity>,
    scoped: Vec<Entity>,
    fk_field: &str,
    fk_value: &Value,
) -> Vec<Entity> {
    let mut remaining = Vec::with_capacity(scoped.len());
    for mut plugin in scoped {
        if has_consumer(&plugin) {
            plugin.insert(fk_field.to_string(), fk_value.clone());
            top_level.push(plugin);
        } else {
            remaining.push(plugin);
        }
    }
    remaining
}

fn has_consumer(plugin: &Entity) -> bool {
    match plugin.get("consumer") {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

/// Sort top-level plugins by name, service, route and consumer.
pub fn sort_top_level_plugins(plugins: &mut [Entity]) {
    plugins.sort_by_cached_key(|plugin| {
        ["name", "service", "route", "consumer"]
            .iter()
            .map(|key| match plugin.get(*key) {
                None => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect::<Vec<_>>()
    });
}
