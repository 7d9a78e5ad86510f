//! Test harness for the deckforge compiler and command line.
//!
//! Fixtures are shared OpenAPI documents under the workspace
//! `tests/fixtures` directory.

use std::path::PathBuf;

use deckforge_compiler::{compile, CompileError, CompileOptions, DeclarativeConfig, Entity};

#[cfg(test)]
mod cli;
#[cfg(test)]
mod compile;

/// Absolute path to the shared test fixtures directory.
pub fn fixtures() -> PathBuf {
    // CARGO_MANIFEST_DIR = .../crates/deckforge-test
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("crates/")
        .parent()
        .expect("workspace root")
        .join("tests/fixtures")
}

/// Contents of a fixture file.
pub fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixtures().join(name)).expect("fixture file should be readable")
}

/// Compile a fixture with `options`.
pub fn compile_fixture(
    name: &str,
    options: &CompileOptions,
) -> Result<DeclarativeConfig, CompileError> {
    compile(&read_fixture(name), options)
}

/// The service named `name`.
pub fn service<'a>(config: &'a DeclarativeConfig, name: &str) -> Option<&'a Entity> {
    config
        .services
        .iter()
        .find(|s| s.get("name").and_then(|n| n.as_str()) == Some(name))
}

/// Routes nested under `service`.
pub fn routes(service: &Entity) -> Vec<&Entity> {
    service
        .get("routes")
        .and_then(|r| r.as_array())
        .map(|routes| routes.iter().filter_map(|r| r.as_object()).collect())
        .unwrap_or_default()
}

/// Plugins nested under a service or route.
pub fn plugins(owner: &Entity) -> Vec<&Entity> {
    owner
        .get("plugins")
        .and_then(|p| p.as_array())
        .map(|plugins| plugins.iter().filter_map(|p| p.as_object()).collect())
        .unwrap_or_default()
}

/// Every `id` in the document, at any depth.
pub fn all_ids(config: &DeclarativeConfig) -> Vec<String> {
    fn walk(value: &serde_json::Value, ids: &mut Vec<String>) {
        match value {
            serde_json::Value::Object(obj) => {
                for (key, sub) in obj {
                    match (key.as_str(), sub) {
                        ("id", serde_json::Value::String(id)) => ids.push(id.clone()),
                        _ => walk(sub, ids),
                    }
                }
            }
            serde_json::Value::Array(arr) => arr.iter().for_each(|v| walk(v, ids)),
            _ => {}
        }
    }

    let mut ids = Vec::new();
    if let Ok(value) = serde_json::to_value(config) {
        walk(&value, &mut ids);
    }
    ids
}
