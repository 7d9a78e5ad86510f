//! Library-level compilation tests over the shared fixtures.

use std::collections::HashSet;

use deckforge_compiler::naming::derive_id;
use deckforge_compiler::{compile, CompileOptions, Entity};
use serde_json::{json, Value};

use crate::{all_ids, compile_fixture, plugins, read_fixture, routes, service};

fn defaults() -> CompileOptions {
    CompileOptions::default()
}

fn named<'a>(entities: &[&'a Entity], name: &str) -> &'a Entity {
    entities
        .iter()
        .copied()
        .find(|e| e["name"] == name)
        .expect("entity with that name")
}

fn error_of(fixture: &str, options: &CompileOptions) -> String {
    compile_fixture(fixture, options).unwrap_err().to_string()
}

// ---------------------------------------------------------------------------
// Output shape
// ---------------------------------------------------------------------------

#[test]
fn petstore_compiles_to_one_service() {
    let config = compile_fixture("petstore.yaml", &defaults()).unwrap();

    assert_eq!(config.format_version, "3.0");
    assert_eq!(config.services.len(), 1);
    assert!(config.upstreams.is_empty());
    assert!(config.plugins.is_empty());

    let svc = service(&config, "pet-store").unwrap();
    assert_eq!(svc["host"], "petstore.example.com");
    assert_eq!(svc["port"], 443);
    assert_eq!(svc["protocol"], "https");
    assert_eq!(svc["path"], "/v1");
    assert_eq!(svc["tags"], json!(["petstore", "team-pets"]));

    let names: Vec<&str> = routes(svc)
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "pet-store_pets_listpets",
            "pet-store_pets_createpet",
            "pet-store_pets-petid_showpetbyid",
        ]
    );

    let show = named(&routes(svc), "pet-store_pets-petid_showpetbyid");
    assert_eq!(show["paths"], json!(["~/pets/(?<petid>[^#?/]+)$"]));
    assert_eq!(show["methods"], json!(["GET"]));
    assert_eq!(show["regex_priority"], 100);
    assert_eq!(show["strip_path"], false);
    assert_eq!(show["tags"], json!(["petstore", "team-pets"]));

    let svc_plugins = plugins(svc);
    assert_eq!(svc_plugins.len(), 1);
    assert_eq!(svc_plugins[0]["name"], "cors");
    assert_eq!(svc_plugins[0]["config"]["origins"], json!(["*"]));
}

#[test]
fn json_input_is_accepted() {
    let config = compile_fixture("petstore.json", &defaults()).unwrap();
    assert_eq!(config.services.len(), 1);
    assert_eq!(config.route_count(), 1);
}

#[test]
fn output_serializes_with_format_version_first() {
    let config = compile_fixture("petstore.yaml", &defaults()).unwrap();
    let yaml = serde_yaml::to_string(&config).unwrap();
    assert!(yaml.starts_with("_format_version: '3.0'"));
    assert!(!yaml.contains("\nplugins:"));
}

// ---------------------------------------------------------------------------
// Determinism and identifiers
// ---------------------------------------------------------------------------

const FIXTURES: &[&str] = &[
    "petstore.yaml",
    "cascade.yaml",
    "plugins.yaml",
    "headers.yaml",
    "validator.yaml",
    "unicode.yaml",
];

#[test]
fn compilation_is_deterministic() {
    for fixture in FIXTURES {
        let a = compile_fixture(fixture, &defaults()).unwrap();
        let b = compile_fixture(fixture, &defaults()).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap(),
            "{} is not deterministic",
            fixture
        );
    }
}

#[test]
fn identifiers_are_unique() {
    for fixture in FIXTURES {
        let config = compile_fixture(fixture, &defaults()).unwrap();
        let ids = all_ids(&config);
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(ids.len(), unique.len(), "duplicate ids in {}", fixture);
    }
}

#[test]
fn non_ascii_names_are_transliterated() {
    let config = compile_fixture("unicode.yaml", &defaults()).unwrap();
    assert_eq!(config.services.len(), 1);

    let names: Vec<&str> = routes(&config.services[0])
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    let unique: HashSet<&str> = names.iter().copied().collect();
    assert_eq!(names.len(), 3);
    assert_eq!(unique.len(), 3);
    assert!(names.iter().any(|n| n.ends_with("_cafe_get")));
    assert!(names.iter().any(|n| n.ends_with("_caf_get")));
    assert!(names.iter().any(|n| n.ends_with("_nandu-id_get")));
}

#[test]
fn tags_do_not_change_identifiers() {
    let plain = compile_fixture("cascade.yaml", &defaults()).unwrap();
    let tagged = compile_fixture("cascade.yaml", &defaults().with_tags(["other", "tags"])).unwrap();

    assert_eq!(all_ids(&plain), all_ids(&tagged));
    assert_eq!(tagged.services[0]["tags"], json!(["other", "tags"]));
}

#[test]
fn namespace_and_name_change_every_identifier() {
    let plain: HashSet<String> = all_ids(&compile_fixture("cascade.yaml", &defaults()).unwrap())
        .into_iter()
        .collect();

    let namespace = derive_id(&defaults().uuid_namespace, "custom", "namespace");
    let options = defaults().with_uuid_namespace(namespace.parse().unwrap());
    let other_namespace = all_ids(&compile_fixture("cascade.yaml", &options).unwrap());

    let options = defaults().with_doc_name("renamed");
    let other_name = all_ids(&compile_fixture("cascade.yaml", &options).unwrap());

    assert!(!other_namespace.is_empty());
    assert!(other_namespace.iter().all(|id| !plain.contains(id)));
    assert!(other_name.iter().all(|id| !plain.contains(id)));
}

#[test]
fn skip_id_removes_every_identifier() {
    let config = compile_fixture("plugins.yaml", &defaults().with_skip_id(true)).unwrap();
    assert!(all_ids(&config).is_empty());
    // foreign keys fall back to names
    assert_eq!(config.plugins[0]["route"], "plugins_vip_vip");
}

// ---------------------------------------------------------------------------
// Default cascade
// ---------------------------------------------------------------------------

#[test]
fn route_defaults_alone_reuse_the_parent_service() {
    let config = compile_fixture("cascade.yaml", &defaults()).unwrap();
    assert_eq!(config.services.len(), 4);

    let doc_service = service(&config, "cascade").unwrap();
    assert_eq!(doc_service["retries"], 3);

    let doc_routes = routes(doc_service);
    assert_eq!(doc_routes.len(), 2);
    let literal = named(&doc_routes, "cascade_route-only_get");
    let param = named(&doc_routes, "cascade_route-only-id_get");
    assert_eq!(literal["regex_priority"], 50);
    assert_eq!(param["regex_priority"], 49);
    // route defaults replace the document's
    assert!(!literal.contains_key("preserve_host"));
}

#[test]
fn service_defaults_create_a_new_service() {
    let config = compile_fixture("cascade.yaml", &defaults()).unwrap();

    let own = service(&config, "cascade_own-service").unwrap();
    assert_eq!(own["retries"], 7);
    assert_eq!(own["read_timeout"], 5000);
    assert_eq!(own["host"], "api.example.com");

    let own_routes = routes(own);
    assert_eq!(own_routes.len(), 1);
    assert_eq!(own_routes[0]["preserve_host"], true);
}

#[test]
fn multiple_servers_create_an_upstream() {
    let config = compile_fixture("cascade.yaml", &defaults()).unwrap();

    let balanced = service(&config, "cascade_balanced").unwrap();
    assert_eq!(balanced["host"], "cascade_balanced.upstream");
    assert_eq!(balanced["port"], 8443);
    assert_eq!(balanced["retries"], 3);

    assert_eq!(config.upstreams.len(), 1);
    let upstream = &config.upstreams[0];
    assert_eq!(upstream["name"], "cascade_balanced.upstream");
    assert_eq!(upstream["algorithm"], "least-connections");
    let targets: Vec<&Value> = upstream["targets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| &t["target"])
        .collect();
    assert_eq!(
        targets,
        vec![
            &json!("a.internal.example.com:8443"),
            &json!("b.internal.example.com:8443")
        ]
    );
}

#[test]
fn operation_servers_create_an_operation_service() {
    let config = compile_fixture("cascade.yaml", &defaults()).unwrap();

    let shared = service(&config, "cascade_shared_sharedget").unwrap();
    assert_eq!(shared["protocol"], "http");
    assert_eq!(shared["port"], 80);
    assert_eq!(shared["host"], "legacy.example.com");
    assert_eq!(shared["path"], "/api");
    assert_eq!(routes(shared).len(), 1);
}

// ---------------------------------------------------------------------------
// Plugins
// ---------------------------------------------------------------------------

#[test]
fn path_plugin_overrides_document_plugin() {
    let config = compile_fixture("plugins.yaml", &defaults()).unwrap();

    let doc_plugins = plugins(service(&config, "plugins").unwrap());
    assert_eq!(named(&doc_plugins, "rate-limiting")["config"]["minute"], 100);
    assert_eq!(
        named(&doc_plugins, "key-auth")["config"]["key_names"],
        json!(["apikey"])
    );

    let limited = service(&config, "plugins_limited").unwrap();
    let limited_plugins = plugins(limited);
    let rate_limits: Vec<_> = limited_plugins
        .iter()
        .filter(|p| p["name"] == "rate-limiting")
        .collect();
    assert_eq!(rate_limits.len(), 1);
    assert_eq!(rate_limits[0]["config"]["minute"], 5);
    assert_eq!(
        rate_limits[0]["id"],
        derive_id(&defaults().uuid_namespace, "plugins_limited", "plugin.rate-limiting")
    );

    // baked into the service, so not repeated on its route
    assert!(plugins(routes(limited)[0]).is_empty());
}

#[test]
fn consumer_plugins_bubble_to_the_top_level() {
    let config = compile_fixture("plugins.yaml", &defaults()).unwrap();

    let doc_service = service(&config, "plugins").unwrap();
    let vip = named(&routes(doc_service), "plugins_vip_vip");
    assert!(plugins(vip).is_empty());

    assert_eq!(config.plugins.len(), 1);
    let bubbled = &config.plugins[0];
    assert_eq!(bubbled["name"], "rate-limiting");
    assert_eq!(bubbled["consumer"], "alice");
    assert_eq!(bubbled["route"], vip["id"]);
    assert!(!bubbled.contains_key("service"));
}

#[test]
fn forbidden_kong_reference_is_rejected() {
    let err = error_of("invalid-kong-ref.yaml", &defaults());
    assert!(err.contains("E2002"), "{}", err);
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

#[test]
fn header_enums_expand_into_numbered_routes() {
    let config = compile_fixture("headers.yaml", &defaults()).unwrap();
    let svc = service(&config, "versioned").unwrap();
    let all = routes(svc);
    assert_eq!(all.len(), 2);

    let first = named(&all, "versioned_items_getitems_1");
    let second = named(&all, "versioned_items_getitems_2");
    assert_eq!(first["headers"], json!({"X-Api-Version": ["v1"]}));
    assert_eq!(second["headers"], json!({"X-Api-Version": ["v2"]}));
    assert_ne!(first["id"], second["id"]);

    let first_cors = plugins(first)[0];
    let second_cors = plugins(second)[0];
    assert_eq!(first_cors["name"], "cors");
    assert_ne!(first_cors["id"], second_cors["id"]);
    assert_eq!(
        first_cors["id"],
        derive_id(&defaults().uuid_namespace, "versioned_items_getitems_1", "plugin.cors")
    );
}

#[test]
fn inso_mode_uses_dashes() {
    let config = compile_fixture("headers.yaml", &defaults().with_inso_compat(true)).unwrap();
    let svc = service(&config, "versioned").unwrap();
    let names: Vec<&Value> = routes(svc).iter().map(|r| &r["name"]).collect();
    assert_eq!(
        names,
        vec![
            &json!("versioned-items-getitems-1"),
            &json!("versioned-items-getitems-2")
        ]
    );
}

#[test]
fn oversized_capture_name_is_rejected() {
    let yaml = format!(
        r#"
openapi: "3.0.3"
info:
  title: Long
paths:
  /things/{{{}}}:
    get: {{}}
"#,
        "a".repeat(40)
    );
    let err = compile(&yaml, &defaults()).unwrap_err().to_string();
    assert!(err.contains("E2005"), "{}", err);
}

// ---------------------------------------------------------------------------
// Request validation
// ---------------------------------------------------------------------------

#[test]
fn validator_is_generated_where_declared() {
    let config = compile_fixture("validator.yaml", &defaults()).unwrap();
    let svc = service(&config, "validated").unwrap();

    // templates never land on services
    assert!(plugins(svc).is_empty());

    let update = named(&routes(svc), "validated_users-user-id_updateuser");
    let validator = named(&plugins(update), "request-validator");
    let validator_config = &validator["config"];
    assert_eq!(validator_config["verbose_response"], true);
    assert_eq!(validator_config["version"], "draft4");
    assert_eq!(validator_config["allowed_content_types"], json!(["application/json"]));
    assert_eq!(validator_config["parameter_schema"][0]["name"], "user_id");
    assert_eq!(validator_config["parameter_schema"][0]["in"], "path");

    let body: Value =
        serde_json::from_str(validator_config["body_schema"].as_str().unwrap()).unwrap();
    assert_eq!(body["$ref"], "#/definitions/User");
    assert_eq!(
        body["definitions"]["User"]["properties"]["manager"]["$ref"],
        "#/definitions/Manager"
    );
    assert!(body["definitions"]["Manager"].is_object());

    // nothing to validate on /health
    let health = named(&routes(svc), "validated_health_health");
    assert!(plugins(health).is_empty());
}

#[test]
fn validation_is_opt_in() {
    let config = compile_fixture("petstore.yaml", &defaults()).unwrap();
    for svc in &config.services {
        for route in routes(svc) {
            assert!(plugins(route)
                .iter()
                .all(|p| p["name"] != "request-validator"));
        }
    }
}

#[test]
fn circular_schemas_require_opt_in() {
    let err = error_of("circular.yaml", &defaults());
    assert!(err.contains("E1005"), "{}", err);

    let config =
        compile_fixture("circular.yaml", &defaults().with_ignore_circular_refs(true)).unwrap();
    let svc = service(&config, "tree").unwrap();
    let route = routes(svc)[0];
    let validator = named(&plugins(route), "request-validator");
    let body: Value =
        serde_json::from_str(validator["config"]["body_schema"].as_str().unwrap()).unwrap();
    assert_eq!(
        body["definitions"]["Node"]["properties"]["children"]["items"]["$ref"],
        "#/definitions/Node"
    );
}

// ---------------------------------------------------------------------------
// Security
// ---------------------------------------------------------------------------

#[test]
fn security_is_ignored_without_the_option() {
    let config = compile_fixture("security.yaml", &defaults()).unwrap();
    let svc = service(&config, "secure").unwrap();
    assert!(plugins(svc).is_empty());
}

#[test]
fn unsupported_security_fails_when_generating() {
    let err = error_of("security.yaml", &defaults().with_oidc(true));
    assert!(err.contains("E2006"), "{}", err);
}

#[test]
fn openid_connect_plugins_follow_requirements() {
    let options = defaults()
        .with_oidc(true)
        .with_ignore_security_errors(true);
    let config = compile_fixture("security.yaml", &options).unwrap();
    let svc = service(&config, "secure").unwrap();

    let doc_oidc = named(&plugins(svc), "openid-connect");
    assert_eq!(doc_oidc["config"]["scopes_required"], json!(["read"]));
    assert_eq!(doc_oidc["config"]["auth_methods"], json!(["bearer"]));
    assert_eq!(
        doc_oidc["config"]["issuer"],
        "https://idp.example.com/.well-known/openid-configuration"
    );

    let all = routes(svc);
    let admin = named(&all, "secure_admin_admin");
    let admin_oidc = named(&plugins(admin), "openid-connect");
    assert_eq!(admin_oidc["config"]["scopes_required"], json!(["admin"]));

    // inherits the service plugin
    assert!(plugins(named(&all, "secure_public_public")).is_empty());
    assert!(plugins(named(&all, "secure_mixed_mixed")).is_empty());
}

// ---------------------------------------------------------------------------
// Input errors
// ---------------------------------------------------------------------------

#[test]
fn input_errors_abort_compilation() {
    assert!(error_of("invalid-missing-paths.yaml", &defaults()).contains("E1004"));
    assert!(error_of("invalid-server-url.yaml", &defaults()).contains("E2003"));

    let swagger = "swagger: \"2.0\"\npaths: {}\n";
    let err = compile(swagger, &defaults()).unwrap_err().to_string();
    assert!(err.contains("E1001"), "{}", err);
}

#[test]
fn fixtures_are_readable() {
    assert!(read_fixture("petstore.yaml").contains("openapi"));
}
