//! Compilation of an OpenAPI document into a declarative configuration.
//!
//! The document is walked once, depth-first: document, then each path (in
//! sorted order), then each operation (in sorted method order). Every scope
//! hands its cascade values down to its children. A scope that declares its
//! own service defaults, upstream defaults or servers gets a fresh service;
//! otherwise its routes attach to the closest enclosing service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::entity::{create_service, Entity, EntityContext, ScopeDefaults};
use crate::error::CompileError;
use crate::extensions::{
    kong_name, kong_object, kong_tags, ROUTE_DEFAULTS, SERVICE_DEFAULTS, UPSTREAM_DEFAULTS,
};
use crate::naming::{scoped_name, slugify};
use crate::oidc::generate_oidc_defaults;
use crate::options::CompileOptions;
use crate::plugins::{
    bubble_consumer_scoped_plugins, build_plugin_list, extract_validator_plugin, insert_plugin,
    restamp, sort_top_level_plugins,
};
use crate::route::{build_route_path, expand_header_routes};
use crate::spec_parser::{
    operations, parse_parameters, parse_request_body, parse_spec, servers_of, Document,
    ParseError,
};
use crate::validator::generate_validator_plugin;

/// Declarative configuration format version emitted.
pub const FORMAT_VERSION: &str = "3.0";

/// A compiled declarative configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarativeConfig {
    #[serde(rename = "_format_version")]
    pub format_version: String,
    /// Services, each with its nested `routes` and `plugins`.
    pub services: Vec<Entity>,
    pub upstreams: Vec<Entity>,
    /// Plugins that need more than one foreign key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<Entity>,
}

impl DeclarativeConfig {
    /// Total number of routes across all services.
    pub fn route_count(&self) -> usize {
        self.services
            .iter()
            .filter_map(|s| s.get("routes").and_then(|r| r.as_array()))
            .map(Vec::len)
            .sum()
    }
}

/// Parse and compile an OpenAPI document (YAML or JSON).
pub fn compile(input: &str, options: &CompileOptions) -> Result<DeclarativeConfig, CompileError> {
    let doc = parse_spec(input)?;
    compile_document(&doc, options)
}

/// Compile an already parsed OpenAPI document.
pub fn compile_document(
    doc: &Document,
    options: &CompileOptions,
) -> Result<DeclarativeConfig, CompileError> {
    if !options.ignore_circular_refs {
        if let Some(reference) = doc.find_circular_schema_ref() {
            return Err(ParseError::CircularRef(reference).into());
        }
    }

    let tags = match &options.tags {
        Some(tags) => tags.clone(),
        None => kong_tags(doc)?.unwrap_or_default(),
    };
    let base_name = document_name(doc, options)?;
    info!(
        name = %base_name,
        openapi = doc.version(),
        tags = ?tags,
        "compiling document"
    );

    let mut compilation = Compilation {
        doc,
        options,
        ctx: EntityContext::new(tags, options.uuid_namespace, options.skip_id),
        services: Vec::new(),
        top_level_plugins: Vec::new(),
    };

    let root = compilation.enter_document(base_name)?;
    for (path, path_item) in doc.paths()? {
        compilation.enter_path(&root, path, path_item)?;
    }

    Ok(compilation.finish(!doc.servers().is_empty()))
}

/// Document base name: option, then `x-kong-name`, then `info.title`.
///
/// A name with no sluggable characters is replaced by its name-based UUID.
/// Only a document with no name at all gets a random one.
fn document_name(doc: &Document, options: &CompileOptions) -> Result<String, CompileError> {
    let explicit = match options.doc_name.as_deref() {
        Some(name) => Some(name),
        None => kong_name(doc.root())?,
    };
    let fallback = match explicit.or_else(|| doc.title()) {
        Some(name) => {
            let slug = slugify(options.inso_compat, &[name]);
            if !slug.is_empty() {
                return Ok(slug);
            }
            Uuid::new_v5(&options.uuid_namespace, name.as_bytes())
        }
        None => Uuid::new_v4(),
    };
    Ok(slugify(options.inso_compat, &[&fallback.to_string()]))
}

/// A service with the upstream and routes that belong to it.
struct ServiceSlot {
    service: Entity,
    upstream: Option<Entity>,
    routes: Vec<Entity>,
}

/// Cascade values a scope hands to its children.
struct Scope {
    base_name: String,
    defaults: ScopeDefaults,
    servers: Vec<Value>,
    /// Index of the service routes in this scope attach to.
    service: usize,
    /// Complete plugin list in effect at this scope.
    plugins: Vec<Entity>,
    /// Plugins in effect here that the active service does not carry.
    pending: Vec<Entity>,
    /// Request validator template, if one was declared above.
    validator: Option<Entity>,
    /// Unstamped OpenID-Connect plugin in effect, if any.
    oidc: Option<Entity>,
}

struct Compilation<'a> {
    doc: &'a Document,
    options: &'a CompileOptions,
    ctx: EntityContext,
    services: Vec<ServiceSlot>,
    top_level_plugins: Vec<Entity>,
}

impl<'a> Compilation<'a> {
    fn enter_document(&mut self, base_name: String) -> Result<Scope, CompileError> {
        let doc = self.doc;
        let root = doc.root();

        let defaults = ScopeDefaults {
            service: kong_object(doc, root, SERVICE_DEFAULTS)?,
            upstream: kong_object(doc, root, UPSTREAM_DEFAULTS)?,
            route: kong_object(doc, root, ROUTE_DEFAULTS)?,
        };
        let servers = doc.servers().to_vec();

        let plugins = build_plugin_list(doc, root, &[], &base_name, &self.ctx)?;
        let (validator, mut plugins) = extract_validator_plugin(plugins, None);

        let oidc = if self.options.oidc {
            generate_oidc_defaults(
                doc.security(),
                doc,
                None,
                self.options.ignore_security_errors,
            )?
        } else {
            None
        };
        if let Some(oidc) = &oidc {
            insert_plugin(&mut plugins, restamp(oidc, &base_name, &self.ctx));
        }

        let service = self.add_service(&base_name, &servers, &defaults, plugins.clone())?;
        Ok(Scope {
            base_name,
            defaults,
            servers,
            service,
            plugins,
            pending: Vec::new(),
            validator,
            oidc,
        })
    }

    fn enter_path(
        &mut self,
        parent: &Scope,
        path: &str,
        path_item: &Map<String, Value>,
    ) -> Result<(), CompileError> {
        let name = kong_name(path_item)?.unwrap_or(path);
        let scope = self.enter_scope(parent, path_item, name)?;

        for (method, operation) in operations(path, path_item)? {
            self.enter_operation(&scope, path, path_item, method, operation)?;
        }
        Ok(())
    }

    fn enter_operation(
        &mut self,
        parent: &Scope,
        path: &str,
        path_item: &Map<String, Value>,
        method: &str,
        operation: &Map<String, Value>,
    ) -> Result<(), CompileError> {
        let doc = self.doc;
        let inso_compat = self.options.inso_compat;

        let name = kong_name(operation)?
            .or_else(|| operation.get("operationId").and_then(|v| v.as_str()))
            .unwrap_or(method);
        let scope = self.enter_scope(parent, operation, name)?;

        let params = parse_parameters(doc, path_item, operation)?;
        let request_body = parse_request_body(doc, operation)?;

        let mut route_plugins = scope.pending.clone();

        if self.options.oidc && operation.contains_key("security") {
            let oidc = generate_oidc_defaults(
                operation.get("security"),
                doc,
                scope.oidc.as_ref(),
                self.options.ignore_security_errors,
            )?;
            if oidc != scope.oidc {
                if let Some(oidc) = &oidc {
                    insert_plugin(&mut route_plugins, restamp(oidc, &scope.base_name, &self.ctx));
                }
            }
        }

        if let Some(validator) = generate_validator_plugin(
            scope.validator.as_ref(),
            &params,
            request_body.as_ref(),
            doc,
            &scope.base_name,
            inso_compat,
            &self.ctx,
        )? {
            insert_plugin(&mut route_plugins, validator);
        }

        let mut route = scope.defaults.route.clone().unwrap_or_default();
        let default_priority = route.get("regex_priority").and_then(|v| v.as_i64());
        let route_path = build_route_path(path, &params, doc, inso_compat, default_priority)?;

        self.ctx.stamp(&mut route, &scope.base_name, "route");
        route.insert("name".into(), Value::String(scope.base_name.clone()));
        route.insert(
            "methods".into(),
            Value::Array(vec![Value::String(method.to_ascii_uppercase())]),
        );
        route.insert(
            "paths".into(),
            Value::Array(vec![Value::String(route_path.regex)]),
        );
        route.insert("regex_priority".into(), Value::from(route_path.priority));
        route.entry("strip_path").or_insert(Value::Bool(false));

        let routes =
            expand_header_routes(route, &params, doc, inso_compat, &scope.base_name, &self.ctx)?;
        for mut route in routes {
            let route_name = route
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or(&scope.base_name)
                .to_string();
            let plugins: Vec<Entity> = route_plugins
                .iter()
                .map(|plugin| restamp(plugin, &route_name, &self.ctx))
                .collect();
            let fk = self.foreign_key(&route);
            let plugins =
                bubble_consumer_scoped_plugins(&mut self.top_level_plugins, plugins, "route", &fk);
            route.insert("plugins".into(), entity_array(plugins));

            debug!(route = %route_name, method = %method, path = %path, "created route");
            self.services[scope.service].routes.push(route);
        }
        Ok(())
    }

    /// Compute the cascade for a path or operation scope.
    fn enter_scope(
        &mut self,
        parent: &Scope,
        scope_obj: &Map<String, Value>,
        name: &str,
    ) -> Result<Scope, CompileError> {
        let doc = self.doc;
        let base_name = scoped_name(self.options.inso_compat, &parent.base_name, name);

        let own_service = kong_object(doc, scope_obj, SERVICE_DEFAULTS)?;
        let own_upstream = kong_object(doc, scope_obj, UPSTREAM_DEFAULTS)?;
        let own_route = kong_object(doc, scope_obj, ROUTE_DEFAULTS)?;
        let own_servers = servers_of(scope_obj);
        let needs_service =
            own_service.is_some() || own_upstream.is_some() || !own_servers.is_empty();

        let defaults = ScopeDefaults {
            service: own_service.or_else(|| parent.defaults.service.clone()),
            upstream: own_upstream.or_else(|| parent.defaults.upstream.clone()),
            route: own_route.or_else(|| parent.defaults.route.clone()),
        };
        let servers = if own_servers.is_empty() {
            parent.servers.clone()
        } else {
            own_servers.to_vec()
        };

        let plugins = build_plugin_list(doc, scope_obj, &parent.plugins, &base_name, &self.ctx)?;
        let (validator, plugins) = extract_validator_plugin(plugins, parent.validator.clone());

        let (service, pending) = if needs_service {
            debug!(scope = %base_name, "scope declares its own service, upstream or servers");
            let service = self.add_service(&base_name, &servers, &defaults, plugins.clone())?;
            (service, Vec::new())
        } else {
            let pending =
                build_plugin_list(doc, scope_obj, &parent.pending, &base_name, &self.ctx)?;
            let (_, pending) = extract_validator_plugin(pending, None);
            (parent.service, pending)
        };

        Ok(Scope {
            base_name,
            defaults,
            servers,
            service,
            plugins,
            pending,
            validator,
            oidc: parent.oidc.clone(),
        })
    }

    /// Create a service (and upstream) carrying `plugins`; returns its index.
    fn add_service(
        &mut self,
        base_name: &str,
        servers: &[Value],
        defaults: &ScopeDefaults,
        plugins: Vec<Entity>,
    ) -> Result<usize, CompileError> {
        let (mut service, upstream) = create_service(base_name, servers, defaults, &self.ctx)?;

        let fk = self.foreign_key(&service);
        let plugins =
            bubble_consumer_scoped_plugins(&mut self.top_level_plugins, plugins, "service", &fk);
        service.insert("plugins".into(), entity_array(plugins));

        debug!(
            service = %base_name,
            upstream = upstream.is_some(),
            "created service"
        );
        self.services.push(ServiceSlot {
            service,
            upstream,
            routes: Vec::new(),
        });
        Ok(self.services.len() - 1)
    }

    /// Foreign-key value for an owner: its `id`, or its `name` without ids.
    fn foreign_key(&self, owner: &Entity) -> Value {
        let key = if self.ctx.skip_id { "name" } else { "id" };
        owner.get(key).cloned().unwrap_or(Value::Null)
    }

    /// Assemble the output document.
    ///
    /// The document service is dropped when the document declares no servers,
    /// other services exist and no route attached to it.
    fn finish(self, document_has_servers: bool) -> DeclarativeConfig {
        let mut slots = self.services;
        let mut plugins = self.top_level_plugins;

        let drop_document_service =
            !document_has_servers && slots.len() > 1 && slots[0].routes.is_empty();
        if drop_document_service {
            let dropped = slots.remove(0);
            let key = if self.ctx.skip_id { "name" } else { "id" };
            let fk = dropped.service.get(key).cloned().unwrap_or(Value::Null);
            plugins.retain(|plugin| plugin.get("service") != Some(&fk));
            debug!(
                service = ?dropped.service.get("name"),
                "dropping unused document service"
            );
        }

        let mut services = Vec::with_capacity(slots.len());
        let mut upstreams = Vec::new();
        for slot in slots {
            let mut service = slot.service;
            service.insert("routes".into(), entity_array(slot.routes));
            services.push(service);
            upstreams.extend(slot.upstream);
        }

        services.sort_by(|a, b| entity_name(a).cmp(entity_name(b)));
        upstreams.sort_by(|a, b| entity_name(a).cmp(entity_name(b)));
        sort_top_level_plugins(&mut plugins);

        info!(
            services = services.len(),
            upstreams = upstreams.len(),
            plugins = plugins.len(),
            "compiled document"
        );

        DeclarativeConfig {
            format_version: FORMAT_VERSION.to_string(),
            services,
            upstreams,
            plugins,
        }
    }
}

fn entity_name(entity: &Entity) -> &str {
    entity.get("name").and_then(|v| v.as_str()).unwrap_or("")
}

fn entity_array(entities: Vec<Entity>) -> Value {
    Value::Array(entities.into_iter().map(Value::Object).collect())
}
