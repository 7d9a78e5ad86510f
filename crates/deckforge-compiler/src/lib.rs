//! Compiles OpenAPI 3.x documents into Kong declarative configuration.
//!
//! Reads `x-kong-*` directives at document, path and operation level,
//! cascades defaults and plugins through those scopes, and emits services,
//! routes, upstreams and plugins with deterministic content-derived ids.

pub mod compiler;
pub mod entity;
pub mod error;
pub mod extensions;
pub mod naming;
pub mod oidc;
pub mod options;
pub mod plugins;
pub mod route;
pub mod schema;
pub mod servers;
pub mod spec_parser;
pub mod validator;

pub use compiler::{compile, compile_document, DeclarativeConfig, FORMAT_VERSION};
pub use entity::{Entity, EntityContext};
pub use error::CompileError;
pub use options::CompileOptions;
pub use spec_parser::{parse_spec, Document, ParseError};
