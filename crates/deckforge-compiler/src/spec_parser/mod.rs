//! OpenAPI 3.x front end.
//!
//! Reads YAML/JSON documents into an untyped tree and exposes the pieces the
//! compiler walks: paths, operations, parameters, request bodies, servers and
//! security schemes. Schema `$ref`s are preserved for the schema extractor.

mod error;
mod model;
mod parser;

pub use error::ParseError;
pub use model::{ContentSchema, Document, Parameter, RequestBody};
pub use parser::{operations, parse_parameters, parse_request_body, parse_spec, servers_of};
