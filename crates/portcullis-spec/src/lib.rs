//! OpenAPI 3.0 / 3.1 specification model.
//!
//! Reads YAML/JSON documents into an immutable model: operations with their
//! parameters, bodies and responses, security schemes, and a schema arena.
//! Schema `$ref`s become arena ids, so self-referencing schemas are fine.
//! The model is `Send + Sync` and never mutated after loading.

pub mod error;
pub mod model;
pub mod parser;
pub mod schema;

pub use error::ParseError;
pub use model::{
    ApiKeyLocation, ApiSpec, MediaType, Operation, Parameter, ParameterLocation, ParameterStyle,
    RequestBody, Response, SecurityRequirement, SecurityScheme, Server, SpecVersion,
};
pub use parser::{parse_spec, parse_spec_file};
pub use schema::{AdditionalProperties, Discriminator, Schema, SchemaArena, SchemaId, SchemaType};
