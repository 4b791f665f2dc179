//! Payload validation dialects.
//!
//! A schema's `type` field selects a [`Dialect`]. The dialect compiles the
//! schema body once per revision and validates payloads against it. JSON
//! Schema (`jsonschema`) is the only dialect shipped; others plug in through
//! [`Dialects::with_dialect`] without touching the dispatcher.

pub mod config;
pub mod dialect;
pub mod error;
pub mod json;
pub mod registry;

pub use config::DialectConfig;
pub use dialect::{CompiledSchema, Dialect, Validation};
pub use error::{Result, SchemaError};
pub use json::JsonSchemaDialect;
pub use registry::Dialects;
