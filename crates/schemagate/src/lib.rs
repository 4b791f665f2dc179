//! Runtime schema gatekeeper for a publish/subscribe bus.
//!
//! schemagate keeps a registry of schemas in a key/value store, mirrors it
//! into a local cache through the store's change feed, and sits in front of
//! governed subjects: a payload sent to `$SCHEMA.VALIDATE.<subject>` is
//! checked against the schema whose pattern matches `<subject>` and, if it
//! passes, forwarded there with audit headers.
//!
//! # Crate Structure
//!
//! - [`subject`]: subject tokens, wildcard matching and API addresses
//! - [`store`]: schema records and the key/value contract
//! - [`schema`]: validation dialects
//! - [`registry`]: cache, registration service, dispatcher and gateway
//! - [`loader`]: reading `<name>.schema.json` files from a directory

pub mod loader;

/// Re-export subject types.
pub mod subject {
    pub use schemagate_subject::*;
}

/// Re-export store types.
pub mod store {
    pub use schemagate_store::*;
}

/// Re-export dialect types.
pub mod schema {
    pub use schemagate_schema::*;
}

/// Re-export registry types.
pub mod registry {
    pub use schemagate_registry::*;
}
