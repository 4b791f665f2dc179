//! Schema records and the durable key/value contract behind schemagate.
//!
//! The backing store is an external collaborator. This crate defines what
//! schemagate needs from it ([`KeyValue`]): create-only and unconditional
//! writes that return a per-key revision, deletes, and a change feed that
//! replays existing keys before streaming live updates.
//!
//! [`MemoryKv`] is an in-process implementation used by tests and the CLI.

pub mod error;
pub mod kv;
pub mod memory;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use kv::{validate_key, KeyValue, KvEntry, KvOperation, WatchEvent, Watcher};
pub use memory::{MemoryKv, MemoryKvConfig};
pub use schema::{Schema, DEFAULT_KIND};
pub use store::SchemaStore;
