//! Schema registry and validation gateway.
//!
//! - [`SchemaCache`] mirrors the backing store through its change feed
//! - [`RegistrationService`] handles `REGISTER`, `UPDATE`, `UNREGISTER` and `GET`
//! - [`Dispatcher`] validates `VALIDATE.<subject>` messages and forwards them
//! - [`Gateway`] wires all three to a [`Transport`]
//!
//! Registration writes go to the store only. The cache learns about them
//! from the change feed, so a schema becomes enforceable shortly after its
//! registration is acknowledged, not at the same instant.

pub mod bus;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod server;
pub mod service;
pub mod transport;

pub use bus::MemoryBus;
pub use cache::{CacheSync, SchemaCache};
pub use config::GatewayConfig;
pub use dispatch::Dispatcher;
pub use error::{RegistryError, Result, TransportError};
pub use message::{Headers, Message};
pub use server::{Gateway, GatewayHandle};
pub use service::RegistrationService;
pub use transport::{Subscription, Transport};
