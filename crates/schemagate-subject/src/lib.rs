//! Hierarchical subject matching and API addressing.
//!
//! Subjects are dot-delimited token sequences such as `orders.eu.created`.
//! Patterns may contain two wildcard tokens:
//! - `*` matches exactly one token
//! - `>` matches all remaining tokens
//!
//! This is the lowest layer of schemagate. It has no state and no I/O.

pub mod endpoint;
pub mod error;
pub mod matcher;

pub use endpoint::{Endpoint, Operation, DEFAULT_API_PREFIX};
pub use error::{Result, SubjectError};
pub use matcher::{
    is_literal, matches, strip_prefix, tokens, validate, validate_literal,
    Specificity, FULL_WILDCARD, SEPARATOR, SINGLE_WILDCARD,
};
