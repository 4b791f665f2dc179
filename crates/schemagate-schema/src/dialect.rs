use std::sync::Arc;

use crate::error::Result;

/// Outcome of validating one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    errors: Vec<String>,
}

impl Validation {
    pub fn valid() -> Self {
        Self::default()
    }

    pub fn from_errors(errors: Vec<String>) -> Self {
        Self { errors }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Individual error descriptions, empty when valid.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Error descriptions joined with `", "`.
    pub fn message(&self) -> String {
        self.errors.join(", ")
    }
}

/// A schema body compiled by its dialect.
pub trait CompiledSchema: Send + Sync {
    fn validate(&self, payload: &[u8]) -> Validation;
}

/// A validation rule language, selected by a schema's `type` field.
pub trait Dialect: Send + Sync {
    /// The `type` tag this dialect handles.
    fn kind(&self) -> &str;

    /// Compile a schema body.
    fn compile(&self, body: &str) -> Result<Arc<dyn CompiledSchema>>;
}
