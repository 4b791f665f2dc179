/// Errors that can occur while preparing a schema for validation.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// No dialect is registered for the schema's type.
    #[error("unsupported schema type: {0}")]
    UnsupportedKind(String),

    /// The schema body is not valid JSON.
    #[error("schema body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The schema could not be compiled.
    #[error("failed to compile schema: {0}")]
    CompileFailed(String),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
