use schemagate_schema::SchemaError;
use schemagate_store::StoreError;
use schemagate_subject::SubjectError;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The subject cannot be published or subscribed to.
    #[error("invalid subject: {0}")]
    InvalidSubject(#[from] SubjectError),

    /// A request found nobody subscribed to its subject.
    #[error("no responders for {0}")]
    NoResponders(String),

    /// A request got no reply in time.
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The transport has been shut down.
    #[error("transport closed")]
    Closed,
}

/// Errors surfaced by the registry, dispatcher and gateway.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The request body or address is malformed.
    #[error("invalid request: {0}")]
    InvalidInput(String),

    /// A schema with this name is already registered.
    #[error("schema already registered: {0}")]
    Conflict(String),

    /// No cached schema under this name.
    #[error("schema not found: {0}")]
    NotFound(String),

    /// No cached schema pattern matches the subject.
    #[error("could not find schema for subject {0:?}")]
    NoSchemaFound(String),

    /// The payload was rejected by the schema's dialect.
    #[error("invalid payload: {0}")]
    ValidationFailed(String),

    /// A stored schema has no usable dialect or does not compile.
    #[error("schema {name} cannot be used: {source}")]
    SchemaUnusable {
        name: String,
        #[source]
        source: SchemaError,
    },

    /// The backing store rejected or failed an operation.
    #[error("storage error: {0}")]
    StorageFailure(#[source] StoreError),

    /// A publish or reply could not be delivered.
    #[error("transport error: {0}")]
    TransportFailure(#[from] TransportError),

    /// A change feed entry could not be decoded into a schema.
    #[error("failed to decode change feed entry: {0}")]
    DecodeFailure(#[source] StoreError),
}

impl RegistryError {
    /// Numeric code carried in `Service-Error-Code` replies.
    pub fn code(&self) -> u16 {
        match self {
            RegistryError::InvalidInput(_) | RegistryError::ValidationFailed(_) => 400,
            RegistryError::NotFound(_) | RegistryError::NoSchemaFound(_) => 404,
            RegistryError::Conflict(_) => 409,
            RegistryError::SchemaUnusable { .. }
            | RegistryError::StorageFailure(_)
            | RegistryError::TransportFailure(_)
            | RegistryError::DecodeFailure(_) => 500,
        }
    }
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::KeyExists(name) => RegistryError::Conflict(name),
            StoreError::InvalidKey(_) | StoreError::ValueTooLarge { .. } => {
                RegistryError::InvalidInput(err.to_string())
            }
            other => RegistryError::StorageFailure(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
