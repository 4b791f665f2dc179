use std::fmt;
use std::io;

use schemagate::loader::LoadError;
use schemagate::registry::{RegistryError, TransportError};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => FAILURE,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn load_error(err: LoadError) -> CliError {
    match err {
        LoadError::Io { context, source } => io_error(&context, source),
        other => CliError::new(DATA_INVALID, other.to_string()),
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match err {
        TransportError::Timeout(_) => TIMEOUT,
        TransportError::InvalidSubject(_) => USAGE,
        TransportError::NoResponders(_) | TransportError::Closed => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn registry_error(context: &str, err: RegistryError) -> CliError {
    match err {
        RegistryError::TransportFailure(err) => transport_error(context, err),
        RegistryError::InvalidInput(_) | RegistryError::ValidationFailed(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        RegistryError::Conflict(_)
        | RegistryError::NotFound(_)
        | RegistryError::NoSchemaFound(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        RegistryError::SchemaUnusable { .. }
        | RegistryError::StorageFailure(_)
        | RegistryError::DecodeFailure(_) => {
            CliError::new(INTERNAL, format!("{context}: {err}"))
        }
    }
}
