/// Errors that can occur in backing store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A create-only write found a live value under the key.
    #[error("key already exists: {0}")]
    KeyExists(String),

    /// The key contains characters the store does not accept.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// The value exceeds the store's size limit.
    #[error("value too large for {key} ({size} bytes, max {max})")]
    ValueTooLarge { key: String, size: usize, max: usize },

    /// A stored value could not be decoded into a schema.
    #[error("failed to decode entry {key}: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },

    /// A schema could not be encoded for storage.
    #[error("failed to encode schema: {0}")]
    Encode(serde_json::Error),

    /// The store has been closed.
    #[error("store closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, StoreError>;
