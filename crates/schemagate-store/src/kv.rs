use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{Result, StoreError};

/// What a committed write did to its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvOperation {
    Put,
    Delete,
}

/// A single committed revision of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvEntry {
    pub key: String,
    pub value: Bytes,
    /// Store-assigned, strictly increasing per key.
    pub revision: u64,
    pub operation: KvOperation,
}

/// Item delivered by a change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A committed write, replayed or live.
    Entry(KvEntry),
    /// Sent once, after every pre-existing key has been replayed.
    InitialLoadDone,
}

/// Receiving half of a change feed.
///
/// Events for a single key arrive in commit order. The feed ends (`next`
/// returns `None`) when the store drops its sending half.
#[derive(Debug)]
pub struct Watcher {
    updates: mpsc::UnboundedReceiver<WatchEvent>,
}

impl Watcher {
    /// Wrap the receiving end of a store's feed channel.
    pub fn new(updates: mpsc::UnboundedReceiver<WatchEvent>) -> Self {
        Self { updates }
    }

    /// Wait for the next event.
    pub async fn next(&mut self) -> Option<WatchEvent> {
        self.updates.recv().await
    }
}

/// Durable, versioned key/value store with a change feed.
#[async_trait]
pub trait KeyValue: Send + Sync {
    /// Write `value` only if `key` has no live value.
    ///
    /// Fails with [`StoreError::KeyExists`] otherwise. A key whose latest
    /// operation was a delete counts as absent.
    async fn create(&self, key: &str, value: Bytes) -> Result<u64>;

    /// Create or replace the value under `key`.
    async fn put(&self, key: &str, value: Bytes) -> Result<u64>;

    /// Latest live value under `key`.
    async fn get(&self, key: &str) -> Result<Option<KvEntry>>;

    /// Delete `key`, leaving a delete marker in the feed.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Subscribe to every key: replay, then [`WatchEvent::InitialLoadDone`], then live updates.
    async fn watch_all(&self) -> Result<Watcher>;
}

/// Keys are non-empty runs of `[A-Za-z0-9_\-=/.]`, with no empty `.` token.
pub fn validate_key(key: &str) -> Result<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '=' | '/' | '.');
    let well_formed = !key.is_empty()
        && key.chars().all(allowed)
        && !key.starts_with('.')
        && !key.ends_with('.')
        && !key.contains("..");
    if well_formed {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}
