use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{Result, StoreError};
use crate::kv::{validate_key, KeyValue, KvEntry, KvOperation, WatchEvent, Watcher};

/// Controls the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryKvConfig {
    /// Bucket name, used for logging only.
    pub bucket: String,
    /// Maximum bytes per value.
    pub max_value_size: usize,
}

impl Default for MemoryKvConfig {
    fn default() -> Self {
        Self {
            bucket: "schema_registry".to_string(),
            max_value_size: 1024 * 1024,
        }
    }
}

#[derive(Default)]
struct Bucket {
    sequence: u64,
    latest: BTreeMap<String, KvEntry>,
    watchers: Vec<mpsc::UnboundedSender<WatchEvent>>,
    closed: bool,
}

/// In-process [`KeyValue`] store.
///
/// Revisions come from one bucket-wide sequence, so they also keep growing
/// across delete and re-create of the same key. Every write is fanned out to
/// watchers while the bucket lock is held, which keeps the per-key feed order
/// equal to commit order.
pub struct MemoryKv {
    config: MemoryKvConfig,
    bucket: Mutex<Bucket>,
}

impl MemoryKv {
    /// Create an empty store with default config.
    pub fn new() -> Self {
        Self::with_config(MemoryKvConfig::default())
    }

    /// Create an empty store with explicit config.
    pub fn with_config(config: MemoryKvConfig) -> Self {
        Self {
            config,
            bucket: Mutex::new(Bucket::default()),
        }
    }

    /// Close the store: later operations fail and every change feed ends.
    pub fn close(&self) {
        let mut bucket = self.lock();
        bucket.closed = true;
        bucket.watchers.clear();
        tracing::debug!(bucket = %self.config.bucket, "memory kv closed");
    }

    /// Number of live watchers.
    pub fn watcher_count(&self) -> usize {
        let mut bucket = self.lock();
        bucket.watchers.retain(|tx| !tx.is_closed());
        bucket.watchers.len()
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self) -> Result<MutexGuard<'_, Bucket>> {
        let bucket = self.lock();
        if bucket.closed {
            return Err(StoreError::Closed);
        }
        Ok(bucket)
    }

    fn check_value(&self, key: &str, value: &Bytes) -> Result<()> {
        if value.len() > self.config.max_value_size {
            return Err(StoreError::ValueTooLarge {
                key: key.to_string(),
                size: value.len(),
                max: self.config.max_value_size,
            });
        }
        Ok(())
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

fn commit(bucket: &mut Bucket, key: &str, value: Bytes, operation: KvOperation) -> u64 {
    bucket.sequence += 1;
    let entry = KvEntry {
        key: key.to_string(),
        value,
        revision: bucket.sequence,
        operation,
    };
    bucket.latest.insert(key.to_string(), entry.clone());
    bucket
        .watchers
        .retain(|tx| tx.send(WatchEvent::Entry(entry.clone())).is_ok());
    entry.revision
}

fn is_live(entry: &KvEntry) -> bool {
    entry.operation == KvOperation::Put
}

#[async_trait]
impl KeyValue for MemoryKv {
    async fn create(&self, key: &str, value: Bytes) -> Result<u64> {
        validate_key(key)?;
        self.check_value(key, &value)?;
        let mut bucket = self.open()?;
        if bucket.latest.get(key).is_some_and(is_live) {
            return Err(StoreError::KeyExists(key.to_string()));
        }
        Ok(commit(&mut bucket, key, value, KvOperation::Put))
    }

    async fn put(&self, key: &str, value: Bytes) -> Result<u64> {
        validate_key(key)?;
        self.check_value(key, &value)?;
        let mut bucket = self.open()?;
        Ok(commit(&mut bucket, key, value, KvOperation::Put))
    }

    async fn get(&self, key: &str) -> Result<Option<KvEntry>> {
        validate_key(key)?;
        let bucket = self.open()?;
        Ok(bucket.latest.get(key).filter(|e| is_live(e)).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let mut bucket = self.open()?;
        commit(&mut bucket, key, Bytes::new(), KvOperation::Delete);
        Ok(())
    }

    async fn watch_all(&self) -> Result<Watcher> {
        let mut bucket = self.open()?;
        let (tx, rx) = mpsc::unbounded_channel();

        let mut replayed = 0usize;
        for entry in bucket.latest.values().filter(|e| is_live(e)) {
            // The receiver is still in scope, so sends cannot fail here.
            let _ = tx.send(WatchEvent::Entry(entry.clone()));
            replayed += 1;
        }
        let _ = tx.send(WatchEvent::InitialLoadDone);
        bucket.watchers.push(tx);

        tracing::debug!(bucket = %self.config.bucket, replayed, "watcher attached");
        Ok(Watcher::new(rx))
    }
}
