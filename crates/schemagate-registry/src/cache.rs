use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use schemagate_schema::Dialects;
use schemagate_store::{KvEntry, KvOperation, Schema, SchemaStore, WatchEvent, Watcher};
use schemagate_subject::{matches, Specificity};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::error::{RegistryError, Result};

/// Local, concurrently readable view of every registered schema.
///
/// The only writer is the change feed task started by
/// [`SchemaCache::start_sync`]. Records are replaced whole, so readers see
/// either the previous or the next revision of a schema, never a mix.
#[derive(Debug, Default)]
pub struct SchemaCache {
    schemas: RwLock<BTreeMap<String, Arc<Schema>>>,
    dialects: Option<Arc<Dialects>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache that drops a schema's compiled validator from `dialects` when
    /// the schema is deleted.
    pub fn with_dialects(dialects: Arc<Dialects>) -> Self {
        Self {
            schemas: RwLock::default(),
            dialects: Some(dialects),
        }
    }

    /// Cached schema by name.
    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.read().get(name).cloned()
    }

    /// Every cached schema, ordered by name.
    pub fn snapshot(&self) -> Vec<Arc<Schema>> {
        self.read().values().cloned().collect()
    }

    /// The schema governing a literal subject.
    ///
    /// When several patterns match, the most specific one wins (see
    /// [`Specificity`]); equally specific patterns resolve to the smallest
    /// schema name.
    pub fn find_match(&self, subject: &str) -> Option<Arc<Schema>> {
        let schemas = self.read();
        let mut best: Option<(Specificity, &Arc<Schema>)> = None;
        // Names iterate in ascending order, so a strict comparison keeps the
        // smallest name among equals.
        for schema in schemas.values() {
            if !matches(subject, &schema.subject_pattern) {
                continue;
            }
            let specificity = Specificity::of(&schema.subject_pattern);
            if best.is_none_or(|(current, _)| specificity > current) {
                best = Some((specificity, schema));
            }
        }
        best.map(|(_, schema)| Arc::clone(schema))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Open the store's change feed and keep this cache in sync with it.
    ///
    /// Fails if the feed cannot be opened. Once running, bad entries are
    /// logged and skipped; the task ends when `cancel` fires or the feed
    /// closes. Entries already cached stay in place after it ends.
    pub async fn start_sync(
        self: &Arc<Self>,
        store: &SchemaStore,
        cancel: CancellationToken,
    ) -> Result<CacheSync> {
        let watcher = store.watch().await.map_err(RegistryError::StorageFailure)?;
        let (loaded_tx, loaded_rx) = watch::channel(false);

        let cache = Arc::clone(self);
        let task = tokio::spawn(async move { cache.consume(watcher, cancel, loaded_tx).await });

        Ok(CacheSync {
            task,
            loaded: loaded_rx,
        })
    }

    async fn consume(
        &self,
        mut watcher: Watcher,
        cancel: CancellationToken,
        loaded: watch::Sender<bool>,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("schema cache sync cancelled");
                    break;
                }
                event = watcher.next() => event,
            };

            match event {
                Some(WatchEvent::Entry(entry)) => {
                    if let Err(err) = self.apply(&entry) {
                        tracing::warn!(
                            key = %entry.key,
                            revision = entry.revision,
                            error = %err,
                            "skipping schema update"
                        );
                    }
                }
                Some(WatchEvent::InitialLoadDone) => {
                    tracing::info!(schemas = self.len(), "initial schema load complete");
                    loaded.send_replace(true);
                }
                None => {
                    tracing::info!("schema change feed closed");
                    break;
                }
            }
        }
    }

    /// Apply one committed entry. Returns true if the cache changed.
    pub(crate) fn apply(&self, entry: &KvEntry) -> Result<bool> {
        match entry.operation {
            KvOperation::Put => {
                let schema = SchemaStore::decode(entry).map_err(RegistryError::DecodeFailure)?;
                Ok(self.replace(schema))
            }
            KvOperation::Delete => Ok(self.remove(&entry.key, entry.revision)),
        }
    }

    /// Install a record unless a newer revision is already cached.
    pub(crate) fn replace(&self, schema: Schema) -> bool {
        let mut schemas = self.write();
        if let Some(current) = schemas.get(&schema.name) {
            if current.revision >= schema.revision {
                tracing::debug!(
                    schema = %schema.name,
                    cached = current.revision,
                    incoming = schema.revision,
                    "ignoring stale schema revision"
                );
                return false;
            }
        }
        tracing::info!(
            schema = %schema.name,
            revision = schema.revision,
            subject = %schema.subject_pattern,
            "loaded schema"
        );
        schemas.insert(schema.name.clone(), Arc::new(schema));
        true
    }

    /// Drop a record unless it is newer than the delete.
    pub(crate) fn remove(&self, name: &str, revision: u64) -> bool {
        let mut schemas = self.write();
        match schemas.get(name) {
            Some(current) if current.revision < revision => {
                schemas.remove(name);
                drop(schemas);
                if let Some(dialects) = &self.dialects {
                    dialects.evict(name);
                }
                tracing::info!(schema = %name, revision, "unloaded schema");
                true
            }
            _ => false,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Arc<Schema>>> {
        self.schemas.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Arc<Schema>>> {
        self.schemas.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle on a running cache sync task.
#[derive(Debug)]
pub struct CacheSync {
    task: JoinHandle<()>,
    loaded: watch::Receiver<bool>,
}

impl CacheSync {
    /// Wait until the store's existing schemas have been replayed.
    ///
    /// Returns false if the task ended before the replay finished.
    pub async fn initial_load(&self) -> bool {
        let mut loaded = self.loaded.clone();
        let done = loaded.wait_for(|done| *done).await.is_ok();
        done
    }

    pub fn is_loaded(&self) -> bool {
        *self.loaded.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to end. Cancel it first, or close the feed.
    pub async fn join(self) -> std::result::Result<(), JoinError> {
        self.task.await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use schemagate_store::{KeyValue, MemoryKv};

    use super::*;

    fn schema(name: &str, pattern: &str, revision: u64) -> Schema {
        Schema {
            name: name.to_string(),
            subject_pattern: pattern.to_string(),
            revision,
            kind: String::new(),
            body: r#"{"type":"number"}"#.to_string(),
        }
    }

    fn put_entry(name: &str, pattern: &str, revision: u64) -> KvEntry {
        KvEntry {
            key: name.to_string(),
            value: SchemaStore::encode(&schema(name, pattern, 0)).unwrap(),
            revision,
            operation: KvOperation::Put,
        }
    }

    fn delete_entry(name: &str, revision: u64) -> KvEntry {
        KvEntry {
            key: name.to_string(),
            value: Bytes::new(),
            revision,
            operation: KvOperation::Delete,
        }
    }

    async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !check() {
            if tokio::time::Instant::now() >= deadline {
                panic!("timed out waiting for {what}");
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[test]
    fn entry_revision_overrides_payload() {
        let cache = SchemaCache::new();
        let mut entry = put_entry("numbers", "numbers.>", 7);
        entry.value = Bytes::from_static(
            br#"{"name":"numbers","subject":"numbers.>","revision":1,"body":"{}"}"#,
        );
        assert!(cache.apply(&entry).unwrap());
        assert_eq!(cache.get("numbers").unwrap().revision, 7);
    }

    #[test]
    fn revisions_never_go_backwards() {
        let cache = SchemaCache::new();
        assert!(cache.apply(&put_entry("n", "n.>", 5)).unwrap());
        assert!(!cache.apply(&put_entry("n", "n.*", 3)).unwrap());
        assert!(!cache.apply(&put_entry("n", "n.*", 5)).unwrap());
        assert!(cache.apply(&put_entry("n", "n.*", 9)).unwrap());

        let cached = cache.get("n").unwrap();
        assert_eq!(cached.revision, 9);
        assert_eq!(cached.subject_pattern, "n.*");
    }

    #[test]
    fn delete_removes_entry_unless_stale() {
        let cache = SchemaCache::new();
        cache.apply(&put_entry("n", "n.>", 5)).unwrap();
        assert!(!cache.apply(&delete_entry("n", 4)).unwrap());
        assert!(cache.get("n").is_some());

        assert!(cache.apply(&delete_entry("n", 6)).unwrap());
        assert!(cache.get("n").is_none());
        assert!(!cache.apply(&delete_entry("missing", 7)).unwrap());
    }

    #[test]
    fn delete_evicts_compiled_validator() {
        let dialects = Arc::new(Dialects::default());
        let cache = SchemaCache::with_dialects(Arc::clone(&dialects));
        cache.apply(&put_entry("n", "n.>", 5)).unwrap();
        cache.apply(&put_entry("m", "m.>", 6)).unwrap();
        for name in ["n", "m"] {
            let schema = cache.get(name).unwrap();
            assert!(dialects.validate(&schema, b"1").unwrap().is_valid());
        }
        assert_eq!(dialects.compiled_count(), 2);

        assert!(!cache.apply(&delete_entry("n", 4)).unwrap());
        assert_eq!(dialects.compiled_count(), 2);

        assert!(cache.apply(&delete_entry("n", 7)).unwrap());
        assert_eq!(dialects.compiled_count(), 1);
        assert!(cache.get("m").is_some());
    }

    #[test]
    fn undecodable_entry_is_reported() {
        let cache = SchemaCache::new();
        let mut entry = put_entry("n", "n.>", 1);
        entry.value = Bytes::from_static(b"{oops");
        assert!(matches!(
            cache.apply(&entry),
            Err(RegistryError::DecodeFailure(_))
        ));
        assert!(cache.is_empty());
    }

    #[test]
    fn most_specific_pattern_wins() {
        let cache = SchemaCache::new();
        cache.apply(&put_entry("catch_all", ">", 1)).unwrap();
        cache.apply(&put_entry("numbers_any", "numbers.>", 2)).unwrap();
        cache.apply(&put_entry("numbers_one", "numbers.*", 3)).unwrap();
        cache.apply(&put_entry("numbers_int", "numbers.int", 4)).unwrap();

        let pick = |subject: &str| cache.find_match(subject).map(|s| s.name.clone());
        assert_eq!(pick("numbers.int").as_deref(), Some("numbers_int"));
        assert_eq!(pick("numbers.float").as_deref(), Some("numbers_one"));
        assert_eq!(pick("numbers.a.b").as_deref(), Some("numbers_any"));
        assert_eq!(pick("letters.a").as_deref(), Some("catch_all"));
    }

    #[test]
    fn equal_specificity_resolves_to_smallest_name() {
        let cache = SchemaCache::new();
        cache.apply(&put_entry("zeta", "orders.*", 1)).unwrap();
        cache.apply(&put_entry("alpha", "*.created", 2)).unwrap();

        let winner = cache.find_match("orders.created").expect("should match");
        assert_eq!(winner.name, "alpha");
        assert!(cache.find_match("invoices.updated").is_none());
    }

    #[test]
    fn snapshot_is_sorted_by_name() {
        let cache = SchemaCache::new();
        cache.apply(&put_entry("b", "b", 1)).unwrap();
        cache.apply(&put_entry("a", "a", 2)).unwrap();
        let names: Vec<_> = cache.snapshot().iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn sync_replays_then_follows_feed() {
        let kv = Arc::new(MemoryKv::new());
        let store = SchemaStore::new(kv.clone());
        let before = store.create(&schema("before", "before.>", 0)).await.unwrap();

        let cache = Arc::new(SchemaCache::new());
        let cancel = CancellationToken::new();
        let sync = cache.start_sync(&store, cancel.clone()).await.unwrap();
        assert!(sync.initial_load().await);
        assert!(sync.is_loaded());
        assert_eq!(cache.get("before").unwrap().revision, before);

        let after = store.put(&schema("after", "after.*", 0)).await.unwrap();
        eventually("live update", || cache.get("after").is_some()).await;
        assert_eq!(cache.get("after").unwrap().revision, after);

        store.delete("before").await.unwrap();
        eventually("delete", || cache.get("before").is_none()).await;

        cancel.cancel();
        sync.join().await.unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn decode_failures_do_not_stop_sync() {
        let kv = Arc::new(MemoryKv::new());
        let store = SchemaStore::new(kv.clone());
        let cache = Arc::new(SchemaCache::new());
        let cancel = CancellationToken::new();
        let sync = cache.start_sync(&store, cancel.clone()).await.unwrap();
        assert!(sync.initial_load().await);

        kv.put("garbage", Bytes::from_static(b"not a schema")).await.unwrap();
        store.put(&schema("good", "good.>", 0)).await.unwrap();
        eventually("good schema", || cache.get("good").is_some()).await;
        assert!(cache.get("garbage").is_none());
        assert!(!sync.is_finished());

        cancel.cancel();
        sync.join().await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_stops_mutation() {
        let kv = Arc::new(MemoryKv::new());
        let store = SchemaStore::new(kv.clone());
        let cache = Arc::new(SchemaCache::new());
        let cancel = CancellationToken::new();
        let sync = cache.start_sync(&store, cancel.clone()).await.unwrap();
        store.put(&schema("kept", "kept", 0)).await.unwrap();
        eventually("kept schema", || cache.get("kept").is_some()).await;

        cancel.cancel();
        sync.join().await.unwrap();

        store.put(&schema("late", "late", 0)).await.unwrap();
        store.delete("kept").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("late").is_none());
        assert!(cache.get("kept").is_some());
    }

    #[tokio::test]
    async fn feed_close_ends_task() {
        let kv = Arc::new(MemoryKv::new());
        let store = SchemaStore::new(kv.clone());
        let cache = Arc::new(SchemaCache::new());
        let sync = cache
            .start_sync(&store, CancellationToken::new())
            .await
            .unwrap();

        kv.close();
        sync.join().await.unwrap();
    }

    #[tokio::test]
    async fn start_sync_fails_when_feed_unavailable() {
        let kv = Arc::new(MemoryKv::new());
        kv.close();
        let store = SchemaStore::new(kv);
        let cache = Arc::new(SchemaCache::new());
        assert!(matches!(
            cache.start_sync(&store, CancellationToken::new()).await,
            Err(RegistryError::StorageFailure(_))
        ));
    }

    #[tokio::test]
    async fn converges_to_store_revisions() {
        let kv = Arc::new(MemoryKv::new());
        let store = SchemaStore::new(kv.clone());
        let cache = Arc::new(SchemaCache::new());
        let cancel = CancellationToken::new();
        let sync = cache.start_sync(&store, cancel.clone()).await.unwrap();

        let mut expected = BTreeMap::new();
        for n in 0..50 {
            let name = format!("s{n}");
            let rev = store.put(&schema(&name, &format!("{name}.>"), 0)).await.unwrap();
            expected.insert(name, rev);
        }
        // Re-write half of them so some names carry several revisions.
        for n in (0..50).step_by(2) {
            let name = format!("s{n}");
            let rev = store.put(&schema(&name, &format!("{name}.*"), 0)).await.unwrap();
            expected.insert(name, rev);
        }

        eventually("convergence", || {
            cache
                .snapshot()
                .iter()
                .map(|s| (s.name.clone(), s.revision))
                .collect::<BTreeMap<_, _>>()
                == expected
        })
        .await;

        cancel.cancel();
        sync.join().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_observe_torn_records() {
        let kv = Arc::new(MemoryKv::new());
        let store = SchemaStore::new(kv.clone());
        let cache = Arc::new(SchemaCache::new());
        let cancel = CancellationToken::new();
        let sync = cache.start_sync(&store, cancel.clone()).await.unwrap();
        assert!(sync.initial_load().await);

        let done = CancellationToken::new();
        let mut readers = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            let done = done.clone();
            readers.push(tokio::spawn(async move {
                let mut observed = 0usize;
                while !done.is_cancelled() {
                    for schema in cache.snapshot() {
                        let pattern = format!("{}.>", schema.name);
                        assert_eq!(schema.subject_pattern, pattern);
                        assert!(schema.revision > 0);
                        assert!(schema.body.contains(&schema.name));
                        observed += 1;
                    }
                    tokio::task::yield_now().await;
                }
                observed
            }));
        }

        for n in 0..1000 {
            let name = format!("n{n}");
            let mut record = schema(&name, &format!("{name}.>"), 0);
            record.body = format!(r#"{{"title":"{name}"}}"#);
            store.put(&record).await.unwrap();
        }
        eventually("all updates", || cache.len() == 1000).await;

        done.cancel();
        for reader in readers {
            reader.await.expect("reader should not panic");
        }
        cancel.cancel();
        sync.join().await.unwrap();
    }
}
