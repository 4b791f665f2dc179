use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Result, StoreError};
use crate::kv::{KeyValue, KvEntry, Watcher};
use crate::schema::Schema;

/// Reads and writes [`Schema`] records, one key per schema name.
#[derive(Clone)]
pub struct SchemaStore {
    kv: Arc<dyn KeyValue>,
}

impl SchemaStore {
    pub fn new(kv: Arc<dyn KeyValue>) -> Self {
        Self { kv }
    }

    /// Write a new schema; fails with [`StoreError::KeyExists`] if the name is live.
    pub async fn create(&self, schema: &Schema) -> Result<u64> {
        let value = Self::encode(schema)?;
        self.kv.create(&schema.name, value).await
    }

    /// Create or replace a schema.
    pub async fn put(&self, schema: &Schema) -> Result<u64> {
        let value = Self::encode(schema)?;
        self.kv.put(&schema.name, value).await
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        self.kv.delete(name).await
    }

    /// Read a schema straight from the store.
    pub async fn load(&self, name: &str) -> Result<Option<Schema>> {
        match self.kv.get(name).await? {
            Some(entry) => Self::decode(&entry).map(Some),
            None => Ok(None),
        }
    }

    /// Open the change feed over every schema.
    pub async fn watch(&self) -> Result<Watcher> {
        self.kv.watch_all().await
    }

    /// Serialize a schema for storage. The revision is never persisted.
    pub fn encode(schema: &Schema) -> Result<Bytes> {
        let stored = Schema {
            revision: 0,
            ..schema.clone()
        };
        serde_json::to_vec(&stored)
            .map(Bytes::from)
            .map_err(StoreError::Encode)
    }

    /// Decode a committed entry.
    ///
    /// The entry's key and revision are authoritative and overwrite whatever
    /// the stored body says.
    pub fn decode(entry: &KvEntry) -> Result<Schema> {
        let mut schema: Schema =
            serde_json::from_slice(&entry.value).map_err(|source| StoreError::Decode {
                key: entry.key.clone(),
                source,
            })?;
        schema.name = entry.key.clone();
        schema.revision = entry.revision;
        Ok(schema)
    }
}

impl std::fmt::Debug for SchemaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::KvOperation;
    use crate::memory::MemoryKv;

    fn numbers() -> Schema {
        Schema {
            name: "numbers".to_string(),
            subject_pattern: "numbers.>".to_string(),
            revision: 99,
            kind: "jsonschema".to_string(),
            body: r#"{"type":"number"}"#.to_string(),
        }
    }

    #[tokio::test]
    async fn create_then_load_uses_store_revision() {
        let store = SchemaStore::new(Arc::new(MemoryKv::new()));
        let rev = store.create(&numbers()).await.unwrap();

        let loaded = store.load("numbers").await.unwrap().expect("schema should load");
        assert_eq!(loaded.revision, rev);
        assert_eq!(loaded.subject_pattern, "numbers.>");
        assert!(matches!(
            store.create(&numbers()).await,
            Err(StoreError::KeyExists(_))
        ));
    }

    #[test]
    fn encode_drops_revision() {
        let bytes = SchemaStore::encode(&numbers()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value.get("revision").is_none());
        assert_eq!(value["name"], "numbers");
    }

    #[test]
    fn decode_prefers_entry_key_and_revision() {
        let entry = KvEntry {
            key: "numbers".to_string(),
            value: Bytes::from_static(
                br#"{"name":"other","subject":"n.>","revision":1,"type":"jsonschema","body":"{}"}"#,
            ),
            revision: 42,
            operation: KvOperation::Put,
        };
        let schema = SchemaStore::decode(&entry).unwrap();
        assert_eq!(schema.name, "numbers");
        assert_eq!(schema.revision, 42);
    }

    #[test]
    fn decode_reports_key_on_failure() {
        let entry = KvEntry {
            key: "broken".to_string(),
            value: Bytes::from_static(b"not json"),
            revision: 1,
            operation: KvOperation::Put,
        };
        assert!(matches!(
            SchemaStore::decode(&entry),
            Err(StoreError::Decode { key, .. }) if key == "broken"
        ));
    }
}
