use std::sync::Arc;

use bytes::Bytes;
use schemagate_schema::Dialects;
use schemagate_store::{Schema, SchemaStore};
use schemagate_subject::{self as subject, Operation};

use crate::cache::SchemaCache;
use crate::error::{RegistryError, Result};

/// Handles `REGISTER`, `UPDATE`, `UNREGISTER` and `GET`.
///
/// Writes go straight to the store. Reads are served from the cache, so a
/// `get` right after `register` may miss until the change feed catches up.
#[derive(Debug, Clone)]
pub struct RegistrationService {
    store: SchemaStore,
    cache: Arc<SchemaCache>,
    dialects: Arc<Dialects>,
}

impl RegistrationService {
    pub fn new(store: SchemaStore, cache: Arc<SchemaCache>, dialects: Arc<Dialects>) -> Self {
        Self {
            store,
            cache,
            dialects,
        }
    }

    /// Register a new schema under `name`.
    ///
    /// Fails with [`RegistryError::Conflict`] if the name is already taken.
    pub async fn register(&self, name: &str, body: &[u8]) -> Result<Schema> {
        let mut schema = self.prepare(name, body)?;
        schema.revision = self.store.create(&schema).await?;
        tracing::info!(
            schema = %schema.name,
            revision = schema.revision,
            subject = %schema.subject_pattern,
            "registered schema"
        );
        Ok(schema)
    }

    /// Create or replace the schema under `name`.
    pub async fn update(&self, name: &str, body: &[u8]) -> Result<Schema> {
        let mut schema = self.prepare(name, body)?;
        schema.revision = self.store.put(&schema).await?;
        tracing::info!(
            schema = %schema.name,
            revision = schema.revision,
            subject = %schema.subject_pattern,
            "updated schema"
        );
        Ok(schema)
    }

    pub async fn unregister(&self, name: &str) -> Result<()> {
        self.store.delete(name).await?;
        tracing::info!(schema = %name, "unregistered schema");
        Ok(())
    }

    /// Cached schema by name.
    pub fn get(&self, name: &str) -> Result<Arc<Schema>> {
        self.cache
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Run one management operation and encode its reply body.
    ///
    /// `register`, `update` and `get` answer with the schema as JSON;
    /// `unregister` answers with an empty body.
    pub async fn handle(&self, operation: Operation, name: &str, body: &[u8]) -> Result<Bytes> {
        match operation {
            Operation::Register => encode(&self.register(name, body).await?),
            Operation::Update => encode(&self.update(name, body).await?),
            Operation::Unregister => self.unregister(name).await.map(|()| Bytes::new()),
            Operation::Get => {
                let schema = self.get(name)?;
                encode(&schema)
            }
            Operation::Validate => Err(RegistryError::InvalidInput(
                "validation requests are not management operations".to_string(),
            )),
        }
    }

    fn prepare(&self, name: &str, body: &[u8]) -> Result<Schema> {
        let mut schema: Schema = serde_json::from_slice(body)
            .map_err(|err| RegistryError::InvalidInput(format!("invalid schema document: {err}")))?;
        schema.name = name.to_string();
        schema.revision = 0;

        subject::validate(&schema.subject_pattern).map_err(|err| {
            RegistryError::InvalidInput(format!("invalid subject pattern: {err}"))
        })?;
        self.dialects
            .check(&schema)
            .map_err(|err| RegistryError::InvalidInput(err.to_string()))?;
        Ok(schema)
    }
}

fn encode(schema: &Schema) -> Result<Bytes> {
    serde_json::to_vec(schema)
        .map(Bytes::from)
        .map_err(|err| RegistryError::InvalidInput(err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use schemagate_store::MemoryKv;
    use tokio_util::sync::CancellationToken;

    use super::*;

    const NUMBERS: &[u8] = br#"{"subject":"numbers.>","type":"jsonschema","body":"{\"type\":\"number\"}"}"#;

    fn service(kv: Arc<MemoryKv>) -> (RegistrationService, Arc<SchemaCache>) {
        let cache = Arc::new(SchemaCache::new());
        let service = RegistrationService::new(
            SchemaStore::new(kv),
            Arc::clone(&cache),
            Arc::new(Dialects::default()),
        );
        (service, cache)
    }

    #[tokio::test]
    async fn register_assigns_revision_and_name() {
        let (service, _) = service(Arc::new(MemoryKv::new()));
        let schema = service.register("numbers", NUMBERS).await.unwrap();
        assert_eq!(schema.name, "numbers");
        assert_eq!(schema.subject_pattern, "numbers.>");
        assert!(schema.revision > 0);
    }

    #[tokio::test]
    async fn register_twice_conflicts() {
        let (service, _) = service(Arc::new(MemoryKv::new()));
        service.register("numbers", NUMBERS).await.unwrap();
        let err = service.register("numbers", NUMBERS).await.unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(name) if name == "numbers"));
        assert_eq!(err_code(&service, "numbers").await, 409);
    }

    async fn err_code(service: &RegistrationService, name: &str) -> u16 {
        service
            .handle(Operation::Register, name, NUMBERS)
            .await
            .unwrap_err()
            .code()
    }

    #[tokio::test]
    async fn repeated_updates_increase_revision() {
        let (service, _) = service(Arc::new(MemoryKv::new()));
        let mut last = 0;
        for _ in 0..5 {
            let schema = service.update("numbers", NUMBERS).await.unwrap();
            assert!(schema.revision > last);
            last = schema.revision;
        }
    }

    #[tokio::test]
    async fn rejects_bad_documents() {
        let (service, _) = service(Arc::new(MemoryKv::new()));
        let cases: [&[u8]; 4] = [
            b"not json",
            br#"{"subject":"a..b","body":"{}"}"#,
            br#"{"subject":"a.>","type":"avro","body":"{}"}"#,
            br#"{"subject":"a.>","body":"{\"type\":\"nope\"}"}"#,
        ];
        for body in cases {
            let err = service.register("bad", body).await.unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidInput(_)),
                "unexpected error {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn storage_failures_surface() {
        let kv = Arc::new(MemoryKv::new());
        let (service, _) = service(kv.clone());
        kv.close();
        assert!(matches!(
            service.register("numbers", NUMBERS).await,
            Err(RegistryError::StorageFailure(_))
        ));
        assert!(matches!(
            service.unregister("numbers").await,
            Err(RegistryError::StorageFailure(_))
        ));
    }

    #[tokio::test]
    async fn get_reads_from_cache_eventually() {
        let kv = Arc::new(MemoryKv::new());
        let (service, cache) = service(kv.clone());
        assert!(matches!(
            service.get("numbers"),
            Err(RegistryError::NotFound(_))
        ));

        let cancel = CancellationToken::new();
        let sync = cache
            .start_sync(&SchemaStore::new(kv), cancel.clone())
            .await
            .unwrap();
        let registered = service.register("numbers", NUMBERS).await.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        let cached = loop {
            if let Ok(schema) = service.get("numbers") {
                break schema;
            }
            assert!(tokio::time::Instant::now() < deadline, "schema never cached");
            tokio::time::sleep(Duration::from_millis(5)).await;
        };
        assert_eq!(cached.revision, registered.revision);

        let reply = service.handle(Operation::Get, "numbers", b"").await.unwrap();
        let decoded: Schema = serde_json::from_slice(&reply).unwrap();
        assert_eq!(decoded.revision, registered.revision);

        cancel.cancel();
        sync.join().await.unwrap();
    }

    #[tokio::test]
    async fn unregister_answers_empty() {
        let (service, _) = service(Arc::new(MemoryKv::new()));
        service.register("numbers", NUMBERS).await.unwrap();
        let reply = service
            .handle(Operation::Unregister, "numbers", b"")
            .await
            .unwrap();
        assert!(reply.is_empty());
        // The name is free again.
        service.register("numbers", NUMBERS).await.unwrap();
    }
}
