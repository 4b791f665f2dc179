use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use schemagate_store::Schema;

use crate::config::DialectConfig;
use crate::dialect::{CompiledSchema, Dialect, Validation};
use crate::error::{Result, SchemaError};
use crate::json::JsonSchemaDialect;

struct Compiled {
    revision: u64,
    schema: Arc<dyn CompiledSchema>,
}

/// Dialects keyed by `type`, plus a cache of compiled schemas.
///
/// Compiled schemas are cached per schema name and reused while the
/// revision stays the same. A new revision replaces the old compilation.
pub struct Dialects {
    dialects: HashMap<String, Arc<dyn Dialect>>,
    compiled: RwLock<HashMap<String, Compiled>>,
}

impl Dialects {
    /// Registry with no dialects at all.
    pub fn empty() -> Self {
        Self {
            dialects: HashMap::new(),
            compiled: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with the built-in JSON Schema dialect.
    pub fn new(config: DialectConfig) -> Self {
        Self::empty().with_dialect(Arc::new(JsonSchemaDialect::new(config)))
    }

    /// Add or replace a dialect.
    pub fn with_dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialects.insert(dialect.kind().to_string(), dialect);
        self
    }

    /// Check if a dialect is registered for `kind`.
    pub fn supports(&self, kind: &str) -> bool {
        self.dialects.contains_key(kind)
    }

    /// Registered dialect tags, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.dialects.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Compile a schema without caching it. Used to vet registrations.
    pub fn check(&self, schema: &Schema) -> Result<()> {
        self.dialect_for(schema)?.compile(&schema.body).map(|_| ())
    }

    /// Validate `payload` against `schema`, compiling it on first use.
    pub fn validate(&self, schema: &Schema, payload: &[u8]) -> Result<Validation> {
        Ok(self.compiled(schema)?.validate(payload))
    }

    /// Drop the cached compilation for `name`.
    pub fn evict(&self, name: &str) {
        self.compiled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    /// Number of cached compilations.
    pub fn compiled_count(&self) -> usize {
        self.compiled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn dialect_for(&self, schema: &Schema) -> Result<&Arc<dyn Dialect>> {
        let kind = schema.dialect();
        self.dialects
            .get(kind)
            .ok_or_else(|| SchemaError::UnsupportedKind(kind.to_string()))
    }

    fn compiled(&self, schema: &Schema) -> Result<Arc<dyn CompiledSchema>> {
        {
            let cache = self.compiled.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = cache.get(&schema.name) {
                if hit.revision == schema.revision {
                    return Ok(Arc::clone(&hit.schema));
                }
            }
        }

        let compiled = self.dialect_for(schema)?.compile(&schema.body)?;
        tracing::debug!(
            schema = %schema.name,
            revision = schema.revision,
            kind = schema.dialect(),
            "compiled schema"
        );

        self.compiled
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                schema.name.clone(),
                Compiled {
                    revision: schema.revision,
                    schema: Arc::clone(&compiled),
                },
            );
        Ok(compiled)
    }
}

impl Default for Dialects {
    fn default() -> Self {
        Self::new(DialectConfig::default())
    }
}

impl std::fmt::Debug for Dialects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dialects")
            .field("kinds", &self.kinds())
            .field("compiled", &self.compiled_count())
            .finish()
    }
}
