use std::sync::Arc;

use bytes::Bytes;
use schemagate_schema::Dialects;
use schemagate_store::Schema;
use schemagate_subject as subject;

use crate::cache::SchemaCache;
use crate::error::{RegistryError, Result};
use crate::message::{
    Headers, Message, SCHEMA_NAME, SCHEMA_REVISION, SCHEMA_SUBJECT, SCHEMA_TYPE, SCHEMA_VALIDATED,
};
use crate::transport::Transport;

/// Validates `VALIDATE.<subject>` requests and forwards accepted payloads.
#[derive(Clone)]
pub struct Dispatcher {
    cache: Arc<SchemaCache>,
    dialects: Arc<Dialects>,
    transport: Arc<dyn Transport>,
    validate_prefix: String,
}

impl Dispatcher {
    /// `validate_prefix` is the address part stripped from inbound subjects,
    /// e.g. `$SCHEMA.VALIDATE`.
    pub fn new(
        cache: Arc<SchemaCache>,
        dialects: Arc<Dialects>,
        transport: Arc<dyn Transport>,
        validate_prefix: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            dialects,
            transport,
            validate_prefix: validate_prefix.into(),
        }
    }

    /// Handle one validation request.
    ///
    /// On success the payload has been published on the governed subject and
    /// the schema that accepted it is returned. On failure the error text is
    /// sent to the request's reply subject, if it has one, and returned.
    pub async fn on_validation_request(&self, message: Message) -> Result<Arc<Schema>> {
        let reply = message.reply.clone();
        let result = self.forward(message).await;

        if let Err(err) = &result {
            match reply {
                Some(reply) => {
                    let text = Bytes::from(err.to_string());
                    if let Err(send_err) =
                        self.transport.respond(&reply, text, Headers::new()).await
                    {
                        tracing::warn!(error = %send_err, "failed to send validation failure");
                    }
                }
                None => tracing::warn!(error = %err, "validation failed without reply subject"),
            }
        }
        result
    }

    async fn forward(&self, message: Message) -> Result<Arc<Schema>> {
        let governed = subject::strip_prefix(&message.subject, &self.validate_prefix)
            .ok_or_else(|| {
                RegistryError::InvalidInput(format!(
                    "not a validation address: {}",
                    message.subject
                ))
            })?
            .to_string();

        // The cache lock is released here; validation works on the Arc.
        let schema = self
            .cache
            .find_match(&governed)
            .ok_or_else(|| RegistryError::NoSchemaFound(governed.clone()))?;

        let validation = self
            .dialects
            .validate(&schema, &message.payload)
            .map_err(|source| RegistryError::SchemaUnusable {
                name: schema.name.clone(),
                source,
            })?;
        if !validation.is_valid() {
            tracing::debug!(
                subject = %governed,
                schema = %schema.name,
                errors = validation.errors().len(),
                "payload rejected"
            );
            return Err(RegistryError::ValidationFailed(validation.message()));
        }

        let mut headers = message.headers;
        headers.set(SCHEMA_NAME, schema.name.as_str());
        headers.set(SCHEMA_REVISION, schema.revision.to_string());
        headers.set(SCHEMA_SUBJECT, schema.subject_pattern.as_str());
        headers.set(SCHEMA_TYPE, schema.dialect());
        headers.set(SCHEMA_VALIDATED, "true");

        let forwarded = Message {
            subject: governed,
            reply: message.reply,
            headers,
            payload: message.payload,
        };
        tracing::debug!(
            subject = %forwarded.subject,
            schema = %schema.name,
            revision = schema.revision,
            "forwarding validated payload"
        );
        self.transport.publish(forwarded).await?;
        Ok(schema)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("validate_prefix", &self.validate_prefix)
            .finish_non_exhaustive()
    }
}
