use std::sync::Arc;

use bytes::Bytes;
use schemagate_schema::Dialects;
use schemagate_store::{KeyValue, SchemaStore};
use schemagate_subject::{Endpoint, Operation, FULL_WILDCARD, SEPARATOR};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheSync, SchemaCache};
use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::error::{RegistryError, Result};
use crate::message::{Headers, Message, SERVICE_ERROR, SERVICE_ERROR_CODE};
use crate::service::RegistrationService;
use crate::transport::{Subscription, Transport};

/// Entry point wiring the cache, registration service and dispatcher to a
/// transport.
pub struct Gateway;

impl Gateway {
    /// Start the cache sync and the API loop.
    ///
    /// Fails if the change feed cannot be opened or the API subscription is
    /// refused. Everything stops when `cancel` fires or
    /// [`GatewayHandle::shutdown`] is called; shutdown does not cancel the
    /// caller's token.
    pub async fn start(
        kv: Arc<dyn KeyValue>,
        transport: Arc<dyn Transport>,
        config: GatewayConfig,
        cancel: CancellationToken,
    ) -> Result<GatewayHandle> {
        let cancel = cancel.child_token();
        let store = SchemaStore::new(kv);
        let dialects = Arc::new(Dialects::new(config.dialects));
        let cache = Arc::new(SchemaCache::with_dialects(Arc::clone(&dialects)));

        let sync = cache.start_sync(&store, cancel.clone()).await?;

        let api = format!("{}{SEPARATOR}{FULL_WILDCARD}", config.api_prefix);
        let subscription = match transport
            .subscribe(&api, Some(config.queue_group.as_str()))
            .await
        {
            Ok(subscription) => subscription,
            Err(err) => {
                cancel.cancel();
                if let Err(join_err) = sync.join().await {
                    tracing::error!(error = %join_err, "schema cache sync failed");
                }
                return Err(err.into());
            }
        };

        let router = Router {
            prefix: Arc::from(config.api_prefix.as_str()),
            service: RegistrationService::new(store, Arc::clone(&cache), Arc::clone(&dialects)),
            dispatcher: Dispatcher::new(
                Arc::clone(&cache),
                dialects,
                Arc::clone(&transport),
                Endpoint::validate_prefix(&config.api_prefix),
            ),
            transport,
        };

        tracing::info!(
            subject = %api,
            queue_group = %config.queue_group,
            "schema gateway listening"
        );
        let serve = tokio::spawn(serve(subscription, router, cancel.clone()));

        Ok(GatewayHandle {
            cache,
            sync,
            serve,
            cancel,
        })
    }
}

/// A running gateway.
#[derive(Debug)]
pub struct GatewayHandle {
    cache: Arc<SchemaCache>,
    sync: CacheSync,
    serve: JoinHandle<()>,
    cancel: CancellationToken,
}

impl GatewayHandle {
    pub fn cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    /// Wait until every schema already in the store is cached.
    pub async fn wait_ready(&self) -> bool {
        self.sync.initial_load().await
    }

    /// Stop accepting requests, finish in-flight ones and stop the cache sync.
    pub async fn shutdown(self) -> std::result::Result<(), JoinError> {
        self.cancel.cancel();
        self.serve.await?;
        self.sync.join().await?;
        tracing::info!("schema gateway stopped");
        Ok(())
    }
}

#[derive(Clone)]
struct Router {
    prefix: Arc<str>,
    service: RegistrationService,
    dispatcher: Dispatcher,
    transport: Arc<dyn Transport>,
}

impl Router {
    async fn route(self, message: Message) {
        let Some(endpoint) = Endpoint::parse(&message.subject, &self.prefix) else {
            let err = RegistryError::InvalidInput(format!("unknown endpoint: {}", message.subject));
            self.fail(&message, &err).await;
            return;
        };

        let operation = endpoint.operation;
        let target = endpoint.target.to_string();
        if operation == Operation::Validate {
            if let Ok(schema) = self.dispatcher.on_validation_request(message).await {
                tracing::trace!(subject = %target, schema = %schema.name, "validated");
            }
            return;
        }

        match self.service.handle(operation, &target, &message.payload).await {
            Ok(body) => self.reply(&message, body, Headers::new()).await,
            Err(err) => self.fail(&message, &err).await,
        }
    }

    async fn fail(&self, message: &Message, err: &RegistryError) {
        tracing::debug!(subject = %message.subject, code = err.code(), error = %err, "request failed");
        let mut headers = Headers::new();
        headers.set(SERVICE_ERROR, err.to_string());
        headers.set(SERVICE_ERROR_CODE, err.code().to_string());
        self.reply(message, Bytes::new(), headers).await;
    }

    async fn reply(&self, message: &Message, body: Bytes, headers: Headers) {
        let Some(reply) = message.reply.as_deref() else {
            tracing::debug!(subject = %message.subject, "request has no reply subject");
            return;
        };
        if let Err(err) = self.transport.respond(reply, body, headers).await {
            tracing::warn!(subject = %message.subject, error = %err, "failed to send reply");
        }
    }
}

async fn serve(mut subscription: Subscription, router: Router, cancel: CancellationToken) {
    let mut in_flight = JoinSet::new();

    loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            message = subscription.next() => message,
        };
        let Some(message) = message else {
            tracing::info!("api subscription closed");
            break;
        };

        in_flight.spawn(router.clone().route(message));
        while let Some(result) = in_flight.try_join_next() {
            if let Err(err) = result {
                tracing::error!(error = %err, "request task failed");
            }
        }
    }

    drop(subscription);
    while let Some(result) = in_flight.join_next().await {
        if let Err(err) = result {
            tracing::error!(error = %err, "request task failed");
        }
    }
}
