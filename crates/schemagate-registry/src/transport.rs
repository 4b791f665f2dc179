use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::message::{Headers, Message};

/// Messages delivered to one subscription.
#[derive(Debug)]
pub struct Subscription {
    messages: mpsc::UnboundedReceiver<Message>,
}

impl Subscription {
    pub fn new(messages: mpsc::UnboundedReceiver<Message>) -> Self {
        Self { messages }
    }

    /// Wait for the next message; `None` once the transport drops the subscription.
    pub async fn next(&mut self) -> Option<Message> {
        self.messages.recv().await
    }
}

/// Publish/subscribe message bus.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish a message on its (literal) subject.
    async fn publish(&self, message: Message) -> Result<(), TransportError>;

    /// Subscribe to a subject pattern.
    ///
    /// Members of the same queue group share the messages: each message goes
    /// to one of them.
    async fn subscribe(
        &self,
        pattern: &str,
        queue_group: Option<&str>,
    ) -> Result<Subscription, TransportError>;

    /// Answer a request on its reply subject.
    async fn respond(
        &self,
        reply: &str,
        payload: Bytes,
        headers: Headers,
    ) -> Result<(), TransportError> {
        self.publish(Message::new(reply, payload).with_headers(headers))
            .await
    }
}
