use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use schemagate_subject as subject;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::message::{Headers, Message};
use crate::transport::{Subscription, Transport};

/// Prefix of reply subjects created by [`MemoryBus::request`].
pub const INBOX_PREFIX: &str = "_INBOX";

struct Subscriber {
    pattern: String,
    queue_group: Option<String>,
    tx: mpsc::UnboundedSender<Message>,
}

#[derive(Default)]
struct BusState {
    subscribers: Vec<Subscriber>,
    // Round-robin position per queue group.
    cursors: HashMap<String, usize>,
    closed: bool,
}

/// In-process [`Transport`].
///
/// Every plain subscription whose pattern matches a published subject gets
/// a copy. Queue group members take turns.
#[derive(Default)]
pub struct MemoryBus {
    state: Mutex<BusState>,
    next_inbox: AtomicU64,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish and report how many subscribers received the message.
    pub fn deliver(&self, message: Message) -> Result<usize, TransportError> {
        subject::validate_literal(&message.subject)?;

        let mut state = self.open()?;
        state.subscribers.retain(|sub| !sub.tx.is_closed());

        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut delivered = 0usize;
        for (idx, sub) in state.subscribers.iter().enumerate() {
            if !subject::matches(&message.subject, &sub.pattern) {
                continue;
            }
            match &sub.queue_group {
                Some(group) => groups.entry(group.clone()).or_default().push(idx),
                None => {
                    if sub.tx.send(message.clone()).is_ok() {
                        delivered += 1;
                    }
                }
            }
        }

        for (group, members) in groups {
            let cursor = state.cursors.entry(group).or_insert(0);
            let pick = members[*cursor % members.len()];
            *cursor = cursor.wrapping_add(1);
            if state.subscribers[pick].tx.send(message.clone()).is_ok() {
                delivered += 1;
            }
        }

        tracing::trace!(subject = %message.subject, delivered, "published");
        Ok(delivered)
    }

    /// Publish with a fresh reply subject and wait for the first answer.
    pub async fn request(
        &self,
        subject: &str,
        payload: impl Into<Bytes>,
        headers: Headers,
        timeout: Duration,
    ) -> Result<Message, TransportError> {
        let id = self.next_inbox.fetch_add(1, Ordering::Relaxed);
        let inbox = format!("{INBOX_PREFIX}.{id}");
        let mut replies = self.subscribe(&inbox, None).await?;

        let message = Message::new(subject, payload)
            .with_reply(inbox)
            .with_headers(headers);
        if self.deliver(message)? == 0 {
            return Err(TransportError::NoResponders(subject.to_string()));
        }

        match tokio::time::timeout(timeout, replies.next()).await {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Err(TransportError::Closed),
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }

    /// Drop every subscription and refuse further traffic.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.subscribers.clear();
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|sub| !sub.tx.is_closed());
        state.subscribers.len()
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self) -> Result<MutexGuard<'_, BusState>, TransportError> {
        let state = self.lock();
        if state.closed {
            return Err(TransportError::Closed);
        }
        Ok(state)
    }
}

#[async_trait]
impl Transport for MemoryBus {
    async fn publish(&self, message: Message) -> Result<(), TransportError> {
        self.deliver(message).map(|_| ())
    }

    async fn subscribe(
        &self,
        pattern: &str,
        queue_group: Option<&str>,
    ) -> Result<Subscription, TransportError> {
        subject::validate(pattern)?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.open()?.subscribers.push(Subscriber {
            pattern: pattern.to_string(),
            queue_group: queue_group.map(str::to_string),
            tx,
        });
        Ok(Subscription::new(rx))
    }
}
