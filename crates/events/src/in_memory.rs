//! In-memory transport for tests and broker-less deployments.
//!
//! Semantics match the contract the pipeline assumes of a real broker:
//! topic → subscription fan-out, nack-triggered redelivery with an attempt
//! counter, and no duplicate suppression. Differences from a real broker:
//! redelivery is immediate (no backoff), there is no retry cap and no
//! dead-letter queue, and a delivery dropped without being settled is simply
//! lost rather than redelivered after an ack deadline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, mpsc};
use std::time::Duration;

use stockpipe_core::MessageId;

use crate::transport::{Acknowledger, Delivery, Subscription, Transport, TransportError};

struct Binding {
    topic: String,
    tx: mpsc::Sender<Delivery>,
    // Taken by the first (only) subscriber.
    rx: Option<mpsc::Receiver<Delivery>>,
}

/// In-memory topic/subscription broker.
pub struct InMemoryTransport {
    bindings: Mutex<HashMap<String, Binding>>,
    next_id: AtomicU64,
    fail_publishes: AtomicBool,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a subscription name to a topic (idempotent).
    ///
    /// Every message published to `topic` is fanned out to each bound
    /// subscription's queue.
    pub fn bind(&self, topic: impl Into<String>, subscription: impl Into<String>) {
        let mut bindings = match self.bindings.lock() {
            Ok(b) => b,
            Err(poisoned) => poisoned.into_inner(),
        };
        bindings.entry(subscription.into()).or_insert_with(|| {
            let (tx, rx) = mpsc::channel();
            Binding {
                topic: topic.into(),
                tx,
                rx: Some(rx),
            }
        });
    }

    /// Make subsequent publishes fail as if the broker were unreachable.
    ///
    /// Test hook for the publisher's degraded mode.
    pub fn set_publish_failures(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self {
            bindings: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            fail_publishes: AtomicBool::new(false),
        }
    }
}

/// Settles an in-memory delivery: ack drops it, nack re-enqueues it on the
/// same subscription queue with an incremented attempt counter.
struct QueueAcknowledger {
    tx: mpsc::Sender<Delivery>,
    message_id: MessageId,
    payload: Vec<u8>,
    attempt: u32,
}

impl Acknowledger for QueueAcknowledger {
    fn ack(self: Box<Self>) {}

    fn nack(self: Box<Self>) {
        let attempt = self.attempt + 1;
        tracing::debug!(message_id = %self.message_id, attempt, "redelivering nacked message");
        let acker = Box::new(QueueAcknowledger {
            tx: self.tx.clone(),
            message_id: self.message_id.clone(),
            payload: self.payload.clone(),
            attempt,
        });
        // If the subscriber is gone there is nobody left to redeliver to.
        let _ = self
            .tx
            .send(Delivery::new(self.message_id, self.payload, attempt, acker));
    }
}

impl Transport for InMemoryTransport {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        _ack_timeout: Duration,
    ) -> Result<MessageId, TransportError> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable(
                "publish failures induced".to_string(),
            ));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message_id = MessageId::new(format!("in-mem-{id}"));

        let bindings = match self.bindings.lock() {
            Ok(b) => b,
            Err(poisoned) => poisoned.into_inner(),
        };
        for binding in bindings.values().filter(|b| b.topic == topic) {
            let acker = Box::new(QueueAcknowledger {
                tx: binding.tx.clone(),
                message_id: message_id.clone(),
                payload: payload.clone(),
                attempt: 1,
            });
            let _ = binding.tx.send(Delivery::new(
                message_id.clone(),
                payload.clone(),
                1,
                acker,
            ));
        }

        // A topic with no bound subscriptions still accepts the message,
        // exactly like a real broker.
        Ok(message_id)
    }

    fn subscribe(&self, subscription: &str) -> Result<Subscription, TransportError> {
        let mut bindings = match self.bindings.lock() {
            Ok(b) => b,
            Err(poisoned) => poisoned.into_inner(),
        };
        let binding = bindings
            .get_mut(subscription)
            .ok_or_else(|| TransportError::UnknownSubscription(subscription.to_string()))?;
        let rx = binding
            .rx
            .take()
            .ok_or_else(|| TransportError::AlreadySubscribed(subscription.to_string()))?;
        Ok(Subscription::new(rx))
    }
}
