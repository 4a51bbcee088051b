//! Transport abstraction (the message broker boundary).
//!
//! The broker itself is an external collaborator. This module only fixes the
//! contract the pipeline needs from it:
//!
//! - **At-least-once delivery**: a message may arrive more than once; nacked
//!   messages come back. Consumers must tolerate duplicates (or deliberately
//!   not, as the mutation engine documents).
//! - **No ordering guarantees**: redelivery and fan-out may reorder messages.
//! - **Explicit acknowledgment**: a [`Delivery`] is settled exactly once, by
//!   consuming it via [`Delivery::ack`] or [`Delivery::nack`].
//!
//! Deliveries arrive over an internal channel pulled by the consumer's worker
//! loop, rather than through broker-owned callbacks. That gives the consumer
//! explicit backpressure (the channel) and a clean cancellation point (the
//! receive timeout).

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use thiserror::Error;

use stockpipe_core::MessageId;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("broker unreachable: {0}")]
    Unreachable(String),

    #[error("broker did not acknowledge publish within {0:?}")]
    PublishTimeout(Duration),

    #[error("unknown subscription: {0}")]
    UnknownSubscription(String),

    #[error("subscription {0} is already being consumed")]
    AlreadySubscribed(String),
}

/// Settles a delivery with the broker. Implemented per transport.
pub trait Acknowledger: Send {
    /// Mark the message processed; the broker will not redeliver it.
    fn ack(self: Box<Self>);

    /// Mark the message failed; the broker redelivers it later under its own
    /// backoff policy.
    fn nack(self: Box<Self>);
}

/// One received message, owned by exactly one worker until settled.
pub struct Delivery {
    message_id: MessageId,
    payload: Vec<u8>,
    attempt: u32,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(
        message_id: MessageId,
        payload: Vec<u8>,
        attempt: u32,
        acker: Box<dyn Acknowledger>,
    ) -> Self {
        Self {
            message_id,
            payload,
            attempt,
            acker,
        }
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// 1 for the first delivery, incremented on each redelivery.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Acknowledge: processing finished (or the message is not ours to process).
    pub fn ack(self) {
        self.acker.ack();
    }

    /// Negative-acknowledge: processing failed, ask for redelivery.
    pub fn nack(self) {
        self.acker.nack();
    }
}

impl core::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Delivery")
            .field("message_id", &self.message_id)
            .field("payload_len", &self.payload.len())
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// A subscription to a message stream.
///
/// Wraps the receiving end of the delivery channel. Designed for pull-based
/// consumption from worker threads; the channel receiver is not `Sync`, so
/// multiple workers share a subscription behind a mutex.
#[derive(Debug)]
pub struct Subscription {
    receiver: Receiver<Delivery>,
}

impl Subscription {
    pub fn new(receiver: Receiver<Delivery>) -> Self {
        Self { receiver }
    }

    /// Block until the next delivery is available.
    pub fn recv(&self) -> Result<Delivery, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a delivery without blocking.
    pub fn try_recv(&self) -> Result<Delivery, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a delivery.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Delivery, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Message broker contract consumed by the publisher and the consumer.
///
/// `publish` waits synchronously (bounded by `ack_timeout`) for broker-level
/// acknowledgment of *receipt*, not of downstream processing. `subscribe`
/// performs the subscription handshake once; there is no resubscribe loop.
pub trait Transport: Send + Sync {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        ack_timeout: Duration,
    ) -> Result<MessageId, TransportError>;

    fn subscribe(&self, subscription: &str) -> Result<Subscription, TransportError>;
}

impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        ack_timeout: Duration,
    ) -> Result<MessageId, TransportError> {
        (**self).publish(topic, payload, ack_timeout)
    }

    fn subscribe(&self, subscription: &str) -> Result<Subscription, TransportError> {
        (**self).subscribe(subscription)
    }
}
