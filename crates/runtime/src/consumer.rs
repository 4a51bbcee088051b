//! Event consumer: background receive loop driving the mutation engine.
//!
//! One subscription, pulled by a pool of worker threads. Workers settle every
//! delivery exactly once:
//!
//! - decode failure → nack (transport redelivers under its own policy);
//! - `order.created` → mutation engine; ack on success, nack on failure;
//! - anything else, recognized or not → ack immediately.
//!
//! Negative acknowledgment is the sole recovery path. There is no local retry
//! loop, no retry cap, and no dead-letter escalation here; redelivery and
//! backoff belong entirely to the transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use stockpipe_events::{Decoded, Delivery, OrderEvent, Subscription, Transport, codec};
use stockpipe_inventory::{InventoryLedger, MutationEngine};

use crate::settings::Settings;

/// How often idle workers wake to check the shutdown flag.
const RECV_TICK: Duration = Duration::from_millis(250);

/// How often `stop()` polls workers for completion.
const JOIN_POLL: Duration = Duration::from_millis(25);

/// Consumer lifecycle.
///
/// `Uninitialized → Running → Stopping → Stopped`. A consumer that is disabled
/// (by configuration, or because the subscription handshake failed) stays
/// `Uninitialized` for the process lifetime; there is no resubscribe loop.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConsumerState {
    Uninitialized,
    Running,
    Stopping,
    Stopped,
}

/// Long-lived background consumer of order events.
pub struct EventConsumer<T, L> {
    transport: Option<T>,
    engine: Arc<MutationEngine<L>>,
    subscription_name: String,
    worker_count: usize,
    shutdown_grace: Duration,
    enabled: bool,
    state: ConsumerState,
    shutdown: Arc<AtomicBool>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl<T, L> EventConsumer<T, L>
where
    T: Transport,
    L: InventoryLedger + 'static,
{
    /// `transport: None` models a process with no broker wired at all; the
    /// consumer is then permanently disabled, like the config flag being off.
    pub fn new(
        transport: Option<T>,
        engine: Arc<MutationEngine<L>>,
        settings: &Settings,
    ) -> Self {
        let enabled = settings.transport_enabled && transport.is_some();
        Self {
            transport,
            engine,
            subscription_name: settings.order_subscription.clone(),
            worker_count: settings.worker_count,
            shutdown_grace: settings.shutdown_grace,
            enabled,
            state: ConsumerState::Uninitialized,
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        }
    }

    /// Whether the consumer can (still) be started. Cleared permanently when
    /// the subscription handshake fails.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    /// Perform the subscription handshake and spawn the worker pool.
    ///
    /// A handshake failure is reported once and disables the consumer for the
    /// rest of the process lifetime; the caller is not expected to react.
    pub fn start(&mut self) {
        if !self.enabled {
            info!("consumer not started (disabled)");
            return;
        }
        if self.state != ConsumerState::Uninitialized {
            warn!(state = ?self.state, "consumer already started");
            return;
        }

        let Some(transport) = &self.transport else {
            self.enabled = false;
            return;
        };

        let subscription = match transport.subscribe(&self.subscription_name) {
            Ok(sub) => sub,
            Err(e) => {
                error!(
                    subscription = %self.subscription_name,
                    error = %e,
                    "subscription handshake failed; consumer disabled for process lifetime"
                );
                self.enabled = false;
                return;
            }
        };

        let subscription = Arc::new(Mutex::new(subscription));
        for i in 0..self.worker_count {
            let sub = Arc::clone(&subscription);
            let engine = Arc::clone(&self.engine);
            let shutdown = Arc::clone(&self.shutdown);
            let handle = thread::Builder::new()
                .name(format!("order-consumer-{i}"))
                .spawn(move || worker_loop(sub, engine, shutdown))
                .expect("failed to spawn consumer worker thread");
            self.workers.push(handle);
        }

        self.state = ConsumerState::Running;
        info!(
            subscription = %self.subscription_name,
            workers = self.worker_count,
            "consumer started"
        );
    }

    /// Request cancellation and wait (bounded by the shutdown grace period)
    /// for in-flight deliveries to settle.
    ///
    /// Workers that outlive the grace period are abandoned; whatever they were
    /// processing stays unacknowledged and the transport redelivers it later,
    /// which is acceptable under the at-least-once contract.
    pub fn stop(&mut self) {
        if self.state != ConsumerState::Running {
            return;
        }
        self.state = ConsumerState::Stopping;
        info!("stopping consumer");

        self.shutdown.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + self.shutdown_grace;

        for handle in self.workers.drain(..) {
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(JOIN_POLL);
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                warn!(
                    worker = ?handle.thread().name(),
                    "worker did not finish within the grace period; abandoning"
                );
            }
        }

        self.state = ConsumerState::Stopped;
        info!("consumer stopped");
    }
}

impl<T, L> core::fmt::Debug for EventConsumer<T, L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventConsumer")
            .field("subscription", &self.subscription_name)
            .field("worker_count", &self.worker_count)
            .field("enabled", &self.enabled)
            .field("state", &self.state)
            .finish()
    }
}

fn worker_loop<L>(
    subscription: Arc<Mutex<Subscription>>,
    engine: Arc<MutationEngine<L>>,
    shutdown: Arc<AtomicBool>,
) where
    L: InventoryLedger,
{
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        // Hold the subscription lock only while pulling, so one slow message
        // does not idle the rest of the pool.
        let received = {
            let sub = match subscription.lock() {
                Ok(sub) => sub,
                Err(_) => break,
            };
            sub.recv_timeout(RECV_TICK)
        };

        match received {
            Ok(delivery) => handle_delivery(delivery, &engine),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Settle one delivery: ack or nack, never both, never neither.
fn handle_delivery<L>(delivery: Delivery, engine: &MutationEngine<L>)
where
    L: InventoryLedger,
{
    match codec::decode(delivery.payload()) {
        Err(e) => {
            warn!(
                message_id = %delivery.message_id(),
                attempt = delivery.attempt(),
                error = %e,
                "undecodable message; negative-acknowledging for redelivery"
            );
            delivery.nack();
        }
        Ok(Decoded::Unrecognized { event_type }) => {
            debug!(
                message_id = %delivery.message_id(),
                event_type,
                "unrecognized event type; acknowledged without processing"
            );
            delivery.ack();
        }
        Ok(Decoded::Event(OrderEvent::Created(event))) => {
            let order_id = event.order_id;
            match engine.apply(&event) {
                Ok(outcome) => {
                    info!(
                        message_id = %delivery.message_id(),
                        order_id = %order_id,
                        applied = outcome.changes.len(),
                        skipped = outcome.skipped,
                        "processed order event"
                    );
                    delivery.ack();
                }
                Err(e) => {
                    error!(
                        message_id = %delivery.message_id(),
                        order_id = %order_id,
                        attempt = delivery.attempt(),
                        error = %e,
                        "error processing order event; negative-acknowledging"
                    );
                    delivery.nack();
                }
            }
        }
        Ok(Decoded::Event(other)) => {
            // Recognized but not ours to process (e.g. order.status_changed).
            debug!(
                message_id = %delivery.message_id(),
                event_type = other.event_type(),
                "event type not processed by inventory; acknowledged"
            );
            delivery.ack();
        }
    }
}
