//! Composition root: wires transport, publisher, consumer, and ledger.
//!
//! Exactly one `Pipeline` is constructed per process, by whoever owns startup
//! and shutdown. Components are injected, not looked up: there is no global
//! publisher or subscriber instance anywhere in this workspace.

use std::sync::Arc;

use tracing::info;

use stockpipe_events::Transport;
use stockpipe_inventory::{InventoryLedger, MutationEngine};

use crate::consumer::{ConsumerState, EventConsumer};
use crate::publisher::EventPublisher;
use crate::settings::Settings;

/// The assembled order-event → inventory pipeline.
///
/// The publisher half is shared (handed to the order path via
/// [`Pipeline::publisher`]); the consumer half is owned here and driven by
/// [`Pipeline::start`] / [`Pipeline::shutdown`].
pub struct Pipeline<T, L> {
    publisher: Arc<EventPublisher<T>>,
    consumer: EventConsumer<T, L>,
}

impl<T, L> Pipeline<T, L>
where
    T: Transport + Clone,
    L: InventoryLedger + 'static,
{
    /// Assemble the pipeline.
    ///
    /// `transport` is `None` when the broker is unavailable or intentionally
    /// not deployed; the pipeline then runs in degraded mode (log-only
    /// publishing, no consumer) without failing construction.
    pub fn new(settings: &Settings, transport: Option<T>, ledger: L) -> Self {
        let engine = Arc::new(MutationEngine::new(ledger, settings.default_reorder_level));

        let transport = if settings.transport_enabled {
            transport
        } else {
            None
        };

        let (publisher, consumer) = match transport {
            Some(transport) => (
                Arc::new(EventPublisher::new(transport.clone(), settings)),
                EventConsumer::new(Some(transport), engine, settings),
            ),
            None => (
                Arc::new(EventPublisher::log_only(settings)),
                EventConsumer::new(None, engine, settings),
            ),
        };

        Self {
            publisher,
            consumer,
        }
    }

    /// Shared handle for the order path to publish through.
    pub fn publisher(&self) -> Arc<EventPublisher<T>> {
        Arc::clone(&self.publisher)
    }

    pub fn consumer_state(&self) -> ConsumerState {
        self.consumer.state()
    }

    /// Start the background consumer (no-op when disabled).
    pub fn start(&mut self) {
        info!("starting pipeline");
        self.consumer.start();
    }

    /// Stop the consumer, draining in-flight deliveries within the grace period.
    pub fn shutdown(&mut self) {
        info!("shutting down pipeline");
        self.consumer.stop();
    }
}
