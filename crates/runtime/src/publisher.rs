//! Event publisher: best-effort emission of order events.
//!
//! Publishing is fire-and-forget from the order path's perspective. The order
//! record is the durable source of truth; the event is a notification. A
//! publish therefore never blocks beyond the ack timeout, never surfaces an
//! error to its caller, and never retries (at-most-once from the producer's
//! side).

use std::time::Duration;

use tracing::{error, info};

use stockpipe_core::MessageId;
use stockpipe_events::{OrderEvent, Transport, codec};

use crate::settings::Settings;

/// Serializes order events and hands them to the transport.
///
/// Constructed without a transport (or with `transport_enabled = false`), it
/// degrades to side-effect-free log emission: the event is written to the log
/// at `info` and "no message id" is returned.
#[derive(Debug)]
pub struct EventPublisher<T> {
    transport: Option<T>,
    topic: String,
    ack_timeout: Duration,
}

impl<T> EventPublisher<T>
where
    T: Transport,
{
    pub fn new(transport: T, settings: &Settings) -> Self {
        Self {
            transport: Some(transport),
            topic: settings.order_topic.clone(),
            ack_timeout: settings.publish_ack_timeout,
        }
    }

    /// A publisher with no transport: every publish is log-only.
    pub fn log_only(settings: &Settings) -> Self {
        info!("transport disabled; order events will be logged only");
        Self {
            transport: None,
            topic: settings.order_topic.clone(),
            ack_timeout: settings.publish_ack_timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Publish an event, waiting up to the ack timeout for the broker to
    /// confirm receipt. Returns the broker-assigned message id, or `None` when
    /// the transport is disabled or the publish failed.
    pub fn publish(&self, event: &OrderEvent) -> Option<MessageId> {
        let payload = match codec::encode(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!(event_type = event.event_type(), error = %e, "failed to encode event");
                return None;
            }
        };

        let Some(transport) = &self.transport else {
            info!(
                event_type = event.event_type(),
                payload = %String::from_utf8_lossy(&payload),
                "transport disabled; event logged instead of published"
            );
            return None;
        };

        match transport.publish(&self.topic, payload.clone(), self.ack_timeout) {
            Ok(message_id) => {
                info!(
                    event_type = event.event_type(),
                    topic = %self.topic,
                    message_id = %message_id,
                    "published event"
                );
                Some(message_id)
            }
            Err(e) => {
                error!(
                    event_type = event.event_type(),
                    topic = %self.topic,
                    error = %e,
                    "failed to publish event"
                );
                // Keep the payload recoverable from the log.
                info!(
                    payload = %String::from_utf8_lossy(&payload),
                    "event that failed to publish"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stockpipe_core::{OrderId, OrderStatus};
    use stockpipe_events::{Decoded, InMemoryTransport, decode};

    fn status_event() -> OrderEvent {
        OrderEvent::order_status_changed(
            OrderId::new(),
            OrderStatus::Pending,
            OrderStatus::Confirmed,
        )
    }

    #[test]
    fn publishes_to_the_configured_topic() {
        let settings = Settings::default();
        let transport = Arc::new(InMemoryTransport::new());
        transport.bind(&settings.order_topic, "sub");
        let sub = transport.subscribe("sub").unwrap();

        let publisher = EventPublisher::new(transport, &settings);
        let event = status_event();
        let message_id = publisher.publish(&event).unwrap();

        let delivery = sub
            .recv_timeout(Duration::from_millis(100))
            .expect("event should be delivered");
        assert_eq!(delivery.message_id(), &message_id);
        match decode(delivery.payload()).unwrap() {
            Decoded::Event(back) => assert_eq!(back, event),
            other => panic!("unexpected decode outcome: {other:?}"),
        }
    }

    #[test]
    fn log_only_publisher_returns_no_message_id() {
        let publisher: EventPublisher<Arc<InMemoryTransport>> =
            EventPublisher::log_only(&Settings::default());
        assert!(!publisher.is_enabled());
        assert!(publisher.publish(&status_event()).is_none());
    }

    #[test]
    fn transport_failure_degrades_to_none() {
        let settings = Settings::default();
        let transport = Arc::new(InMemoryTransport::new());
        transport.set_publish_failures(true);

        let publisher = EventPublisher::new(transport.clone(), &settings);
        assert!(publisher.publish(&status_event()).is_none());

        // The broker coming back makes publishing work again; no state is kept.
        transport.set_publish_failures(false);
        assert!(publisher.publish(&status_event()).is_some());
    }
}
