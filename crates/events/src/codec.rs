//! Wire codec: UTF-8 JSON with a literal `event_type` discriminator.
//!
//! Decoding is two-phase: parse the payload as a JSON object, read
//! `event_type`, then deserialize the matching variant strictly. The split
//! exists because the two failure modes have different consequences for the
//! consumer:
//!
//! - a payload that is not valid JSON, lacks `event_type`, or names a known
//!   type with a non-matching shape is a [`CodecError`] (the consumer nacks
//!   it, leaving it to transport redelivery);
//! - a payload with an *unknown* `event_type` decodes to
//!   [`Decoded::Unrecognized`]; the consumer acks it without processing, since
//!   newer producers are allowed to emit types this process has never heard of.

use serde::Serialize;
use thiserror::Error;

use crate::order::{OrderCreated, OrderEvent, OrderStatusChanged};

pub const EVENT_TYPE_FIELD: &str = "event_type";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload is not valid UTF-8 JSON: {0}")]
    Malformed(String),

    #[error("payload has no {EVENT_TYPE_FIELD} field")]
    MissingEventType,

    #[error("payload does not match the {event_type} shape: {reason}")]
    ShapeMismatch {
        event_type: &'static str,
        reason: String,
    },

    #[error("failed to serialize {event_type} event: {reason}")]
    Serialize {
        event_type: &'static str,
        reason: String,
    },
}

/// Outcome of decoding a message payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A known event kind with a valid shape.
    Event(OrderEvent),
    /// A well-formed message of a kind this pipeline does not process.
    Unrecognized { event_type: String },
}

/// Serialize an event to its wire form, injecting the `event_type` field.
pub fn encode(event: &OrderEvent) -> Result<Vec<u8>, CodecError> {
    fn tagged<T: Serialize>(
        event_type: &'static str,
        payload: &T,
    ) -> Result<Vec<u8>, CodecError> {
        let mut value = serde_json::to_value(payload).map_err(|e| CodecError::Serialize {
            event_type,
            reason: e.to_string(),
        })?;
        // Payloads are structs, so this is always an object.
        if let serde_json::Value::Object(map) = &mut value {
            map.insert(
                EVENT_TYPE_FIELD.to_string(),
                serde_json::Value::String(event_type.to_string()),
            );
        }
        serde_json::to_vec(&value).map_err(|e| CodecError::Serialize {
            event_type,
            reason: e.to_string(),
        })
    }

    match event {
        OrderEvent::Created(e) => tagged(event.event_type(), e),
        OrderEvent::StatusChanged(e) => tagged(event.event_type(), e),
    }
}

/// Decode a message payload received from the transport.
pub fn decode(payload: &[u8]) -> Result<Decoded, CodecError> {
    let value: serde_json::Value =
        serde_json::from_slice(payload).map_err(|e| CodecError::Malformed(e.to_string()))?;

    let event_type = value
        .get(EVENT_TYPE_FIELD)
        .and_then(|v| v.as_str())
        .ok_or(CodecError::MissingEventType)?;

    match event_type {
        "order.created" => {
            let ev: OrderCreated =
                serde_json::from_value(value.clone()).map_err(|e| CodecError::ShapeMismatch {
                    event_type: "order.created",
                    reason: e.to_string(),
                })?;
            Ok(Decoded::Event(OrderEvent::Created(ev)))
        }
        "order.status_changed" => {
            let ev: OrderStatusChanged =
                serde_json::from_value(value.clone()).map_err(|e| CodecError::ShapeMismatch {
                    event_type: "order.status_changed",
                    reason: e.to_string(),
                })?;
            Ok(Decoded::Event(OrderEvent::StatusChanged(ev)))
        }
        other => Ok(Decoded::Unrecognized {
            event_type: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::LineItem;
    use stockpipe_core::{OrderId, OrderStatus, ProductId, UserId};

    fn created_event() -> OrderEvent {
        OrderEvent::order_created(
            OrderId::new(),
            UserId::new(),
            vec![LineItem::new(ProductId::new(), 3, 19.99)],
            59.97,
            Some(chrono::Utc::now()),
        )
    }

    #[test]
    fn order_created_round_trips() {
        let event = created_event();
        let bytes = encode(&event).unwrap();

        // The discriminator must be a literal field on the wire.
        let raw: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(raw["event_type"], "order.created");

        match decode(&bytes).unwrap() {
            Decoded::Event(back) => assert_eq!(back, event),
            other => panic!("unexpected decode outcome: {other:?}"),
        }
    }

    #[test]
    fn status_changed_round_trips() {
        let event = OrderEvent::order_status_changed(
            OrderId::new(),
            OrderStatus::Pending,
            OrderStatus::Confirmed,
        );
        let bytes = encode(&event).unwrap();
        let raw: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(raw["event_type"], "order.status_changed");
        assert_eq!(raw["old_status"], "pending");
        assert_eq!(raw["new_status"], "confirmed");

        match decode(&bytes).unwrap() {
            Decoded::Event(back) => assert_eq!(back, event),
            other => panic!("unexpected decode outcome: {other:?}"),
        }
    }

    #[test]
    fn null_timestamp_is_accepted() {
        let order_id = OrderId::new();
        let user_id = UserId::new();
        let payload = serde_json::json!({
            "event_type": "order.created",
            "order_id": order_id,
            "user_id": user_id,
            "products": [],
            "total_amount": 0.0,
            "timestamp": null,
        });
        let bytes = serde_json::to_vec(&payload).unwrap();

        match decode(&bytes).unwrap() {
            Decoded::Event(OrderEvent::Created(ev)) => {
                assert_eq!(ev.order_id, order_id);
                assert!(ev.timestamp.is_none());
            }
            other => panic!("unexpected decode outcome: {other:?}"),
        }
    }

    #[test]
    fn line_item_with_missing_fields_still_decodes() {
        // Item-level validation is the mutation engine's job, not the codec's.
        let payload = serde_json::json!({
            "event_type": "order.created",
            "order_id": OrderId::new(),
            "user_id": UserId::new(),
            "products": [{"price": 4.5}],
            "total_amount": 4.5,
        });
        let bytes = serde_json::to_vec(&payload).unwrap();

        match decode(&bytes).unwrap() {
            Decoded::Event(OrderEvent::Created(ev)) => {
                assert_eq!(ev.products.len(), 1);
                assert!(ev.products[0].product_id.is_none());
                assert!(ev.products[0].quantity.is_none());
            }
            other => panic!("unexpected decode outcome: {other:?}"),
        }
    }

    #[test]
    fn unknown_event_type_is_unrecognized_not_an_error() {
        let bytes = br#"{"event_type":"unknown.thing","whatever":1}"#;
        match decode(bytes).unwrap() {
            Decoded::Unrecognized { event_type } => assert_eq!(event_type, "unknown.thing"),
            other => panic!("unexpected decode outcome: {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            decode(b"not json at all"),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn missing_event_type_is_an_error() {
        assert!(matches!(
            decode(br#"{"order_id":"x"}"#),
            Err(CodecError::MissingEventType)
        ));
    }

    #[test]
    fn known_type_with_wrong_shape_is_an_error() {
        let bytes = br#"{"event_type":"order.created","order_id":42}"#;
        assert!(matches!(
            decode(bytes),
            Err(CodecError::ShapeMismatch {
                event_type: "order.created",
                ..
            })
        ));
    }
}
