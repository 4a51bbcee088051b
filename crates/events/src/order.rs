//! Order event types (wire entities).
//!
//! Events are immutable once constructed: they are facts about something the
//! order service already committed, not commands. The event is a notification;
//! the order record itself stays the durable source of truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockpipe_core::{OrderId, OrderStatus, ProductId, UserId};

/// One ordered line item as it appears on the wire.
///
/// Fields are optional **at the wire level**: a malformed item (missing product
/// id or quantity) must not fail the whole event. The mutation engine skips
/// such items and keeps processing the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<ProductId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl LineItem {
    pub fn new(product_id: ProductId, quantity: i64, price: f64) -> Self {
        Self {
            product_id: Some(product_id),
            quantity: Some(quantity),
            price: Some(price),
        }
    }
}

/// Payload of an `order.created` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub products: Vec<LineItem>,
    pub total_amount: f64,
    /// Creation time of the order row. The order service emits `null` when the
    /// source row carries no timestamp, so the field is optional here too.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Payload of an `order.status_changed` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChanged {
    pub order_id: OrderId,
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,
}

/// Closed tagged union of every event kind this pipeline understands.
///
/// Anything else seen on the wire is "unrecognized" and gets acknowledged
/// without processing (forward-compatibility policy); see [`crate::codec`].
#[derive(Debug, Clone, PartialEq)]
pub enum OrderEvent {
    Created(OrderCreated),
    StatusChanged(OrderStatusChanged),
}

impl OrderEvent {
    /// Stable wire discriminator for this event kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "order.created",
            OrderEvent::StatusChanged(_) => "order.status_changed",
        }
    }

    /// Build an `order.created` event from a committed order's fields.
    pub fn order_created(
        order_id: OrderId,
        user_id: UserId,
        products: Vec<LineItem>,
        total_amount: f64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        OrderEvent::Created(OrderCreated {
            order_id,
            user_id,
            products,
            total_amount,
            timestamp,
        })
    }

    /// Build an `order.status_changed` event for a committed status transition.
    pub fn order_status_changed(
        order_id: OrderId,
        old_status: OrderStatus,
        new_status: OrderStatus,
    ) -> Self {
        OrderEvent::StatusChanged(OrderStatusChanged {
            order_id,
            old_status,
            new_status,
        })
    }
}
