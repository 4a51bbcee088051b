//! Order lifecycle status.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// The happy path is `Pending → Confirmed → Processing → Shipped → Delivered`;
/// `Cancelled` is reachable from any non-terminal state. The pipeline does not
/// drive these transitions itself (the order API does), but status values travel
/// in `order.status_changed` events and must round-trip through the wire format.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether `self → next` is a legal lifecycle transition.
    pub fn can_transition_to(&self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Cancelled {
            return true;
        }
        matches!(
            (self, next),
            (Self::Pending, Self::Confirmed)
                | (Self::Confirmed, Self::Processing)
                | (Self::Processing, Self::Shipped)
                | (Self::Shipped, Self::Delivered)
        )
    }

    /// Wire-format string (`"pending"`, `"confirmed"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Confirmed.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn cancel_from_any_non_terminal_state() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
        ] {
            assert!(s.can_transition_to(OrderStatus::Cancelled));
        }
    }

    #[test]
    fn terminal_states_are_final() {
        for s in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            for next in [
                OrderStatus::Pending,
                OrderStatus::Confirmed,
                OrderStatus::Processing,
                OrderStatus::Shipped,
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
            ] {
                assert!(!s.can_transition_to(next));
            }
        }
    }

    #[test]
    fn no_skipping_ahead() {
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Delivered));
    }

    #[test]
    fn wire_strings_round_trip() {
        for s in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&s).unwrap();
            assert_eq!(json, format!("\"{}\"", s.as_str()));
            let back: OrderStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, s);
        }
    }
}
