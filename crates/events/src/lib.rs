//! `stockpipe-events` — order events, wire codec, and transport abstraction.
//!
//! The event types here are the **only** coupling between order placement and
//! stock depletion: the order side serializes an [`OrderEvent`] and hands it to
//! a [`Transport`]; the inventory side receives it at some later time and acts
//! on it. The two sides share no synchronous call chain.

pub mod codec;
pub mod in_memory;
pub mod order;
pub mod transport;

pub use codec::{CodecError, Decoded, decode, encode};
pub use in_memory::InMemoryTransport;
pub use order::{LineItem, OrderCreated, OrderEvent, OrderStatusChanged};
pub use transport::{Acknowledger, Delivery, Subscription, Transport, TransportError};
