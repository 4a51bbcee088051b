//! `stockpipe-core` — shared domain primitives.
//!
//! This crate contains **pure domain** types (no transport or storage concerns).

pub mod error;
pub mod id;
pub mod status;

pub use error::{DomainError, DomainResult};
pub use id::{MessageId, OrderId, ProductId, UserId};
pub use status::OrderStatus;
