//! `stockpipe-runtime` — process configuration, publisher, consumer, and the
//! composition root.
//!
//! The embedding process (typically an HTTP service handling order and
//! inventory CRUD) constructs a [`Pipeline`] from [`Settings`], a transport,
//! and a ledger, calls [`Pipeline::start`] at startup and
//! [`Pipeline::shutdown`] at teardown. There is no lazily-initialized global
//! publisher or subscriber; lifecycle belongs to whoever built the pipeline.

pub mod consumer;
pub mod pipeline;
pub mod publisher;
pub mod settings;


pub use consumer::{ConsumerState, EventConsumer};
pub use pipeline::Pipeline;
pub use publisher::EventPublisher;
pub use settings::Settings;

/// Re-export of the process-wide logging setup for embedding processes.
pub use stockpipe_observability::init as init_tracing;
