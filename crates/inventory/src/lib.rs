//! `stockpipe-inventory` — the inventory ledger and the mutation engine.
//!
//! The ledger is a durable store of per-product stock levels; the mutation
//! engine is the only writer of stock quantities during event processing. The
//! manual adjustment interface on the ledger is the only other writer, and the
//! two must stay safe under concurrent use.

pub mod engine;
pub mod ledger;
pub mod record;

pub use engine::{AppliedOrder, MutationEngine, MutationError, StockChange};
pub use ledger::{InMemoryLedger, InventoryLedger, LedgerError, LedgerResult, LedgerTxn};
pub use record::{InventoryRecord, LowStockAlert};
