//! Inventory ledger: durable store of per-product stock levels.
//!
//! Pure data access; the ledger enforces no business rules of its own beyond
//! the manual-adjust floor. It is shared, mutable, concurrently accessed state:
//! the mutation engine and the manual-adjust interface may run against the same
//! record at the same time.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use stockpipe_core::ProductId;

use crate::record::{InventoryRecord, LowStockAlert};

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("inventory record for product {0} already exists")]
    AlreadyExists(ProductId),

    #[error("no inventory record for product {0}")]
    NotFound(ProductId),

    #[error("adjustment {delta} would drive product {product_id} to {would_be}")]
    WouldGoNegative {
        product_id: ProductId,
        delta: i64,
        would_be: i64,
    },

    #[error("ledger storage failure: {0}")]
    Storage(String),
}

/// Staged view of the ledger inside one transaction.
///
/// Reads see earlier writes of the same transaction; nothing becomes visible
/// to other readers until the transaction commits.
pub trait LedgerTxn {
    fn get(&self, product_id: &ProductId) -> Option<InventoryRecord>;
    fn put(&mut self, record: InventoryRecord);
}

/// Durable store of [`InventoryRecord`]s.
///
/// `transact` is the event path's write interface: every write staged by the
/// closure commits as one unit iff the closure returns `Ok`, and transactions
/// are serialized against each other, so two concurrently processed events
/// decrementing the same product cannot lose an update. `adjust` is the manual
/// interface used outside the event path; unlike the engine's clamp policy it
/// rejects adjustments that would drive stock negative.
pub trait InventoryLedger: Send + Sync {
    fn get(&self, product_id: &ProductId) -> LedgerResult<Option<InventoryRecord>>;

    fn list(&self) -> LedgerResult<Vec<InventoryRecord>>;

    /// Provision a record explicitly. Fails if one already exists.
    fn create(&self, record: InventoryRecord) -> LedgerResult<InventoryRecord>;

    /// Manually add or remove stock. Fails on unknown products and on
    /// adjustments that would result in negative stock.
    fn adjust(&self, product_id: &ProductId, delta: i64) -> LedgerResult<InventoryRecord>;

    /// Run `f` against a staged view and commit all its writes atomically.
    fn transact(
        &self,
        f: &mut dyn FnMut(&mut dyn LedgerTxn) -> LedgerResult<()>,
    ) -> LedgerResult<()>;

    /// Every record at or below its reorder level, projected with its shortage.
    ///
    /// Read-only scan of current state; no side effects.
    fn list_low_stock(&self) -> LedgerResult<Vec<LowStockAlert>> {
        Ok(self
            .list()?
            .iter()
            .filter(|r| r.is_low_stock())
            .map(LowStockAlert::from)
            .collect())
    }
}

impl<L> InventoryLedger for Arc<L>
where
    L: InventoryLedger + ?Sized,
{
    fn get(&self, product_id: &ProductId) -> LedgerResult<Option<InventoryRecord>> {
        (**self).get(product_id)
    }

    fn list(&self) -> LedgerResult<Vec<InventoryRecord>> {
        (**self).list()
    }

    fn create(&self, record: InventoryRecord) -> LedgerResult<InventoryRecord> {
        (**self).create(record)
    }

    fn adjust(&self, product_id: &ProductId, delta: i64) -> LedgerResult<InventoryRecord> {
        (**self).adjust(product_id, delta)
    }

    fn transact(
        &self,
        f: &mut dyn FnMut(&mut dyn LedgerTxn) -> LedgerResult<()>,
    ) -> LedgerResult<()> {
        (**self).transact(f)
    }

    fn list_low_stock(&self) -> LedgerResult<Vec<LowStockAlert>> {
        (**self).list_low_stock()
    }
}

/// In-memory ledger.
///
/// Holds its write lock for the whole of `transact`, which serializes
/// transactions coarsely (whole-ledger rather than per-product row locks) and
/// makes each event's multi-item decrement all-or-nothing.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    records: RwLock<HashMap<ProductId, InventoryRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

struct StagedTxn<'a> {
    base: &'a HashMap<ProductId, InventoryRecord>,
    staged: HashMap<ProductId, InventoryRecord>,
}

impl LedgerTxn for StagedTxn<'_> {
    fn get(&self, product_id: &ProductId) -> Option<InventoryRecord> {
        self.staged
            .get(product_id)
            .or_else(|| self.base.get(product_id))
            .cloned()
    }

    fn put(&mut self, mut record: InventoryRecord) {
        record.last_updated = chrono::Utc::now();
        self.staged.insert(record.product_id, record);
    }
}

impl InventoryLedger for InMemoryLedger {
    fn get(&self, product_id: &ProductId) -> LedgerResult<Option<InventoryRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;
        Ok(records.get(product_id).cloned())
    }

    fn list(&self) -> LedgerResult<Vec<InventoryRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by_key(|r| *r.product_id.as_uuid());
        Ok(all)
    }

    fn create(&self, mut record: InventoryRecord) -> LedgerResult<InventoryRecord> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;
        if records.contains_key(&record.product_id) {
            return Err(LedgerError::AlreadyExists(record.product_id));
        }
        record.last_updated = chrono::Utc::now();
        records.insert(record.product_id, record.clone());
        Ok(record)
    }

    fn adjust(&self, product_id: &ProductId, delta: i64) -> LedgerResult<InventoryRecord> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;
        let record = records
            .get_mut(product_id)
            .ok_or(LedgerError::NotFound(*product_id))?;

        let would_be = record.quantity + delta;
        if would_be < 0 {
            return Err(LedgerError::WouldGoNegative {
                product_id: *product_id,
                delta,
                would_be,
            });
        }

        record.quantity = would_be;
        record.last_updated = chrono::Utc::now();
        Ok(record.clone())
    }

    fn transact(
        &self,
        f: &mut dyn FnMut(&mut dyn LedgerTxn) -> LedgerResult<()>,
    ) -> LedgerResult<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| LedgerError::Storage("lock poisoned".to_string()))?;

        let mut txn = StagedTxn {
            base: &records,
            staged: HashMap::new(),
        };
        f(&mut txn)?;

        let staged = txn.staged;
        for (product_id, record) in staged {
            records.insert(product_id, record);
        }
        Ok(())
    }
}
