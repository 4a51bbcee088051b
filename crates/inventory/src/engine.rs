//! Mutation engine: applies an order's line items to the ledger.

use thiserror::Error;
use tracing::{info, warn};

use stockpipe_core::{OrderId, ProductId};
use stockpipe_events::OrderCreated;

use crate::ledger::{InventoryLedger, LedgerError};
use crate::record::{InventoryRecord, LowStockAlert};

#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// One committed stock movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub product_id: ProductId,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub ordered_quantity: i64,
    /// Whether the record was created lazily by this event.
    pub created: bool,
}

/// Outcome of applying one `order.created` event.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedOrder {
    pub order_id: OrderId,
    pub changes: Vec<StockChange>,
    /// Line items dropped for missing product id / missing or non-positive quantity.
    pub skipped: usize,
    /// Records that ended at or below their reorder level.
    pub low_stock: Vec<LowStockAlert>,
}

/// Applies `order.created` events to the ledger.
///
/// Policy, in order of application per line item:
/// - items without a product id or a positive quantity are skipped and logged,
///   never failing the rest of the event;
/// - absent records are created lazily at quantity 0 with the configured
///   default reorder level;
/// - the decrement clamps at zero (`max(0, current - ordered)`): ordering more
///   than is in stock succeeds and empties the record rather than erroring;
/// - a record ending at or below its reorder level is logged and reported in
///   the outcome. Nothing is pushed anywhere; interested parties poll
///   [`InventoryLedger::list_low_stock`].
///
/// All of one event's writes commit as a single transaction.
///
/// `apply` is **not idempotent**: the transport delivers at least once, and a
/// redelivered `order.created` event decrements stock again. There is no
/// processed-event record and no deduplication by order id; that gap is
/// deliberate and covered by a test pinning the current behavior.
#[derive(Debug)]
pub struct MutationEngine<L> {
    ledger: L,
    default_reorder_level: i64,
}

impl<L> MutationEngine<L>
where
    L: InventoryLedger,
{
    pub fn new(ledger: L, default_reorder_level: i64) -> Self {
        Self {
            ledger,
            default_reorder_level,
        }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Apply one `order.created` event.
    pub fn apply(&self, event: &OrderCreated) -> Result<AppliedOrder, MutationError> {
        info!(
            order_id = %event.order_id,
            items = event.products.len(),
            "processing order event"
        );

        let mut changes = Vec::new();
        let mut low_stock = Vec::new();
        let mut skipped = 0usize;

        self.ledger.transact(&mut |txn| {
            for item in &event.products {
                let (Some(product_id), Some(quantity)) = (item.product_id, item.quantity) else {
                    warn!(
                        order_id = %event.order_id,
                        item = ?item,
                        "line item missing product id or quantity; skipping"
                    );
                    skipped += 1;
                    continue;
                };
                if quantity <= 0 {
                    warn!(
                        order_id = %event.order_id,
                        product_id = %product_id,
                        quantity,
                        "line item quantity not positive; skipping"
                    );
                    skipped += 1;
                    continue;
                }

                let (mut record, created) = match txn.get(&product_id) {
                    Some(record) => (record, false),
                    None => {
                        info!(product_id = %product_id, "creating inventory record on first decrement");
                        (
                            InventoryRecord::new(product_id, 0, self.default_reorder_level),
                            true,
                        )
                    }
                };

                let previous = record.quantity;
                record.quantity = (previous - quantity).max(0);

                info!(
                    product_id = %product_id,
                    previous,
                    new = record.quantity,
                    ordered = quantity,
                    "updated inventory"
                );

                if record.is_low_stock() {
                    warn!(
                        product_id = %product_id,
                        quantity = record.quantity,
                        reorder_level = record.reorder_level,
                        "low stock"
                    );
                    low_stock.push(LowStockAlert::from(&record));
                }

                changes.push(StockChange {
                    product_id,
                    previous_quantity: previous,
                    new_quantity: record.quantity,
                    ordered_quantity: quantity,
                    created,
                });
                txn.put(record);
            }
            Ok(())
        })?;

        info!(order_id = %event.order_id, applied = changes.len(), skipped, "order event processed");

        Ok(AppliedOrder {
            order_id: event.order_id,
            changes,
            skipped,
            low_stock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{InMemoryLedger, LedgerResult, LedgerTxn};
    use std::sync::Arc;
    use stockpipe_events::{LineItem, OrderEvent};
    use stockpipe_core::UserId;

    fn created(products: Vec<LineItem>) -> OrderCreated {
        let total = products
            .iter()
            .map(|p| p.price.unwrap_or(0.0) * p.quantity.unwrap_or(0) as f64)
            .sum();
        match OrderEvent::order_created(
            OrderId::new(),
            UserId::new(),
            products,
            total,
            Some(chrono::Utc::now()),
        ) {
            OrderEvent::Created(ev) => ev,
            _ => unreachable!(),
        }
    }

    fn engine() -> MutationEngine<Arc<InMemoryLedger>> {
        MutationEngine::new(Arc::new(InMemoryLedger::new()), 10)
    }

    #[test]
    fn decrements_existing_stock() {
        let engine = engine();
        let product = ProductId::new();
        engine
            .ledger()
            .create(InventoryRecord::new(product, 50, 10))
            .unwrap();

        let outcome = engine
            .apply(&created(vec![LineItem::new(product, 10, 2.0)]))
            .unwrap();

        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(outcome.changes[0].previous_quantity, 50);
        assert_eq!(outcome.changes[0].new_quantity, 40);
        assert_eq!(
            engine.ledger().get(&product).unwrap().unwrap().quantity,
            40
        );
    }

    #[test]
    fn oversell_clamps_to_zero() {
        let engine = engine();
        let product = ProductId::new();
        engine
            .ledger()
            .create(InventoryRecord::new(product, 3, 0))
            .unwrap();

        let outcome = engine
            .apply(&created(vec![LineItem::new(product, 10, 1.0)]))
            .unwrap();

        assert_eq!(outcome.changes[0].new_quantity, 0);
        assert_eq!(engine.ledger().get(&product).unwrap().unwrap().quantity, 0);
    }

    #[test]
    fn lazily_creates_missing_record_with_default_reorder_level() {
        let engine = engine();
        let product = ProductId::new();

        let outcome = engine
            .apply(&created(vec![LineItem::new(product, 5, 1.0)]))
            .unwrap();

        assert!(outcome.changes[0].created);
        let record = engine.ledger().get(&product).unwrap().unwrap();
        assert_eq!(record.quantity, 0);
        assert_eq!(record.reorder_level, 10);
    }

    #[test]
    fn skips_items_missing_product_id_or_quantity() {
        let engine = engine();
        let product = ProductId::new();
        engine
            .ledger()
            .create(InventoryRecord::new(product, 20, 5))
            .unwrap();

        let event = created(vec![
            LineItem {
                product_id: None,
                quantity: Some(2),
                price: Some(1.0),
            },
            LineItem {
                product_id: Some(ProductId::new()),
                quantity: None,
                price: Some(1.0),
            },
            LineItem::new(product, 4, 1.0),
        ]);

        let outcome = engine.apply(&event).unwrap();
        assert_eq!(outcome.skipped, 2);
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(engine.ledger().get(&product).unwrap().unwrap().quantity, 16);
    }

    #[test]
    fn skips_non_positive_quantities() {
        let engine = engine();
        let product = ProductId::new();
        engine
            .ledger()
            .create(InventoryRecord::new(product, 20, 5))
            .unwrap();

        let outcome = engine
            .apply(&created(vec![
                LineItem::new(product, 0, 1.0),
                LineItem::new(product, -3, 1.0),
            ]))
            .unwrap();

        assert_eq!(outcome.skipped, 2);
        assert!(outcome.changes.is_empty());
        assert_eq!(engine.ledger().get(&product).unwrap().unwrap().quantity, 20);
    }

    #[test]
    fn crossing_the_reorder_level_reports_low_stock() {
        let engine = engine();
        let product = ProductId::new();
        engine
            .ledger()
            .create(InventoryRecord::new(product, 12, 10))
            .unwrap();

        let outcome = engine
            .apply(&created(vec![LineItem::new(product, 4, 1.0)]))
            .unwrap();

        assert_eq!(outcome.low_stock.len(), 1);
        assert_eq!(outcome.low_stock[0].current_quantity, 8);
        assert_eq!(outcome.low_stock[0].shortage, 2);

        // And the record now shows up in the poll-based query.
        let alerts = engine.ledger().list_low_stock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].shortage, 2);
    }

    #[test]
    fn same_product_twice_in_one_event_decrements_cumulatively() {
        let engine = engine();
        let product = ProductId::new();
        engine
            .ledger()
            .create(InventoryRecord::new(product, 30, 5))
            .unwrap();

        engine
            .apply(&created(vec![
                LineItem::new(product, 10, 1.0),
                LineItem::new(product, 5, 1.0),
            ]))
            .unwrap();

        assert_eq!(engine.ledger().get(&product).unwrap().unwrap().quantity, 15);
    }

    #[test]
    fn replay_decrements_twice() {
        // At-least-once delivery with no deduplication: replaying the same
        // event double-applies. This pins the current behavior.
        let engine = engine();
        let product = ProductId::new();
        engine
            .ledger()
            .create(InventoryRecord::new(product, 50, 10))
            .unwrap();

        let event = created(vec![LineItem::new(product, 10, 1.0)]);
        engine.apply(&event).unwrap();
        engine.apply(&event).unwrap();

        assert_eq!(engine.ledger().get(&product).unwrap().unwrap().quantity, 30);
    }

    /// Ledger wrapper that fails every transaction at commit time.
    struct FailingLedger {
        inner: InMemoryLedger,
    }

    impl InventoryLedger for FailingLedger {
        fn get(&self, product_id: &ProductId) -> LedgerResult<Option<InventoryRecord>> {
            self.inner.get(product_id)
        }

        fn list(&self) -> LedgerResult<Vec<InventoryRecord>> {
            self.inner.list()
        }

        fn create(&self, record: InventoryRecord) -> LedgerResult<InventoryRecord> {
            self.inner.create(record)
        }

        fn adjust(&self, product_id: &ProductId, delta: i64) -> LedgerResult<InventoryRecord> {
            self.inner.adjust(product_id, delta)
        }

        fn transact(
            &self,
            f: &mut dyn FnMut(&mut dyn LedgerTxn) -> LedgerResult<()>,
        ) -> LedgerResult<()> {
            self.inner.transact(&mut |txn| {
                f(txn)?;
                Err(LedgerError::Storage("injected commit failure".to_string()))
            })
        }
    }

    #[test]
    fn failed_event_leaves_no_partial_updates() {
        let ledger = Arc::new(FailingLedger {
            inner: InMemoryLedger::new(),
        });
        let a = ProductId::new();
        let b = ProductId::new();
        ledger.create(InventoryRecord::new(a, 10, 2)).unwrap();
        ledger.create(InventoryRecord::new(b, 10, 2)).unwrap();

        let engine = MutationEngine::new(ledger.clone(), 10);
        let result = engine.apply(&created(vec![
            LineItem::new(a, 3, 1.0),
            LineItem::new(b, 3, 1.0),
        ]));

        assert!(result.is_err());
        // All-or-nothing: neither item's update survived.
        assert_eq!(ledger.get(&a).unwrap().unwrap().quantity, 10);
        assert_eq!(ledger.get(&b).unwrap().unwrap().quantity, 10);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Stock never goes negative under any interleaving of applied
            /// events and manual adjustments.
            #[test]
            fn quantity_never_negative(
                ops in prop::collection::vec(
                    (0usize..4, -40i64..80, prop::bool::ANY),
                    1..40,
                )
            ) {
                let engine = engine();
                let products: Vec<ProductId> =
                    (0..4).map(|_| ProductId::new()).collect();

                for (idx, amount, manual) in ops {
                    let product = products[idx];
                    if manual {
                        // Manual path: rejections are expected, never negative stock.
                        let _ = engine.ledger().adjust(&product, amount);
                    } else if amount > 0 {
                        engine
                            .apply(&created(vec![LineItem::new(product, amount, 1.0)]))
                            .unwrap();
                    }
                }

                for record in engine.ledger().list().unwrap() {
                    prop_assert!(record.quantity >= 0);
                }
            }

            /// Ordering more than is available empties the record exactly.
            #[test]
            fn oversell_lands_on_zero(stock in 0i64..50, ordered in 50i64..200) {
                let engine = engine();
                let product = ProductId::new();
                engine
                    .ledger()
                    .create(InventoryRecord::new(product, stock, 10))
                    .unwrap();

                engine
                    .apply(&created(vec![LineItem::new(product, ordered, 1.0)]))
                    .unwrap();

                prop_assert_eq!(
                    engine.ledger().get(&product).unwrap().unwrap().quantity,
                    0
                );
            }
        }
    }
}
