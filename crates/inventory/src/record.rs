//! Inventory record and low-stock projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockpipe_core::ProductId;

/// Per-product stock level.
///
/// `quantity >= 0` is enforced by the mutation engine and the manual-adjust
/// path, never asserted by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub product_id: ProductId,
    pub quantity: i64,
    /// Stock level at or below which the product counts as low-stock.
    pub reorder_level: i64,
    pub last_updated: DateTime<Utc>,
}

impl InventoryRecord {
    pub fn new(product_id: ProductId, quantity: i64, reorder_level: i64) -> Self {
        Self {
            product_id,
            quantity,
            reorder_level,
            last_updated: Utc::now(),
        }
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}

/// Low-stock projection of a record.
///
/// Observational only: nothing delivers these anywhere, interested parties
/// poll the low-stock query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub product_id: ProductId,
    pub current_quantity: i64,
    pub reorder_level: i64,
    /// How far below the reorder level the stock sits.
    pub shortage: i64,
}

impl From<&InventoryRecord> for LowStockAlert {
    fn from(record: &InventoryRecord) -> Self {
        Self {
            product_id: record.product_id,
            current_quantity: record.quantity,
            reorder_level: record.reorder_level,
            shortage: record.reorder_level - record.quantity,
        }
    }
}
