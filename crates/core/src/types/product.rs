//! Catalog product with live stock count.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::money::CurrencyCode;

/// A catalog product.
///
/// `stock` is the authoritative on-hand count. It is decremented when a
/// payment is confirmed (the reservation point) and incremented when a
/// refund restores items - never by the cart, which only holds a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub currency: CurrencyCode,
    /// On-hand stock. Never negative; the database enforces this.
    pub stock: i64,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether at least one unit can currently be sold.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}
