//! Order aggregate: header, line items, and the shipping address snapshot.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{OrderId, OrderItemId, ProductId, UserId};
use super::money::CurrencyCode;
use super::status::OrderStatus;

/// An order header.
///
/// Orders are never deleted - they only move through the status lifecycle.
/// `payment_reference` is set exactly once when payment is initiated;
/// absence means the order is unpaid. `tracking_number` is meaningful only
/// once the order is shipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    /// Sum of `unit_price * quantity` over the items, captured at creation
    /// time. Never recomputed from live product prices.
    pub total: Decimal,
    pub currency: CurrencyCode,
    /// Opaque gateway charge reference. `None` until payment is initiated.
    pub payment_reference: Option<String>,
    pub tracking_number: Option<String>,
    /// Shipping address copied at checkout so later address edits do not
    /// retroactively change historical orders.
    pub shipping_address: Option<Address>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether payment has been initiated for this order.
    #[must_use]
    pub const fn is_paid(&self) -> bool {
        self.payment_reference.is_some()
    }
}

/// A line item on an order.
///
/// `unit_price` is the price at purchase time (price integrity invariant);
/// the live product price is irrelevant once the order exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderItem {
    /// Extended price for this line.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Shipping address snapshot stored on the order.
///
/// The email is the contact used for shipping notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub email: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

/// Input for creating a new order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub currency: CurrencyCode,
    pub items: Vec<NewOrderItem>,
    pub shipping_address: Address,
}

impl NewOrder {
    /// Order total: sum of `unit_price * quantity` over the items.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .map(|item| item.unit_price * Decimal::from(item.quantity))
            .sum()
    }
}

/// A line item being placed on a new order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price captured from the catalog at creation time.
    pub unit_price: Decimal,
}
