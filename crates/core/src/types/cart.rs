//! Cart state and its reducer.
//!
//! The cart is client-held, stock-bounded state: every mutation consumes
//! the current state and returns a fresh one, together with an optional
//! advisory for the shopper. Advisories are not errors - hitting the stock
//! ceiling or having a quantity clamped is expected behavior that the UI
//! surfaces as a notice.
//!
//! The `stock` on each line is a snapshot taken when the item was added.
//! It bounds client-side quantity edits only; authoritative stock is
//! re-validated when payment is confirmed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::id::ProductId;
use super::product::Product;

/// Opaque cart identifier handed to the client when the cart is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(Uuid);

impl CartId {
    /// Generate a fresh cart ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for CartId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for CartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub quantity: u32,
    /// Stock snapshot at add time; bounds quantity edits.
    pub stock: u32,
}

impl CartItem {
    /// A line is sane when its quantity is in `[1, stock]` and its price is
    /// non-negative. Lines rehydrated from the store that fail this check
    /// are skipped by the totals rather than poisoning them.
    fn is_sane(&self) -> bool {
        self.quantity >= 1 && self.quantity <= self.stock && self.price >= Decimal::ZERO
    }
}

/// Advisory emitted alongside a reduced cart state.
///
/// These are user-facing notices, not errors: the operation still returned
/// a valid state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartAdvisory {
    /// Adding one more unit would exceed the stock snapshot; the cart is
    /// unchanged.
    StockLimitReached { product_id: ProductId, stock: u32 },
    /// A requested quantity was clamped into `[1, stock]`.
    QuantityAdjusted {
        product_id: ProductId,
        requested: u32,
        adjusted: u32,
    },
    /// A line was removed.
    ItemRemoved { product_id: ProductId },
}

impl std::fmt::Display for CartAdvisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StockLimitReached { stock, .. } => {
                write!(f, "only {stock} in stock")
            }
            Self::QuantityAdjusted { adjusted, .. } => {
                write!(f, "quantity adjusted to {adjusted}")
            }
            Self::ItemRemoved { .. } => f.write_str("item removed from cart"),
        }
    }
}

/// The cart: an ordered collection of stock-bounded lines.
///
/// Invariant: after every reducer operation, `1 <= quantity <= stock`
/// holds for each line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add one unit of `product`.
    ///
    /// Inserts a new line with quantity 1, or increments an existing line
    /// unless that would exceed the stock snapshot - in which case the
    /// state is unchanged and a [`CartAdvisory::StockLimitReached`] is
    /// emitted.
    #[must_use]
    pub fn add_item(mut self, product: &Product) -> (Self, Option<CartAdvisory>) {
        let stock = u32::try_from(product.stock).unwrap_or(0);

        if let Some(line) = self
            .items
            .iter_mut()
            .find(|line| line.product_id == product.id)
        {
            if line.quantity >= line.stock {
                let advisory = CartAdvisory::StockLimitReached {
                    product_id: product.id,
                    stock: line.stock,
                };
                return (self, Some(advisory));
            }
            line.quantity += 1;
            return (self, None);
        }

        if stock == 0 {
            let advisory = CartAdvisory::StockLimitReached {
                product_id: product.id,
                stock: 0,
            };
            return (self, Some(advisory));
        }

        self.items.push(CartItem {
            product_id: product.id,
            name: product.name.clone(),
            price: product.price,
            image_url: product.image_url.clone(),
            quantity: 1,
            stock,
        });
        (self, None)
    }

    /// Set the quantity of a line, clamped into `[1, stock]`.
    ///
    /// Emits [`CartAdvisory::QuantityAdjusted`] if clamping changed the
    /// requested value. Unknown product IDs leave the cart unchanged.
    #[must_use]
    pub fn update_quantity(
        mut self,
        product_id: ProductId,
        requested: u32,
    ) -> (Self, Option<CartAdvisory>) {
        let mut advisory = None;
        if let Some(line) = self
            .items
            .iter_mut()
            .find(|line| line.product_id == product_id)
        {
            let adjusted = requested.clamp(1, line.stock.max(1));
            line.quantity = adjusted;
            if adjusted != requested {
                advisory = Some(CartAdvisory::QuantityAdjusted {
                    product_id,
                    requested,
                    adjusted,
                });
            }
        }
        (self, advisory)
    }

    /// Remove a line entirely.
    #[must_use]
    pub fn remove_item(mut self, product_id: ProductId) -> (Self, Option<CartAdvisory>) {
        let before = self.items.len();
        self.items.retain(|line| line.product_id != product_id);
        let advisory =
            (self.items.len() != before).then_some(CartAdvisory::ItemRemoved { product_id });
        (self, advisory)
    }

    /// Sum of `price * quantity` over the sane lines.
    ///
    /// Lines that fail the sanity check (tampered or corrupted persisted
    /// state) are skipped rather than propagated into the total.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.items
            .iter()
            .filter(|line| line.is_sane())
            .map(|line| line.price * Decimal::from(line.quantity))
            .sum()
    }

    /// Total number of units across the sane lines.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.items
            .iter()
            .filter(|line| line.is_sane())
            .map(|line| line.quantity)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::types::money::CurrencyCode;

    fn product(id: i64, price: Decimal, stock: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("product-{id}"),
            description: None,
            price,
            currency: CurrencyCode::USD,
            stock,
            image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn invariant_holds(cart: &Cart) -> bool {
        cart.items
            .iter()
            .all(|line| line.quantity >= 1 && line.quantity <= line.stock)
    }

    #[test]
    fn test_add_item_inserts_with_quantity_one() {
        let p = product(1, Decimal::new(500, 2), 3);
        let (cart, advisory) = Cart::new().add_item(&p);
        assert!(advisory.is_none());
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 1);
        assert_eq!(cart.items[0].stock, 3);
        assert!(invariant_holds(&cart));
    }

    #[test]
    fn test_add_item_increments_existing_line() {
        let p = product(1, Decimal::new(500, 2), 3);
        let (cart, _) = Cart::new().add_item(&p);
        let (cart, advisory) = cart.add_item(&p);
        assert!(advisory.is_none());
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 2);
    }

    #[test]
    fn test_add_item_at_stock_ceiling_is_noop_with_advisory() {
        let p = product(1, Decimal::new(500, 2), 2);
        let (cart, _) = Cart::new().add_item(&p);
        let (cart, _) = cart.add_item(&p);
        let (cart, advisory) = cart.add_item(&p);
        assert_eq!(cart.items[0].quantity, 2);
        assert_eq!(
            advisory,
            Some(CartAdvisory::StockLimitReached {
                product_id: ProductId::new(1),
                stock: 2,
            })
        );
        assert!(invariant_holds(&cart));
    }

    #[test]
    fn test_add_out_of_stock_product_is_noop() {
        let p = product(1, Decimal::new(500, 2), 0);
        let (cart, advisory) = Cart::new().add_item(&p);
        assert!(cart.is_empty());
        assert!(matches!(
            advisory,
            Some(CartAdvisory::StockLimitReached { stock: 0, .. })
        ));
    }

    #[test]
    fn test_update_quantity_within_bounds() {
        let p = product(1, Decimal::new(500, 2), 5);
        let (cart, _) = Cart::new().add_item(&p);
        let (cart, advisory) = cart.update_quantity(p.id, 4);
        assert!(advisory.is_none());
        assert_eq!(cart.items[0].quantity, 4);
    }

    #[test]
    fn test_update_quantity_clamps_above_stock() {
        let p = product(1, Decimal::new(500, 2), 5);
        let (cart, _) = Cart::new().add_item(&p);
        let (cart, advisory) = cart.update_quantity(p.id, 12);
        assert_eq!(cart.items[0].quantity, 5);
        assert_eq!(
            advisory,
            Some(CartAdvisory::QuantityAdjusted {
                product_id: p.id,
                requested: 12,
                adjusted: 5,
            })
        );
        assert!(invariant_holds(&cart));
    }

    #[test]
    fn test_update_quantity_clamps_zero_to_one() {
        let p = product(1, Decimal::new(500, 2), 5);
        let (cart, _) = Cart::new().add_item(&p);
        let (cart, advisory) = cart.update_quantity(p.id, 0);
        assert_eq!(cart.items[0].quantity, 1);
        assert!(matches!(
            advisory,
            Some(CartAdvisory::QuantityAdjusted { adjusted: 1, .. })
        ));
    }

    #[test]
    fn test_update_quantity_unknown_product_is_noop() {
        let p = product(1, Decimal::new(500, 2), 5);
        let (cart, _) = Cart::new().add_item(&p);
        let (cart, advisory) = cart.update_quantity(ProductId::new(99), 3);
        assert!(advisory.is_none());
        assert_eq!(cart.items[0].quantity, 1);
    }

    #[test]
    fn test_remove_item_emits_advisory() {
        let p = product(1, Decimal::new(500, 2), 5);
        let (cart, _) = Cart::new().add_item(&p);
        let (cart, advisory) = cart.remove_item(p.id);
        assert!(cart.is_empty());
        assert_eq!(
            advisory,
            Some(CartAdvisory::ItemRemoved { product_id: p.id })
        );
    }

    #[test]
    fn test_remove_missing_item_is_silent() {
        let (cart, advisory) = Cart::new().remove_item(ProductId::new(1));
        assert!(cart.is_empty());
        assert!(advisory.is_none());
    }

    #[test]
    fn test_totals() {
        let a = product(1, Decimal::new(1000, 2), 5); // 10.00
        let b = product(2, Decimal::new(250, 2), 5); // 2.50
        let (cart, _) = Cart::new().add_item(&a);
        let (cart, _) = cart.add_item(&b);
        let (cart, _) = cart.update_quantity(b.id, 2);
        assert_eq!(cart.total_price(), Decimal::new(1500, 2)); // 15.00
        assert_eq!(cart.total_items(), 3);
    }

    #[test]
    fn test_totals_skip_corrupted_lines() {
        // A tampered persisted cart: negative price on one line, zero
        // quantity on another. Both are skipped by the folds.
        let cart = Cart {
            items: vec![
                CartItem {
                    product_id: ProductId::new(1),
                    name: "ok".to_string(),
                    price: Decimal::new(1000, 2),
                    image_url: None,
                    quantity: 2,
                    stock: 5,
                },
                CartItem {
                    product_id: ProductId::new(2),
                    name: "negative price".to_string(),
                    price: Decimal::new(-500, 2),
                    image_url: None,
                    quantity: 1,
                    stock: 5,
                },
                CartItem {
                    product_id: ProductId::new(3),
                    name: "zero quantity".to_string(),
                    price: Decimal::new(500, 2),
                    image_url: None,
                    quantity: 0,
                    stock: 5,
                },
            ],
        };
        assert_eq!(cart.total_price(), Decimal::new(2000, 2)); // 20.00
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn test_invariant_over_random_sequences() {
        let a = product(1, Decimal::new(700, 2), 3);
        let b = product(2, Decimal::new(300, 2), 1);
        let mut cart = Cart::new();
        for step in 0..40u32 {
            let (next, _) = match step % 5 {
                0 => cart.clone().add_item(&a),
                1 => cart.clone().add_item(&b),
                2 => cart.clone().update_quantity(a.id, step),
                3 => cart.clone().update_quantity(b.id, step * 7),
                _ => cart.clone().remove_item(b.id),
            };
            assert!(invariant_holds(&next), "invariant broken at step {step}");
            cart = next;
        }
    }
}
