//! Checkout and the storefront half of the payment workflow.
//!
//! Order creation captures prices and does not touch stock; stock is
//! durably decremented only when the gateway confirms the charge (the
//! reservation point). That ordering means several pending orders can race
//! for the same stock and lose at confirmation time - a deliberate choice
//! that avoids reserving inventory for abandoned checkouts, at the cost of
//! a checkout-time failure that must be surfaced as "stock ran out", not
//! as a generic error.
//!
//! Gateway calls run outside any state mutation: a charge that fails or
//! times out leaves the order exactly as it was, so initiation is safe to
//! retry.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use bramble_core::{
    Address, Cart, CartId, CartStore, ChargeRequest, CurrencyCode, GatewayError, Money, NewOrder,
    NewOrderItem, Order, OrderId, OrderRepository, OrderStatus, PaymentEvent, PaymentGateway,
    ProductId, ProductRepository, RepositoryError, StockAdjustError, UserId,
};

// =============================================================================
// Pricing Policy
// =============================================================================

/// Flat shipping fee added to every charge.
fn shipping_fee() -> Decimal {
    Decimal::new(1000, 2) // 10.00
}

/// Tax rate applied to the order subtotal.
fn tax_rate() -> Decimal {
    Decimal::new(10, 2) // 10%
}

/// Charge amount for an order subtotal: `subtotal + shipping + tax`.
///
/// Shipping and tax are policy constants, not derived from catalog data.
#[must_use]
pub fn charge_total(subtotal: Decimal) -> Decimal {
    subtotal + shipping_fee() + (subtotal * tax_rate()).round_dp(2)
}

// =============================================================================
// Errors
// =============================================================================

/// Failures in the checkout and payment flow.
///
/// The first group are expected, user-actionable conditions and pass
/// through to the client verbatim; `Gateway` and `Repo` are infrastructure
/// failures that get logged and generalized.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart {0} not found")]
    CartNotFound(CartId),

    #[error("cart is empty")]
    EmptyCart,

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    /// A cart line references a product the catalog no longer has.
    #[error("product {0} is no longer available")]
    UnknownProduct(ProductId),

    /// Payment was already initiated; refusing to create a second charge.
    #[error("payment already initiated for order {0}")]
    AlreadyPaid(OrderId),

    /// Stock ran out between checkout and confirmation. Item-specific so
    /// the client can tell the shopper which line changed.
    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: ProductId },

    #[error("order {order_id} is {status}, expected {expected}")]
    InvalidState {
        order_id: OrderId,
        status: OrderStatus,
        expected: OrderStatus,
    },

    #[error("no order matches payment reference {0}")]
    UnknownPaymentReference(String),

    #[error("unexpected payment event kind {0}")]
    UnexpectedEvent(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Repo(#[from] RepositoryError),
}

// =============================================================================
// Service
// =============================================================================

/// A created payment, returned to the client to complete in the browser.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub order_id: OrderId,
    pub reference: String,
    pub client_secret: String,
    pub amount: Money,
}

/// Checkout orchestration over the capability traits.
#[derive(Clone)]
pub struct CheckoutService {
    products: Arc<dyn ProductRepository>,
    orders: Arc<dyn OrderRepository>,
    carts: Arc<dyn CartStore>,
    gateway: Arc<dyn PaymentGateway>,
    currency: CurrencyCode,
}

impl CheckoutService {
    #[must_use]
    pub fn new(
        products: Arc<dyn ProductRepository>,
        orders: Arc<dyn OrderRepository>,
        carts: Arc<dyn CartStore>,
        gateway: Arc<dyn PaymentGateway>,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            products,
            orders,
            carts,
            gateway,
            currency,
        }
    }

    /// Turn a cart into a `Pending` order.
    ///
    /// Unit prices are captured from the catalog now - not from the
    /// client-held cart snapshot - and never recomputed afterwards. Stock
    /// is not touched here.
    ///
    /// # Errors
    ///
    /// `CartNotFound` / `EmptyCart` for bad input, `UnknownProduct` if a
    /// line's product has left the catalog, or a repository error.
    #[instrument(skip(self, address))]
    pub async fn place_order(
        &self,
        cart_id: CartId,
        user_id: UserId,
        address: Address,
    ) -> Result<Order, CheckoutError> {
        let cart = self
            .carts
            .load(cart_id)
            .await?
            .ok_or(CheckoutError::CartNotFound(cart_id))?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let mut items = Vec::with_capacity(cart.items.len());
        for line in &cart.items {
            let product = self
                .products
                .get(line.product_id)
                .await?
                .ok_or(CheckoutError::UnknownProduct(line.product_id))?;
            items.push(NewOrderItem {
                product_id: product.id,
                quantity: line.quantity,
                unit_price: product.price,
            });
        }

        let order = self
            .orders
            .create(NewOrder {
                user_id,
                currency: self.currency,
                items,
                shipping_address: address,
            })
            .await?;

        info!(order_id = %order.id, total = %order.total, "order created");

        // The cart is consumed by checkout.
        self.carts.save(cart_id, &Cart::new()).await?;

        Ok(order)
    }

    /// Create a gateway charge for an order and persist its reference.
    ///
    /// Idempotence guard: an order with a payment reference is refused
    /// with `AlreadyPaid` rather than charged twice. A gateway failure
    /// leaves the order unpaid with no partial state.
    ///
    /// # Errors
    ///
    /// `AlreadyPaid`, `OrderNotFound`, `Gateway`, or a repository error.
    #[instrument(skip(self))]
    pub async fn initiate_payment(
        &self,
        order_id: OrderId,
    ) -> Result<PaymentIntent, CheckoutError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;

        if order.is_paid() {
            return Err(CheckoutError::AlreadyPaid(order_id));
        }

        let amount = Money::new(charge_total(order.total), order.currency);
        let charge = self
            .gateway
            .create_charge(ChargeRequest {
                amount,
                metadata: serde_json::json!({
                    "order_id": order.id,
                    "user_id": order.user_id,
                }),
            })
            .await?;

        let claimed = self
            .orders
            .set_payment_reference(order_id, &charge.reference)
            .await?;
        if !claimed {
            // A concurrent initiation won the conditional write; our charge
            // is a duplicate and gets reversed best-effort.
            warn!(order_id = %order_id, "concurrent payment initiation; reversing duplicate charge");
            if let Err(e) = self.gateway.reverse_charge(&charge.reference).await {
                error!(reference = %charge.reference, error = %e, "failed to reverse duplicate charge");
            }
            return Err(CheckoutError::AlreadyPaid(order_id));
        }

        info!(order_id = %order_id, reference = %charge.reference, "payment initiated");

        Ok(PaymentIntent {
            order_id,
            reference: charge.reference,
            client_secret: charge.client_secret,
            amount,
        })
    }

    /// Apply an authorized-charge event: decrement stock for every item
    /// (the reservation point) and move the order to `Processing`.
    ///
    /// Redelivered events for an order that already reserved stock are
    /// acknowledged without decrementing again. If any item's stock is
    /// insufficient, decrements applied so far are restored and the call
    /// fails with `InsufficientStock` - the caller must then reverse the
    /// charge (compensating refund).
    ///
    /// # Errors
    ///
    /// `UnexpectedEvent`, `UnknownPaymentReference`, `InsufficientStock`,
    /// `UnknownProduct`, `InvalidState`, or a repository error.
    #[instrument(skip(self), fields(reference = %event.reference))]
    pub async fn confirm_payment(&self, event: &PaymentEvent) -> Result<Order, CheckoutError> {
        if !event.is_authorized() {
            return Err(CheckoutError::UnexpectedEvent(event.kind.clone()));
        }

        let order = self
            .orders
            .find_by_payment_reference(&event.reference)
            .await?
            .ok_or_else(|| CheckoutError::UnknownPaymentReference(event.reference.clone()))?;

        if order.status.stock_reserved() {
            // Gateways redeliver events; the first delivery already
            // reserved stock, so acknowledge and do nothing.
            info!(order_id = %order.id, status = %order.status, "duplicate confirmation ignored");
            return Ok(order);
        }
        if order.status != OrderStatus::Pending {
            return Err(CheckoutError::InvalidState {
                order_id: order.id,
                status: order.status,
                expected: OrderStatus::Pending,
            });
        }

        let items = self.orders.list_items(order.id).await?;

        // Reservation point: decrement per item. Each decrement is atomic
        // at the row level; on failure the ones already applied are
        // restored before reporting.
        let mut applied: Vec<(ProductId, u32)> = Vec::with_capacity(items.len());
        for item in &items {
            match self
                .products
                .adjust_stock(item.product_id, -i64::from(item.quantity))
                .await
            {
                Ok(_) => applied.push((item.product_id, item.quantity)),
                Err(e) => {
                    self.restore_decrements(order.id, &applied).await;
                    return Err(match e {
                        StockAdjustError::Insufficient { product_id } => {
                            CheckoutError::InsufficientStock { product_id }
                        }
                        StockAdjustError::NotFound(product_id) => {
                            CheckoutError::UnknownProduct(product_id)
                        }
                        StockAdjustError::Repo(repo) => CheckoutError::Repo(repo),
                    });
                }
            }
        }

        let moved = self
            .orders
            .update_status(order.id, OrderStatus::Pending, OrderStatus::Processing, None)
            .await?;
        if !moved {
            // A concurrent writer changed the order (e.g. cancellation)
            // between our read and the conditional update. Hand the stock
            // back and report the conflict.
            self.restore_decrements(order.id, &applied).await;
            let current = self
                .orders
                .find_by_id(order.id)
                .await?
                .map_or(order.status, |o| o.status);
            return Err(CheckoutError::InvalidState {
                order_id: order.id,
                status: current,
                expected: OrderStatus::Pending,
            });
        }

        info!(order_id = %order.id, "payment confirmed, stock reserved");

        Ok(self
            .orders
            .find_by_id(order.id)
            .await?
            .unwrap_or(Order {
                status: OrderStatus::Processing,
                ..order
            }))
    }

    /// Hand back decrements applied before a failed confirmation.
    /// Best-effort: failures are logged, not propagated.
    async fn restore_decrements(&self, order_id: OrderId, applied: &[(ProductId, u32)]) {
        for &(product_id, quantity) in applied {
            if let Err(e) = self
                .products
                .adjust_stock(product_id, i64::from(quantity))
                .await
            {
                error!(
                    order_id = %order_id,
                    product_id = %product_id,
                    error = %e,
                    "failed to restore stock after aborted confirmation"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_total_adds_shipping_and_tax() {
        // 200 subtotal + 10 flat shipping + 20 tax (10%)
        let total = charge_total(Decimal::new(200, 0));
        assert_eq!(total, Decimal::new(230, 0));
    }

    #[test]
    fn test_charge_total_rounds_tax_to_cents() {
        // 19.99 * 0.10 = 1.999 -> 2.00
        let total = charge_total(Decimal::new(1999, 2));
        assert_eq!(total, Decimal::new(3199, 2)); // 19.99 + 10.00 + 2.00
    }

    #[test]
    fn test_charge_total_zero_subtotal_is_shipping_only() {
        assert_eq!(charge_total(Decimal::ZERO), Decimal::new(1000, 2));
    }
}
