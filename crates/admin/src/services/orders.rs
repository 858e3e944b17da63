//! Order lifecycle service: admin-driven transitions and the refund
//! workflow.
//!
//! Transitions are validated against the lifecycle table and written with
//! an optimistic guard (the update lands only if the status still equals
//! what was read), so concurrent admin actions cannot both win.
//!
//! Refunds run in a fixed order: reverse the charge (abort on failure,
//! nothing changed), move the order to `Refunded`, then restore stock per
//! item. Restoration is all-items-best-effort: one product's failure is
//! collected and logged while the remaining items still get their stock
//! back, and the caller receives the failures as an aggregate warning.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use bramble_core::{
    GatewayError, InvalidTransition, Order, OrderId, OrderRepository, OrderStatus, PaymentGateway,
    ProductId, ProductRepository, RepositoryError,
};

use super::notify::{ShippingNotifier, ShippingUpdate};

/// Failures in the admin order lifecycle.
#[derive(Debug, Error)]
pub enum OrderServiceError {
    #[error("order {0} not found")]
    NotFound(OrderId),

    /// The requested move is not in the lifecycle table.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// Refund requested for an order that was already refunded.
    #[error("order {0} is already refunded")]
    AlreadyRefunded(OrderId),

    /// The order's current state does not admit the operation.
    #[error("order {order_id}: {reason}")]
    InvalidState { order_id: OrderId, reason: String },

    /// A concurrent writer changed the order between read and write.
    #[error("order {0} was modified concurrently; retry")]
    Conflict(OrderId),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Repo(#[from] RepositoryError),
}

/// One item whose stock restoration failed during a refund.
#[derive(Debug, Clone, Serialize)]
pub struct RefundFailure {
    pub product_id: ProductId,
    pub quantity: u32,
    pub error: String,
}

/// Result of a completed refund.
///
/// The refund itself succeeded (charge reversed, order `Refunded`);
/// `failures` carries any items whose stock restoration did not apply and
/// is surfaced to the caller as a warning.
#[derive(Debug, Clone, Serialize)]
pub struct RefundOutcome {
    pub order_id: OrderId,
    pub restored: Vec<ProductId>,
    pub failures: Vec<RefundFailure>,
}

impl RefundOutcome {
    /// Whether every item's stock came back.
    #[must_use]
    pub fn fully_restored(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Admin order lifecycle orchestration over the capability traits.
#[derive(Clone)]
pub struct OrderAdminService {
    orders: Arc<dyn OrderRepository>,
    products: Arc<dyn ProductRepository>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn ShippingNotifier>,
}

impl OrderAdminService {
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        products: Arc<dyn ProductRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn ShippingNotifier>,
    ) -> Self {
        Self {
            orders,
            products,
            gateway,
            notifier,
        }
    }

    async fn load(&self, order_id: OrderId) -> Result<Order, OrderServiceError> {
        self.orders
            .find_by_id(order_id)
            .await?
            .ok_or(OrderServiceError::NotFound(order_id))
    }

    /// Move an order to `next`, optionally attaching a tracking number.
    ///
    /// Transitioning to `Shipped` dispatches a shipping notification as a
    /// best-effort side effect: a failed send is logged and does not roll
    /// back the status change. `Refunded` is not reachable through here -
    /// refunds have their own workflow with gateway and stock effects.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` if the move is not in the lifecycle table,
    /// `Conflict` if a concurrent writer changed the order first.
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        order_id: OrderId,
        next: OrderStatus,
        tracking_number: Option<String>,
    ) -> Result<Order, OrderServiceError> {
        if next == OrderStatus::Refunded {
            return Err(OrderServiceError::InvalidState {
                order_id,
                reason: "refunds must go through the refund workflow".to_string(),
            });
        }

        let order = self.load(order_id).await?;
        order.status.verify_transition(next)?;

        let moved = self
            .orders
            .update_status(order_id, order.status, next, tracking_number.as_deref())
            .await?;
        if !moved {
            return Err(OrderServiceError::Conflict(order_id));
        }

        info!(order_id = %order_id, from = %order.status, to = %next, "order transitioned");

        if next == OrderStatus::Shipped {
            self.notify_shipped(&order, tracking_number).await;
        }

        Ok(self.load(order_id).await?)
    }

    /// Shipping notification, outside the consistency boundary.
    async fn notify_shipped(&self, order: &Order, tracking_number: Option<String>) {
        let Some(address) = &order.shipping_address else {
            warn!(order_id = %order.id, "no shipping address on order; skipping notification");
            return;
        };

        let update = ShippingUpdate {
            recipient: address.email.clone(),
            order_id: order.id,
            status: OrderStatus::Shipped,
            tracking_number,
        };
        if let Err(e) = self.notifier.shipping_update(update).await {
            warn!(order_id = %order.id, error = %e, "shipping notification failed");
        }
    }

    /// Refund an order: reverse the charge, mark the order `Refunded`, and
    /// restore stock for every item.
    ///
    /// Idempotent in effect: a second call fails with `AlreadyRefunded`
    /// and neither reverses the charge again nor restores stock twice.
    /// Stock is only restored for orders that had passed the reservation
    /// point; a pending order never decremented any.
    ///
    /// # Errors
    ///
    /// `AlreadyRefunded`, `InvalidState` (cancelled or delivered orders),
    /// `Gateway` (charge reversal failed; nothing was changed), `Conflict`,
    /// or a repository error.
    #[instrument(skip(self))]
    pub async fn refund(&self, order_id: OrderId) -> Result<RefundOutcome, OrderServiceError> {
        let order = self.load(order_id).await?;

        match order.status {
            OrderStatus::Refunded => return Err(OrderServiceError::AlreadyRefunded(order_id)),
            OrderStatus::Cancelled => {
                return Err(OrderServiceError::InvalidState {
                    order_id,
                    reason: "cancelled orders cannot be refunded".to_string(),
                });
            }
            OrderStatus::Delivered => {
                return Err(OrderServiceError::InvalidState {
                    order_id,
                    reason: "delivered orders are closed".to_string(),
                });
            }
            OrderStatus::Pending | OrderStatus::Processing | OrderStatus::Shipped => {}
        }

        // Gateway half first: if the reversal fails, the whole refund
        // fails with no state changed.
        if let Some(reference) = &order.payment_reference {
            self.gateway.reverse_charge(reference).await?;
            info!(order_id = %order_id, reference = %reference, "charge reversed");
        }

        let moved = self
            .orders
            .update_status(order_id, order.status, OrderStatus::Refunded, None)
            .await?;
        if !moved {
            // The charge is already reversed but the status write lost a
            // race. Known dual-write exposure; needs an operator.
            error!(
                order_id = %order_id,
                "refund status write conflicted after charge reversal; manual review required"
            );
            return Err(OrderServiceError::Conflict(order_id));
        }

        // Stock restoration. Errors are collected, not allowed to abort
        // the remaining items' restorations.
        let mut restored = Vec::new();
        let mut failures = Vec::new();
        if order.status.stock_reserved() {
            let items = self.orders.list_items(order_id).await?;
            for item in &items {
                match self
                    .products
                    .adjust_stock(item.product_id, i64::from(item.quantity))
                    .await
                {
                    Ok(_) => restored.push(item.product_id),
                    Err(e) => {
                        error!(
                            order_id = %order_id,
                            product_id = %item.product_id,
                            error = %e,
                            "stock restoration failed for refunded item"
                        );
                        failures.push(RefundFailure {
                            product_id: item.product_id,
                            quantity: item.quantity,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        if failures.is_empty() {
            info!(order_id = %order_id, items = restored.len(), "refund complete");
        } else {
            warn!(
                order_id = %order_id,
                failed = failures.len(),
                "refund complete with stock restoration failures"
            );
        }

        Ok(RefundOutcome {
            order_id,
            restored,
            failures,
        })
    }
}
