//! Order persistence: creation at checkout and the conditional writes the
//! lifecycle depends on.
//!
//! Status changes and payment-reference writes are conditional updates
//! (`WHERE status = expected`, `WHERE payment_reference IS NULL`) so a
//! concurrent writer loses cleanly instead of clobbering state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use bramble_core::{
    Address, CurrencyCode, NewOrder, Order, OrderId, OrderItem, OrderItemId, OrderRepository,
    OrderStatus, ProductId, RepositoryError, UserId,
};

use super::backend_err;

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for order header queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    status: String,
    total: Decimal,
    currency: String,
    payment_reference: Option<String>,
    tracking_number: Option<String>,
    shipping_address: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, RepositoryError> {
        let status = self.status.parse::<OrderStatus>().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", self.id))
        })?;
        let currency = self.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("order {}: {e}", self.id))
        })?;
        let shipping_address = self
            .shipping_address
            .map(serde_json::from_value::<Address>)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("order {} address: {e}", self.id))
            })?;

        Ok(Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            status,
            total: self.total,
            currency,
            payment_reference: self.payment_reference,
            tracking_number: self.tracking_number,
            shipping_address,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Internal row type for order item queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i64,
    order_id: i64,
    product_id: i64,
    quantity: i32,
    unit_price: Decimal,
}

impl OrderItemRow {
    fn into_item(self) -> Result<OrderItem, RepositoryError> {
        let quantity = u32::try_from(self.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "order item {}: negative quantity {}",
                self.id, self.quantity
            ))
        })?;
        Ok(OrderItem {
            id: OrderItemId::new(self.id),
            order_id: OrderId::new(self.order_id),
            product_id: ProductId::new(self.product_id),
            quantity,
            unit_price: self.unit_price,
        })
    }
}

const ORDER_COLUMNS: &str = "id, user_id, status, total, currency, payment_reference, \
                             tracking_number, shipping_address, created_at, updated_at";

// =============================================================================
// Repository Implementation
// =============================================================================

/// PostgreSQL-backed [`OrderRepository`].
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let total = order.total();
        let address = serde_json::to_value(&order.shipping_address).map_err(|e| {
            RepositoryError::DataCorruption(format!("address serialization: {e}"))
        })?;

        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        let row: OrderRow = sqlx::query_as(&format!(
            "INSERT INTO orders (user_id, status, total, currency, shipping_address) \
             VALUES ($1, 'pending', $2, $3, $4) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.user_id.as_i64())
        .bind(total)
        .bind(order.currency.code())
        .bind(address)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend_err)?;

        for item in &order.items {
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                RepositoryError::DataCorruption(format!(
                    "order item quantity {} out of range",
                    item.quantity
                ))
            })?;
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, unit_price) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(row.id)
            .bind(item.product_id.as_i64())
            .bind(quantity)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await
            .map_err(backend_err)?;
        }

        tx.commit().await.map_err(backend_err)?;
        row.into_order()
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id.as_i64())
                .fetch_optional(&self.pool)
                .await
                .map_err(backend_err)?;

        row.map(OrderRow::into_order).transpose()
    }

    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        row.map(OrderRow::into_order).transpose()
    }

    async fn list_items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT id, order_id, product_id, quantity, unit_price \
             FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.into_iter().map(OrderItemRow::into_item).collect()
    }

    async fn list_by_status(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE $1::TEXT IS NULL OR status = $1 \
             ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(status.map(|s| s.to_string()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders \
             SET status = $3, \
                 tracking_number = COALESCE($4, tracking_number), \
                 updated_at = NOW() \
             WHERE id = $1 AND status = $2",
        )
        .bind(id.as_i64())
        .bind(expected.to_string())
        .bind(next.to_string())
        .bind(tracking_number)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_payment_reference(
        &self,
        id: OrderId,
        reference: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE orders \
             SET payment_reference = $2, updated_at = NOW() \
             WHERE id = $1 AND payment_reference IS NULL",
        )
        .bind(id.as_i64())
        .bind(reference)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(result.rows_affected() == 1)
    }
}
