//! Admin-side order persistence.
//!
//! The lifecycle service depends on the conditional writes here: a status
//! change only lands when the row still holds the expected current status,
//! so two admins acting on the same order at once cannot both win.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use bramble_core::{
    Address, CurrencyCode, NewOrder, Order, OrderId, OrderItem, OrderItemId, OrderRepository,
    OrderStatus, ProductId, RepositoryError, UserId,
};

use super::backend_err;

const ORDER_COLUMNS: &str = "id, user_id, status, total, currency, payment_reference, \
                             tracking_number, shipping_address, created_at, updated_at";

/// PostgreSQL-backed [`OrderRepository`] for the admin binary.
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

fn parse_order(row: &PgRow) -> Result<Order, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(backend_err)?;
    let status_raw: String = row.try_get("status").map_err(backend_err)?;
    let currency_raw: String = row.try_get("currency").map_err(backend_err)?;
    let address_raw: Option<serde_json::Value> =
        row.try_get("shipping_address").map_err(backend_err)?;

    let status = status_raw
        .parse::<OrderStatus>()
        .map_err(|e| RepositoryError::DataCorruption(format!("order {id}: {e}")))?;
    let currency = currency_raw
        .parse::<CurrencyCode>()
        .map_err(|e| RepositoryError::DataCorruption(format!("order {id}: {e}")))?;
    let shipping_address = address_raw
        .map(serde_json::from_value::<Address>)
        .transpose()
        .map_err(|e| RepositoryError::DataCorruption(format!("order {id} address: {e}")))?;

    Ok(Order {
        id: OrderId::new(id),
        user_id: UserId::new(row.try_get("user_id").map_err(backend_err)?),
        status,
        total: row.try_get("total").map_err(backend_err)?,
        currency,
        payment_reference: row.try_get("payment_reference").map_err(backend_err)?,
        tracking_number: row.try_get("tracking_number").map_err(backend_err)?,
        shipping_address,
        created_at: row.try_get("created_at").map_err(backend_err)?,
        updated_at: row.try_get("updated_at").map_err(backend_err)?,
    })
}

fn parse_item(row: &PgRow) -> Result<OrderItem, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(backend_err)?;
    let quantity: i32 = row.try_get("quantity").map_err(backend_err)?;
    let quantity = u32::try_from(quantity).map_err(|_| {
        RepositoryError::DataCorruption(format!("order item {id}: negative quantity {quantity}"))
    })?;

    Ok(OrderItem {
        id: OrderItemId::new(id),
        order_id: OrderId::new(row.try_get("order_id").map_err(backend_err)?),
        product_id: ProductId::new(row.try_get("product_id").map_err(backend_err)?),
        quantity,
        unit_price: row.try_get("unit_price").map_err(backend_err)?,
    })
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        // Order entry is the storefront's job; the admin-side
        // implementation exists for trait completeness (e.g. support
        // tooling creating a replacement order) and bulk-inserts the items
        // in one statement.
        let total = order.total();
        let address = serde_json::to_value(&order.shipping_address)
            .map_err(|e| RepositoryError::DataCorruption(format!("address serialization: {e}")))?;

        let mut tx = self.pool.begin().await.map_err(backend_err)?;

        let row = sqlx::query(&format!(
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
        let created = parse_order(&row)?;

        let product_ids: Vec<i64> = order.items.iter().map(|i| i.product_id.as_i64()).collect();
        let quantities: Vec<i64> = order.items.iter().map(|i| i64::from(i.quantity)).collect();
        let prices: Vec<rust_decimal::Decimal> =
            order.items.iter().map(|i| i.unit_price).collect();

        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, unit_price) \
             SELECT $1, product_id, quantity, unit_price \
             FROM UNNEST($2::BIGINT[], $3::BIGINT[], $4::NUMERIC[]) \
                  AS items (product_id, quantity, unit_price)",
        )
        .bind(created.id.as_i64())
        .bind(&product_ids)
        .bind(&quantities)
        .bind(&prices)
        .execute(&mut *tx)
        .await
        .map_err(backend_err)?;

        tx.commit().await.map_err(backend_err)?;
        Ok(created)
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)?
            .as_ref()
            .map(parse_order)
            .transpose()
    }

    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?
        .as_ref()
        .map(parse_order)
        .transpose()
    }

    async fn list_items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        sqlx::query(
            "SELECT id, order_id, product_id, quantity, unit_price \
             FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(id.as_i64())
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?
        .iter()
        .map(parse_item)
        .collect()
    }

    async fn list_by_status(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE $1::TEXT IS NULL OR status = $1 \
             ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(status.map(|s| s.to_string()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(backend_err)?
        .iter()
        .map(parse_order)
        .collect()
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
