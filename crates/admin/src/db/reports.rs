//! Summary reporting queries for the back-office dashboard.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use bramble_core::RepositoryError;

use super::backend_err;

/// Order count for one lifecycle status.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Store-wide summary: order counts by status plus recognized revenue.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub orders_by_status: Vec<StatusCount>,
    pub total_orders: i64,
    /// Sum of order totals for paid, unrefunded orders.
    pub revenue: Decimal,
}

/// Compute the dashboard summary.
///
/// # Errors
///
/// Returns `RepositoryError` if a query fails.
pub async fn summary(pool: &PgPool) -> Result<SummaryReport, RepositoryError> {
    let orders_by_status: Vec<StatusCount> = sqlx::query_as(
        "SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY status",
    )
    .fetch_all(pool)
    .await
    .map_err(backend_err)?;

    let total_orders = orders_by_status.iter().map(|row| row.count).sum();

    let revenue: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(total), 0) FROM orders \
         WHERE status IN ('processing', 'shipped', 'delivered')",
    )
    .fetch_one(pool)
    .await
    .map_err(backend_err)?;

    Ok(SummaryReport {
        orders_by_status,
        total_orders,
        revenue,
    })
}
