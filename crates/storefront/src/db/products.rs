//! Product catalog queries and the PostgreSQL `ProductRepository`.
//!
//! Stock changes go through a single conditional `UPDATE` so concurrent
//! checkouts and refunds on the same product serialize at the row level
//! and stock can never go negative.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use bramble_core::{
    CurrencyCode, Product, ProductId, ProductRepository, RepositoryError, StockAdjustError,
};

use super::backend_err;

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    description: Option<String>,
    price: Decimal,
    currency: String,
    stock: i64,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self) -> Result<Product, RepositoryError> {
        let currency = self.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("product {}: {e}", self.id))
        })?;
        Ok(Product {
            id: ProductId::new(self.id),
            name: self.name,
            description: self.description,
            price: self.price,
            currency,
            stock: self.stock,
            image_url: self.image_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, currency, stock, image_url, created_at, updated_at";

// =============================================================================
// Catalog Queries
// =============================================================================

/// List products for the catalog page, name order.
///
/// # Errors
///
/// Returns `RepositoryError` if the query fails.
pub async fn list_products(pool: &PgPool, limit: i64) -> Result<Vec<Product>, RepositoryError> {
    let rows: Vec<ProductRow> = sqlx::query_as(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(backend_err)?;

    rows.into_iter().map(ProductRow::into_product).collect()
}

/// Case-insensitive substring search over product names and descriptions.
///
/// # Errors
///
/// Returns `RepositoryError` if the query fails.
pub async fn search_products(
    pool: &PgPool,
    term: &str,
    limit: i64,
) -> Result<Vec<Product>, RepositoryError> {
    let pattern = format!("%{}%", term.replace('%', "\\%").replace('_', "\\_"));
    let rows: Vec<ProductRow> = sqlx::query_as(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products \
         WHERE name ILIKE $1 OR description ILIKE $1 \
         ORDER BY name LIMIT $2"
    ))
    .bind(pattern)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(backend_err)?;

    rows.into_iter().map(ProductRow::into_product).collect()
}

// =============================================================================
// Repository Implementation
// =============================================================================

/// PostgreSQL-backed [`ProductRepository`].
#[derive(Clone)]
pub struct PgProductRepository {
    pool: PgPool,
}

impl PgProductRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        row.map(ProductRow::into_product).transpose()
    }

    async fn get_stock(&self, id: ProductId) -> Result<Option<i64>, RepositoryError> {
        sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)
    }

    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<i64, StockAdjustError> {
        // The condition makes the decrement atomic relative to concurrent
        // adjustments on the same row; Postgres row-locks the UPDATE.
        let new_stock: Option<i64> = sqlx::query_scalar(
            "UPDATE products \
             SET stock = stock + $2, updated_at = NOW() \
             WHERE id = $1 AND stock + $2 >= 0 \
             RETURNING stock",
        )
        .bind(id.as_i64())
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StockAdjustError::Repo(backend_err(e)))?;

        if let Some(stock) = new_stock {
            return Ok(stock);
        }

        // No row updated: either the product is unknown or the decrement
        // would go negative.
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(id.as_i64())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StockAdjustError::Repo(backend_err(e)))?;

        if exists {
            Err(StockAdjustError::Insufficient { product_id: id })
        } else {
            Err(StockAdjustError::NotFound(id))
        }
    }
}
