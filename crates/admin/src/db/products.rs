//! Admin-side product access: lookups and the atomic stock adjustments
//! refunds depend on.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use bramble_core::{
    CurrencyCode, Product, ProductId, ProductRepository, RepositoryError, StockAdjustError,
};

use super::backend_err;

/// PostgreSQL-backed [`ProductRepository`] for the admin binary.
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

fn parse_product(row: &PgRow) -> Result<Product, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(backend_err)?;
    let currency_raw: String = row.try_get("currency").map_err(backend_err)?;
    let currency = currency_raw
        .parse::<CurrencyCode>()
        .map_err(|e| RepositoryError::DataCorruption(format!("product {id}: {e}")))?;

    Ok(Product {
        id: ProductId::new(id),
        name: row.try_get("name").map_err(backend_err)?,
        description: row.try_get("description").map_err(backend_err)?,
        price: row.try_get("price").map_err(backend_err)?,
        currency,
        stock: row.try_get("stock").map_err(backend_err)?,
        image_url: row.try_get("image_url").map_err(backend_err)?,
        created_at: row.try_get("created_at").map_err(backend_err)?,
        updated_at: row.try_get("updated_at").map_err(backend_err)?,
    })
}

#[async_trait]
impl ProductRepository for PgProductRepository {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        sqlx::query(
            "SELECT id, name, description, price, currency, stock, image_url, \
                    created_at, updated_at \
             FROM products WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?
        .as_ref()
        .map(parse_product)
        .transpose()
    }

    async fn get_stock(&self, id: ProductId) -> Result<Option<i64>, RepositoryError> {
        sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend_err)
    }

    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<i64, StockAdjustError> {
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

        match new_stock {
            Some(stock) => Ok(stock),
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
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
    }
}
