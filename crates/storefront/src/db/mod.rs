//! Database access for the storefront.
//!
//! # Tables
//!
//! - `products` - catalog with authoritative stock counts
//! - `orders` / `order_items` - order lifecycle state (shared with admin)
//! - `kv_store` - durable cart state under `cart:{uuid}` keys
//! - `search_queries` - search term log for the popular-terms aggregate
//!
//! # Migrations
//!
//! Migrations live in `crates/storefront/migrations/` and are applied
//! explicitly with `sqlx migrate run` - never automatically at startup.

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use bramble_core::RepositoryError;

pub mod carts;
pub mod orders;
pub mod products;
pub mod search;

pub use carts::PgCartStore;
pub use orders::PgOrderRepository;
pub use products::PgProductRepository;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a sqlx failure into the shared repository error type.
pub(crate) fn backend_err(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            RepositoryError::Conflict(e.to_string())
        }
        _ => RepositoryError::Backend(e.to_string()),
    }
}
