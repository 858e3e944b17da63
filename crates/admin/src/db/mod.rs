//! Database access for the admin binary.
//!
//! Connects to the same `bramble` database as the storefront; the admin
//! side only reads catalog/order state and performs the conditional writes
//! the lifecycle service needs. Migrations live with the storefront crate.

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use bramble_core::RepositoryError;

pub mod orders;
pub mod products;
pub mod reports;

pub use orders::PgOrderRepository;
pub use products::PgProductRepository;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Map a sqlx failure into the shared repository error type.
pub(crate) fn backend_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Backend(e.to_string())
}
