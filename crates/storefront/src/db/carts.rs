//! Durable cart persistence over the `kv_store` table.
//!
//! Cart state is written under a single namespaced key after every
//! mutation and rehydrated before the cart is served, so a transient empty
//! cart is never presented as authoritative.

use async_trait::async_trait;
use sqlx::PgPool;

use bramble_core::{Cart, CartId, CartStore, RepositoryError};

use super::backend_err;

/// Key namespace for cart blobs in `kv_store`.
fn cart_key(id: CartId) -> String {
    format!("cart:{id}")
}

/// PostgreSQL-backed [`CartStore`].
#[derive(Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn load(&self, id: CartId) -> Result<Option<Cart>, RepositoryError> {
        let value: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT value FROM kv_store WHERE key = $1")
                .bind(cart_key(id))
                .fetch_optional(&self.pool)
                .await
                .map_err(backend_err)?;

        value
            .map(serde_json::from_value::<Cart>)
            .transpose()
            .map_err(|e| RepositoryError::DataCorruption(format!("cart {id}: {e}")))
    }

    async fn save(&self, id: CartId, cart: &Cart) -> Result<(), RepositoryError> {
        let value = serde_json::to_value(cart)
            .map_err(|e| RepositoryError::DataCorruption(format!("cart {id}: {e}")))?;

        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = NOW()",
        )
        .bind(cart_key(id))
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(backend_err)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_cart_key_is_namespaced() {
        let id = CartId::from(Uuid::nil());
        assert_eq!(cart_key(id), "cart:00000000-0000-0000-0000-000000000000");
    }
}
