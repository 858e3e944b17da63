//! Repository capability traits.
//!
//! These are the narrow interfaces through which the order lifecycle,
//! checkout, and cart code reach storage. The binaries provide PostgreSQL
//! implementations; the integration-test crate provides in-memory ones.
//!
//! Concurrency contract: `adjust_stock` must be atomic relative to
//! concurrent calls for the same product (implemented as a conditional
//! single-row `UPDATE` in PostgreSQL), and `update_status` /
//! `set_payment_reference` are conditional writes that report whether the
//! expected precondition held, so callers can detect a concurrent writer
//! having won.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{
    Cart, CartId, NewOrder, Order, OrderId, OrderItem, OrderStatus, Product, ProductId,
};

/// Infrastructure failure inside a repository.
///
/// These are logged with full context and surfaced to clients as generic
/// failures; they are never part of the domain vocabulary.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The backing store failed (connection, query, serialization).
    #[error("storage error: {0}")]
    Backend(String),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Constraint violation (e.g., duplicate key).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Failure adjusting a product's stock.
#[derive(Debug, Error)]
pub enum StockAdjustError {
    /// The decrement would take stock below zero.
    #[error("insufficient stock for product {product_id}")]
    Insufficient { product_id: ProductId },

    /// No such product.
    #[error("product {0} not found")]
    NotFound(ProductId),

    #[error(transparent)]
    Repo(#[from] RepositoryError),
}

/// Product catalog and stock.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Fetch a product by ID.
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Current on-hand stock for a product.
    async fn get_stock(&self, id: ProductId) -> Result<Option<i64>, RepositoryError>;

    /// Atomically apply `delta` (positive or negative) to a product's
    /// stock, failing with [`StockAdjustError::Insufficient`] if the result
    /// would be negative. Returns the new stock level.
    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<i64, StockAdjustError>;
}

/// Order persistence.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Create an order in `Pending` with its items and address snapshot.
    async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    /// Fetch an order header by ID.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Fetch an order header by its gateway charge reference.
    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, RepositoryError>;

    /// Line items for an order.
    async fn list_items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError>;

    /// Orders filtered by status, newest first.
    async fn list_by_status(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Conditionally move an order from `expected` to `next`, optionally
    /// attaching a tracking number. Returns `false` (and writes nothing)
    /// if the order's status no longer equals `expected`.
    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<bool, RepositoryError>;

    /// Set the gateway charge reference if - and only if - none is set.
    /// Returns `false` if a reference was already present.
    async fn set_payment_reference(
        &self,
        id: OrderId,
        reference: &str,
    ) -> Result<bool, RepositoryError>;
}

/// Durable key-value store for cart state.
///
/// Implementations namespace keys (e.g. `cart:{id}`) so the same store can
/// back other small blobs later.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Load a cart, `None` if the ID is unknown.
    async fn load(&self, id: CartId) -> Result<Option<Cart>, RepositoryError>;

    /// Persist the full cart state under its ID.
    async fn save(&self, id: CartId, cart: &Cart) -> Result<(), RepositoryError>;
}
