//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use bramble_core::{CartStore, OrderRepository, PaymentGateway, ProductRepository};

use crate::config::StorefrontConfig;
use crate::db::{PgCartStore, PgOrderRepository, PgProductRepository};
use crate::gateway::HttpPaymentGateway;
use crate::middleware::FixedWindowLimiter;
use crate::search::PopularTermsCache;
use crate::services::CheckoutService;

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The repositories and gateway are held as
/// trait objects so tests can assemble the same services over in-memory
/// implementations.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    products: Arc<dyn ProductRepository>,
    orders: Arc<dyn OrderRepository>,
    carts: Arc<dyn CartStore>,
    gateway: Arc<dyn PaymentGateway>,
    checkout: CheckoutService,
    limiter: Arc<FixedWindowLimiter>,
    popular_cache: PopularTermsCache,
}

impl AppState {
    /// Create a new application state over PostgreSQL-backed repositories
    /// and the HTTP payment gateway.
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Self {
        let products: Arc<dyn ProductRepository> =
            Arc::new(PgProductRepository::new(pool.clone()));
        let orders: Arc<dyn OrderRepository> = Arc::new(PgOrderRepository::new(pool.clone()));
        let carts: Arc<dyn CartStore> = Arc::new(PgCartStore::new(pool.clone()));
        let gateway: Arc<dyn PaymentGateway> = Arc::new(HttpPaymentGateway::new(&config.gateway));

        let checkout = CheckoutService::new(
            Arc::clone(&products),
            Arc::clone(&orders),
            Arc::clone(&carts),
            Arc::clone(&gateway),
            config.currency,
        );
        let limiter = Arc::new(FixedWindowLimiter::new(config.rate_limit));
        let popular_cache = PopularTermsCache::new(config.popular_cache);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                products,
                orders,
                carts,
                gateway,
                checkout,
                limiter,
                popular_cache,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the product repository.
    #[must_use]
    pub fn products(&self) -> &Arc<dyn ProductRepository> {
        &self.inner.products
    }

    /// Get a reference to the order repository.
    #[must_use]
    pub fn orders(&self) -> &Arc<dyn OrderRepository> {
        &self.inner.orders
    }

    /// Get a reference to the cart store.
    #[must_use]
    pub fn carts(&self) -> &Arc<dyn CartStore> {
        &self.inner.carts
    }

    /// Get a reference to the payment gateway.
    #[must_use]
    pub fn gateway(&self) -> &Arc<dyn PaymentGateway> {
        &self.inner.gateway
    }

    /// Get a reference to the checkout service.
    #[must_use]
    pub fn checkout(&self) -> &CheckoutService {
        &self.inner.checkout
    }

    /// Get a reference to the search rate limiter.
    #[must_use]
    pub fn limiter(&self) -> &Arc<FixedWindowLimiter> {
        &self.inner.limiter
    }

    /// Get a reference to the popular-terms cache.
    #[must_use]
    pub fn popular_cache(&self) -> &PopularTermsCache {
        &self.inner.popular_cache
    }
}
