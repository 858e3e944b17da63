//! Application state shared across admin handlers.

use std::sync::Arc;

use sqlx::PgPool;

use bramble_core::{OrderRepository, PaymentGateway, ProductRepository};

use crate::config::AdminConfig;
use crate::db::{PgOrderRepository, PgProductRepository};
use crate::gateway::HttpPaymentGateway;
use crate::services::notify::SmtpShippingNotifier;
use crate::services::{LogOnlyNotifier, OrderAdminService, ShippingNotifier};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    orders: Arc<dyn OrderRepository>,
    service: OrderAdminService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Uses SMTP shipping notifications when configured, the log-only
    /// notifier otherwise.
    ///
    /// # Errors
    ///
    /// Returns an SMTP error if the configured relay address is invalid.
    pub fn new(
        config: AdminConfig,
        pool: PgPool,
    ) -> Result<Self, lettre::transport::smtp::Error> {
        let orders: Arc<dyn OrderRepository> = Arc::new(PgOrderRepository::new(pool.clone()));
        let products: Arc<dyn ProductRepository> =
            Arc::new(PgProductRepository::new(pool.clone()));
        let gateway: Arc<dyn PaymentGateway> = Arc::new(HttpPaymentGateway::new(&config.gateway));

        let notifier: Arc<dyn ShippingNotifier> = match &config.smtp {
            Some(smtp) => Arc::new(SmtpShippingNotifier::new(smtp)?),
            None => Arc::new(LogOnlyNotifier),
        };

        let service = OrderAdminService::new(Arc::clone(&orders), products, gateway, notifier);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                orders,
                service,
            }),
        })
    }

    /// Get a reference to the admin configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the order repository.
    #[must_use]
    pub fn orders(&self) -> &Arc<dyn OrderRepository> {
        &self.inner.orders
    }

    /// Get a reference to the order lifecycle service.
    #[must_use]
    pub fn service(&self) -> &OrderAdminService {
        &self.inner.service
    }
}
