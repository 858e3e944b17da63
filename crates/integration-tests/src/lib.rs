//! Test support for Bramble integration tests.
//!
//! In-memory implementations of the capability traits, with the failure
//! injection the partial-failure scenarios need: per-product stock
//! adjustment failures, scripted gateway declines/outages, one-shot
//! status-write conflicts, and a notifier that can be told to fail.
//!
//! These mirror the contracts of the PostgreSQL implementations: stock can
//! never go negative, status writes are conditional on the expected
//! current value, and the payment reference is set at most once.

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::expect_used)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

use bramble_admin::services::{NotifyError, ShippingNotifier, ShippingUpdate};
use bramble_core::{
    Address, Cart, CartId, CartStore, Charge, ChargeRequest, CurrencyCode, GatewayError, NewOrder,
    Order, OrderId, OrderItem, OrderItemId, OrderRepository, OrderStatus, PaymentGateway, Product,
    ProductId, ProductRepository, RepositoryError, StockAdjustError, UserId,
};

// =============================================================================
// Builders
// =============================================================================

/// A catalog product with the given price (whole units) and stock.
#[must_use]
pub fn product(id: i64, price: Decimal, stock: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("product-{id}"),
        description: None,
        price,
        currency: CurrencyCode::USD,
        stock,
        image_url: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// A shipping address for test orders.
#[must_use]
pub fn test_address() -> Address {
    Address {
        name: "Quinn Harper".to_string(),
        email: "quinn@example.com".to_string(),
        line1: "14 Alder Row".to_string(),
        line2: None,
        city: "Portland".to_string(),
        region: "OR".to_string(),
        postal_code: "97209".to_string(),
        country: "US".to_string(),
    }
}

// =============================================================================
// Product Repository
// =============================================================================

/// In-memory [`ProductRepository`] with per-product failure injection.
#[derive(Default)]
pub struct InMemoryProductRepository {
    products: Mutex<HashMap<ProductId, Product>>,
    failing: Mutex<HashSet<ProductId>>,
}

impl InMemoryProductRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, product: Product) {
        self.products
            .lock()
            .expect("lock poisoned")
            .insert(product.id, product);
    }

    /// Make every future `adjust_stock` for `id` fail with a backend error.
    pub fn fail_adjustments_for(&self, id: ProductId) {
        self.failing.lock().expect("lock poisoned").insert(id);
    }

    /// Current stock, for assertions.
    #[must_use]
    pub fn stock_of(&self, id: ProductId) -> i64 {
        self.products
            .lock()
            .expect("lock poisoned")
            .get(&id)
            .map_or(0, |p| p.stock)
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.products.lock().expect("lock poisoned").get(&id).cloned())
    }

    async fn get_stock(&self, id: ProductId) -> Result<Option<i64>, RepositoryError> {
        Ok(self
            .products
            .lock()
            .expect("lock poisoned")
            .get(&id)
            .map(|p| p.stock))
    }

    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<i64, StockAdjustError> {
        if self.failing.lock().expect("lock poisoned").contains(&id) {
            return Err(StockAdjustError::Repo(RepositoryError::Backend(
                "injected adjustment failure".to_string(),
            )));
        }

        let mut products = self.products.lock().expect("lock poisoned");
        let Some(product) = products.get_mut(&id) else {
            return Err(StockAdjustError::NotFound(id));
        };
        let next = product.stock + delta;
        if next < 0 {
            return Err(StockAdjustError::Insufficient { product_id: id });
        }
        product.stock = next;
        Ok(next)
    }
}

// =============================================================================
// Order Repository
// =============================================================================

/// In-memory [`OrderRepository`] with a one-shot conflict switch for
/// exercising the optimistic-guard paths.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<HashMap<OrderId, Order>>,
    items: Mutex<HashMap<OrderId, Vec<OrderItem>>>,
    next_order_id: AtomicI64,
    next_item_id: AtomicI64,
    conflict_next_status_write: AtomicBool,
}

impl InMemoryOrderRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `update_status` report a lost race.
    pub fn prime_status_conflict(&self) {
        self.conflict_next_status_write.store(true, Ordering::SeqCst);
    }

    /// Current status, for assertions.
    #[must_use]
    pub fn status_of(&self, id: OrderId) -> Option<OrderStatus> {
        self.orders
            .lock()
            .expect("lock poisoned")
            .get(&id)
            .map(|o| o.status)
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let id = OrderId::new(self.next_order_id.fetch_add(1, Ordering::SeqCst) + 1);
        let now = Utc::now();

        let created = Order {
            id,
            user_id: order.user_id,
            status: OrderStatus::Pending,
            total: order.total(),
            currency: order.currency,
            payment_reference: None,
            tracking_number: None,
            shipping_address: Some(order.shipping_address),
            created_at: now,
            updated_at: now,
        };

        let items: Vec<OrderItem> = order
            .items
            .iter()
            .map(|item| OrderItem {
                id: OrderItemId::new(self.next_item_id.fetch_add(1, Ordering::SeqCst) + 1),
                order_id: id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        self.orders
            .lock()
            .expect("lock poisoned")
            .insert(id, created.clone());
        self.items.lock().expect("lock poisoned").insert(id, items);
        Ok(created)
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.lock().expect("lock poisoned").get(&id).cloned())
    }

    async fn find_by_payment_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .orders
            .lock()
            .expect("lock poisoned")
            .values()
            .find(|o| o.payment_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn list_items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        Ok(self
            .items
            .lock()
            .expect("lock poisoned")
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_by_status(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.lock().expect("lock poisoned");
        let mut matching: Vec<Order> = orders
            .values()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(matching)
    }

    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        tracking_number: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        if self.conflict_next_status_write.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }

        let mut orders = self.orders.lock().expect("lock poisoned");
        let Some(order) = orders.get_mut(&id) else {
            return Ok(false);
        };
        if order.status != expected {
            return Ok(false);
        }
        order.status = next;
        if let Some(tracking) = tracking_number {
            order.tracking_number = Some(tracking.to_string());
        }
        order.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_payment_reference(
        &self,
        id: OrderId,
        reference: &str,
    ) -> Result<bool, RepositoryError> {
        let mut orders = self.orders.lock().expect("lock poisoned");
        let Some(order) = orders.get_mut(&id) else {
            return Ok(false);
        };
        if order.payment_reference.is_some() {
            return Ok(false);
        }
        order.payment_reference = Some(reference.to_string());
        order.updated_at = Utc::now();
        Ok(true)
    }
}

// =============================================================================
// Cart Store
// =============================================================================

/// In-memory [`CartStore`].
#[derive(Default)]
pub struct InMemoryCartStore {
    carts: Mutex<HashMap<CartId, Cart>>,
}

impl InMemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn load(&self, id: CartId) -> Result<Option<Cart>, RepositoryError> {
        Ok(self.carts.lock().expect("lock poisoned").get(&id).cloned())
    }

    async fn save(&self, id: CartId, cart: &Cart) -> Result<(), RepositoryError> {
        self.carts
            .lock()
            .expect("lock poisoned")
            .insert(id, cart.clone());
        Ok(())
    }
}

// =============================================================================
// Payment Gateway
// =============================================================================

/// Scripted gateway failure mode.
#[derive(Debug, Clone, Copy)]
pub enum GatewayFailure {
    /// Charge processed and declined.
    Declined,
    /// Gateway unreachable / timed out.
    Unavailable,
}

impl GatewayFailure {
    fn into_error(self) -> GatewayError {
        match self {
            Self::Declined => GatewayError::Declined("card declined".to_string()),
            Self::Unavailable => GatewayError::Unavailable("connection timed out".to_string()),
        }
    }
}

/// In-memory [`PaymentGateway`] recording charges and reversals.
#[derive(Default)]
pub struct FakePaymentGateway {
    counter: AtomicU64,
    charges: Mutex<Vec<ChargeRequest>>,
    reversed: Mutex<Vec<String>>,
    fail_create: Mutex<Option<GatewayFailure>>,
    fail_reverse: Mutex<Option<GatewayFailure>>,
}

impl FakePaymentGateway {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_create(&self, failure: GatewayFailure) {
        *self.fail_create.lock().expect("lock poisoned") = Some(failure);
    }

    pub fn fail_reversals(&self, failure: GatewayFailure) {
        *self.fail_reverse.lock().expect("lock poisoned") = Some(failure);
    }

    pub fn allow_reversals(&self) {
        *self.fail_reverse.lock().expect("lock poisoned") = None;
    }

    #[must_use]
    pub fn charge_count(&self) -> usize {
        self.charges.lock().expect("lock poisoned").len()
    }

    #[must_use]
    pub fn reversed_references(&self) -> Vec<String> {
        self.reversed.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn create_charge(&self, request: ChargeRequest) -> Result<Charge, GatewayError> {
        if let Some(failure) = self.fail_create.lock().expect("lock poisoned").take() {
            return Err(failure.into_error());
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.charges.lock().expect("lock poisoned").push(request);
        Ok(Charge {
            reference: format!("ch_{n}"),
            client_secret: format!("cs_{n}"),
        })
    }

    async fn reverse_charge(&self, reference: &str) -> Result<(), GatewayError> {
        if let Some(failure) = *self.fail_reverse.lock().expect("lock poisoned") {
            return Err(failure.into_error());
        }
        self.reversed
            .lock()
            .expect("lock poisoned")
            .push(reference.to_string());
        Ok(())
    }
}

// =============================================================================
// Shipping Notifier
// =============================================================================

/// Notifier that records every update and can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<ShippingUpdate>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_sends(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn sent(&self) -> Vec<ShippingUpdate> {
        self.sent.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl ShippingNotifier for RecordingNotifier {
    async fn shipping_update(&self, update: ShippingUpdate) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::InvalidAddress("injected failure".to_string()));
        }
        self.sent.lock().expect("lock poisoned").push(update);
        Ok(())
    }
}

// =============================================================================
// Convenience
// =============================================================================

/// A user ID for test orders.
#[must_use]
pub fn test_user() -> UserId {
    UserId::new(7)
}
