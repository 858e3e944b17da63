//! End-to-end tests of the checkout and payment confirmation flow.
//!
//! Uses the in-memory capability implementations; no database or gateway.

use std::sync::Arc;

use rust_decimal::Decimal;

use bramble_core::{
    Cart, CartId, CartItem, CartStore, CurrencyCode, OrderRepository, OrderStatus, PaymentEvent,
    PaymentGateway, ProductId, ProductRepository,
};
use bramble_integration_tests::{
    FakePaymentGateway, GatewayFailure, InMemoryCartStore, InMemoryOrderRepository,
    InMemoryProductRepository, product, test_address, test_user,
};
use bramble_storefront::services::{CheckoutError, CheckoutService};

struct Fixture {
    products: Arc<InMemoryProductRepository>,
    orders: Arc<InMemoryOrderRepository>,
    carts: Arc<InMemoryCartStore>,
    gateway: Arc<FakePaymentGateway>,
    service: CheckoutService,
}

fn fixture() -> Fixture {
    let products = Arc::new(InMemoryProductRepository::new());
    let orders = Arc::new(InMemoryOrderRepository::new());
    let carts = Arc::new(InMemoryCartStore::new());
    let gateway = Arc::new(FakePaymentGateway::new());

    let service = CheckoutService::new(
        Arc::clone(&products) as Arc<dyn ProductRepository>,
        Arc::clone(&orders) as Arc<dyn OrderRepository>,
        Arc::clone(&carts) as Arc<dyn CartStore>,
        Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
        CurrencyCode::USD,
    );

    Fixture {
        products,
        orders,
        carts,
        gateway,
        service,
    }
}

/// Build a cart holding 1x product 1 and 2x product 2 and persist it.
async fn seed_standard_cart(fx: &Fixture) -> CartId {
    let p1 = product(1, Decimal::new(100, 0), 5);
    let p2 = product(2, Decimal::new(50, 0), 4);
    fx.products.insert(p1.clone());
    fx.products.insert(p2.clone());

    let (cart, _) = Cart::new().add_item(&p1);
    let (cart, _) = cart.add_item(&p2);
    let (cart, _) = cart.add_item(&p2);

    let cart_id = CartId::generate();
    fx.carts.save(cart_id, &cart).await.expect("save cart");
    cart_id
}

#[tokio::test]
async fn test_end_to_end_checkout_flow() {
    let fx = fixture();
    let cart_id = seed_standard_cart(&fx).await;

    // Place the order: total captured, stock untouched, cart consumed.
    let order = fx
        .service
        .place_order(cart_id, test_user(), test_address())
        .await
        .expect("place order");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total, Decimal::new(200, 0));
    assert_eq!(fx.products.stock_of(ProductId::new(1)), 5);
    assert_eq!(fx.products.stock_of(ProductId::new(2)), 4);
    let leftover = fx.carts.load(cart_id).await.expect("load").expect("cart");
    assert!(leftover.is_empty());

    // Initiate payment: 200 + 10 shipping + 20 tax.
    let intent = fx
        .service
        .initiate_payment(order.id)
        .await
        .expect("initiate payment");
    assert_eq!(intent.amount.amount, Decimal::new(230, 0));
    assert_eq!(intent.amount.currency, CurrencyCode::USD);
    assert_eq!(fx.gateway.charge_count(), 1);

    // Confirm: the reservation point decrements stock per item.
    let event = PaymentEvent {
        kind: "charge.authorized".to_string(),
        reference: intent.reference.clone(),
    };
    let confirmed = fx.service.confirm_payment(&event).await.expect("confirm");
    assert_eq!(confirmed.status, OrderStatus::Processing);
    assert_eq!(fx.products.stock_of(ProductId::new(1)), 4);
    assert_eq!(fx.products.stock_of(ProductId::new(2)), 2);
}

#[tokio::test]
async fn test_initiate_twice_fails_without_second_charge() {
    let fx = fixture();
    let cart_id = seed_standard_cart(&fx).await;
    let order = fx
        .service
        .place_order(cart_id, test_user(), test_address())
        .await
        .expect("place order");

    fx.service
        .initiate_payment(order.id)
        .await
        .expect("first initiation");
    let second = fx.service.initiate_payment(order.id).await;

    assert!(matches!(second, Err(CheckoutError::AlreadyPaid(_))));
    assert_eq!(fx.gateway.charge_count(), 1);
}

#[tokio::test]
async fn test_gateway_decline_leaves_order_unpaid() {
    let fx = fixture();
    let cart_id = seed_standard_cart(&fx).await;
    let order = fx
        .service
        .place_order(cart_id, test_user(), test_address())
        .await
        .expect("place order");

    fx.gateway.fail_next_create(GatewayFailure::Declined);
    let result = fx.service.initiate_payment(order.id).await;
    assert!(matches!(result, Err(CheckoutError::Gateway(_))));

    // No reference persisted: initiation is safe to retry.
    let reloaded = fx
        .orders
        .find_by_id(order.id)
        .await
        .expect("find")
        .expect("order");
    assert!(reloaded.payment_reference.is_none());

    let retry = fx.service.initiate_payment(order.id).await;
    assert!(retry.is_ok());
}

#[tokio::test]
async fn test_confirm_with_insufficient_stock_restores_applied_decrements() {
    let fx = fixture();
    let cart_id = seed_standard_cart(&fx).await;
    let order = fx
        .service
        .place_order(cart_id, test_user(), test_address())
        .await
        .expect("place order");
    let intent = fx
        .service
        .initiate_payment(order.id)
        .await
        .expect("initiate");

    // A competing order drains product 2 before this one confirms.
    fx.products
        .adjust_stock(ProductId::new(2), -3)
        .await
        .expect("drain stock");
    assert_eq!(fx.products.stock_of(ProductId::new(2)), 1);

    let event = PaymentEvent {
        kind: "charge.authorized".to_string(),
        reference: intent.reference,
    };
    let result = fx.service.confirm_payment(&event).await;

    match result {
        Err(CheckoutError::InsufficientStock { product_id }) => {
            assert_eq!(product_id, ProductId::new(2));
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    // Product 1's decrement was rolled back and the order is still pending.
    assert_eq!(fx.products.stock_of(ProductId::new(1)), 5);
    assert_eq!(fx.orders.status_of(order.id), Some(OrderStatus::Pending));
}

#[tokio::test]
async fn test_confirm_is_idempotent_under_redelivery() {
    let fx = fixture();
    let cart_id = seed_standard_cart(&fx).await;
    let order = fx
        .service
        .place_order(cart_id, test_user(), test_address())
        .await
        .expect("place order");
    let intent = fx
        .service
        .initiate_payment(order.id)
        .await
        .expect("initiate");

    let event = PaymentEvent {
        kind: "charge.authorized".to_string(),
        reference: intent.reference,
    };
    fx.service.confirm_payment(&event).await.expect("first");
    let second = fx.service.confirm_payment(&event).await.expect("redelivery");

    assert_eq!(second.status, OrderStatus::Processing);
    // Stock decremented exactly once.
    assert_eq!(fx.products.stock_of(ProductId::new(1)), 4);
    assert_eq!(fx.products.stock_of(ProductId::new(2)), 2);
}

#[tokio::test]
async fn test_confirm_rejects_unknown_reference_and_wrong_kind() {
    let fx = fixture();

    let unknown = PaymentEvent {
        kind: "charge.authorized".to_string(),
        reference: "ch_missing".to_string(),
    };
    assert!(matches!(
        fx.service.confirm_payment(&unknown).await,
        Err(CheckoutError::UnknownPaymentReference(_))
    ));

    let failed = PaymentEvent {
        kind: "charge.failed".to_string(),
        reference: "ch_1".to_string(),
    };
    assert!(matches!(
        fx.service.confirm_payment(&failed).await,
        Err(CheckoutError::UnexpectedEvent(_))
    ));
}

#[tokio::test]
async fn test_place_order_rejects_empty_and_unknown_carts() {
    let fx = fixture();

    let empty_id = CartId::generate();
    fx.carts
        .save(empty_id, &Cart::new())
        .await
        .expect("save empty cart");
    assert!(matches!(
        fx.service
            .place_order(empty_id, test_user(), test_address())
            .await,
        Err(CheckoutError::EmptyCart)
    ));

    assert!(matches!(
        fx.service
            .place_order(CartId::generate(), test_user(), test_address())
            .await,
        Err(CheckoutError::CartNotFound(_))
    ));
}

#[tokio::test]
async fn test_order_captures_catalog_price_not_cart_snapshot() {
    let fx = fixture();
    let p1 = product(1, Decimal::new(100, 0), 5);
    fx.products.insert(p1);

    // A tampered client cart claims the product costs 1.
    let cart = Cart {
        items: vec![CartItem {
            product_id: ProductId::new(1),
            name: "product-1".to_string(),
            price: Decimal::new(1, 0),
            image_url: None,
            quantity: 2,
            stock: 5,
        }],
    };
    let cart_id = CartId::generate();
    fx.carts.save(cart_id, &cart).await.expect("save cart");

    let order = fx
        .service
        .place_order(cart_id, test_user(), test_address())
        .await
        .expect("place order");

    // The order total comes from the catalog price.
    assert_eq!(order.total, Decimal::new(200, 0));
}
