//! Tests of the refund workflow: gateway reversal, status change, and
//! all-items stock restoration with partial-failure collection.

use std::sync::Arc;

use rust_decimal::Decimal;

use bramble_admin::services::{OrderAdminService, OrderServiceError, ShippingNotifier};
use bramble_core::{
    CurrencyCode, NewOrder, NewOrderItem, Order, OrderRepository, OrderStatus, PaymentGateway,
    ProductId, ProductRepository,
};
use bramble_integration_tests::{
    FakePaymentGateway, GatewayFailure, InMemoryOrderRepository, InMemoryProductRepository,
    RecordingNotifier, product, test_address, test_user,
};

struct Fixture {
    products: Arc<InMemoryProductRepository>,
    orders: Arc<InMemoryOrderRepository>,
    gateway: Arc<FakePaymentGateway>,
    service: OrderAdminService,
}

fn fixture() -> Fixture {
    let products = Arc::new(InMemoryProductRepository::new());
    let orders = Arc::new(InMemoryOrderRepository::new());
    let gateway = Arc::new(FakePaymentGateway::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let service = OrderAdminService::new(
        Arc::clone(&orders) as Arc<dyn OrderRepository>,
        Arc::clone(&products) as Arc<dyn ProductRepository>,
        Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
        notifier as Arc<dyn ShippingNotifier>,
    );

    Fixture {
        products,
        orders,
        gateway,
        service,
    }
}

/// Seed a paid, confirmed order: 1x product 1 (price 100) and 2x product 2
/// (price 50). Stock starts at 5 and 4 and the confirmation decrement is
/// applied, leaving 4 and 2.
async fn confirmed_order(fx: &Fixture) -> Order {
    fx.products.insert(product(1, Decimal::new(100, 0), 5));
    fx.products.insert(product(2, Decimal::new(50, 0), 4));

    let order = fx
        .orders
        .create(NewOrder {
            user_id: test_user(),
            currency: CurrencyCode::USD,
            items: vec![
                NewOrderItem {
                    product_id: ProductId::new(1),
                    quantity: 1,
                    unit_price: Decimal::new(100, 0),
                },
                NewOrderItem {
                    product_id: ProductId::new(2),
                    quantity: 2,
                    unit_price: Decimal::new(50, 0),
                },
            ],
            shipping_address: test_address(),
        })
        .await
        .expect("create order");

    let claimed = fx
        .orders
        .set_payment_reference(order.id, "ch_seed")
        .await
        .expect("set reference");
    assert!(claimed);

    // Reservation point.
    fx.products
        .adjust_stock(ProductId::new(1), -1)
        .await
        .expect("reserve p1");
    fx.products
        .adjust_stock(ProductId::new(2), -2)
        .await
        .expect("reserve p2");
    let moved = fx
        .orders
        .update_status(order.id, OrderStatus::Pending, OrderStatus::Processing, None)
        .await
        .expect("confirm");
    assert!(moved);

    fx.orders
        .find_by_id(order.id)
        .await
        .expect("find")
        .expect("order")
}

#[tokio::test]
async fn test_refund_reverses_charge_and_restores_all_stock() {
    let fx = fixture();
    let order = confirmed_order(&fx).await;
    assert_eq!(fx.products.stock_of(ProductId::new(1)), 4);
    assert_eq!(fx.products.stock_of(ProductId::new(2)), 2);

    let outcome = fx.service.refund(order.id).await.expect("refund");

    assert!(outcome.fully_restored());
    assert_eq!(outcome.restored.len(), 2);
    assert_eq!(fx.orders.status_of(order.id), Some(OrderStatus::Refunded));
    assert_eq!(fx.gateway.reversed_references(), vec!["ch_seed".to_string()]);
    // stock_after = stock_before + quantity, for every item.
    assert_eq!(fx.products.stock_of(ProductId::new(1)), 5);
    assert_eq!(fx.products.stock_of(ProductId::new(2)), 4);
}

#[tokio::test]
async fn test_refund_is_idempotent_in_effect() {
    let fx = fixture();
    let order = confirmed_order(&fx).await;

    fx.service.refund(order.id).await.expect("first refund");
    let second = fx.service.refund(order.id).await;

    assert!(matches!(second, Err(OrderServiceError::AlreadyRefunded(_))));
    // Neither the reversal nor the restoration happened twice.
    assert_eq!(fx.gateway.reversed_references().len(), 1);
    assert_eq!(fx.products.stock_of(ProductId::new(1)), 5);
    assert_eq!(fx.products.stock_of(ProductId::new(2)), 4);
}

#[tokio::test]
async fn test_refund_rejected_for_cancelled_and_delivered() {
    let fx = fixture();

    let cancelled = confirmed_order(&fx).await;
    let moved = fx
        .orders
        .update_status(
            cancelled.id,
            OrderStatus::Processing,
            OrderStatus::Cancelled,
            None,
        )
        .await
        .expect("cancel");
    assert!(moved);
    assert!(matches!(
        fx.service.refund(cancelled.id).await,
        Err(OrderServiceError::InvalidState { .. })
    ));

    let delivered = confirmed_order(&fx).await;
    for (from, to) in [
        (OrderStatus::Processing, OrderStatus::Shipped),
        (OrderStatus::Shipped, OrderStatus::Delivered),
    ] {
        let moved = fx
            .orders
            .update_status(delivered.id, from, to, None)
            .await
            .expect("seed");
        assert!(moved);
    }
    assert!(matches!(
        fx.service.refund(delivered.id).await,
        Err(OrderServiceError::InvalidState { .. })
    ));
    assert!(fx.gateway.reversed_references().is_empty());
}

#[tokio::test]
async fn test_gateway_failure_aborts_refund_with_no_state_change() {
    let fx = fixture();
    let order = confirmed_order(&fx).await;
    fx.gateway.fail_reversals(GatewayFailure::Unavailable);

    let result = fx.service.refund(order.id).await;

    assert!(matches!(result, Err(OrderServiceError::Gateway(_))));
    assert_eq!(fx.orders.status_of(order.id), Some(OrderStatus::Processing));
    assert_eq!(fx.products.stock_of(ProductId::new(1)), 4);
    assert_eq!(fx.products.stock_of(ProductId::new(2)), 2);

    // Once the gateway recovers the same refund goes through.
    fx.gateway.allow_reversals();
    let outcome = fx.service.refund(order.id).await.expect("retry refund");
    assert!(outcome.fully_restored());
}

#[tokio::test]
async fn test_partial_restoration_failure_still_restores_other_items() {
    let fx = fixture();
    let order = confirmed_order(&fx).await;

    // Product 1's restoration will fail; product 2's must still apply.
    fx.products.fail_adjustments_for(ProductId::new(1));

    let outcome = fx.service.refund(order.id).await.expect("refund");

    assert!(!outcome.fully_restored());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].product_id, ProductId::new(1));
    assert_eq!(outcome.failures[0].quantity, 1);
    assert_eq!(outcome.restored, vec![ProductId::new(2)]);

    // The refund itself stands and the healthy item got its stock back.
    assert_eq!(fx.orders.status_of(order.id), Some(OrderStatus::Refunded));
    assert_eq!(fx.products.stock_of(ProductId::new(1)), 4);
    assert_eq!(fx.products.stock_of(ProductId::new(2)), 4);
}

#[tokio::test]
async fn test_refund_of_pending_order_skips_gateway_and_stock() {
    let fx = fixture();
    fx.products.insert(product(3, Decimal::new(25, 0), 9));

    // Unpaid, unconfirmed order: no charge to reverse, no stock reserved.
    let order = fx
        .orders
        .create(NewOrder {
            user_id: test_user(),
            currency: CurrencyCode::USD,
            items: vec![NewOrderItem {
                product_id: ProductId::new(3),
                quantity: 4,
                unit_price: Decimal::new(25, 0),
            }],
            shipping_address: test_address(),
        })
        .await
        .expect("create order");

    let outcome = fx.service.refund(order.id).await.expect("refund");

    assert_eq!(fx.orders.status_of(order.id), Some(OrderStatus::Refunded));
    assert!(fx.gateway.reversed_references().is_empty());
    assert!(outcome.restored.is_empty());
    assert_eq!(fx.products.stock_of(ProductId::new(3)), 9);
}
