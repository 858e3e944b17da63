//! Tests of admin-driven order lifecycle transitions.

use std::sync::Arc;

use rust_decimal::Decimal;

use bramble_admin::services::{OrderAdminService, OrderServiceError, ShippingNotifier};
use bramble_core::{
    CurrencyCode, NewOrder, NewOrderItem, Order, OrderId, OrderRepository, OrderStatus,
    PaymentGateway, ProductId, ProductRepository,
};
use bramble_integration_tests::{
    FakePaymentGateway, InMemoryOrderRepository, InMemoryProductRepository, RecordingNotifier,
    test_address, test_user,
};

struct Fixture {
    orders: Arc<InMemoryOrderRepository>,
    notifier: Arc<RecordingNotifier>,
    service: OrderAdminService,
}

fn fixture() -> Fixture {
    let orders = Arc::new(InMemoryOrderRepository::new());
    let products = Arc::new(InMemoryProductRepository::new());
    let gateway = Arc::new(FakePaymentGateway::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let service = OrderAdminService::new(
        Arc::clone(&orders) as Arc<dyn OrderRepository>,
        products as Arc<dyn ProductRepository>,
        gateway as Arc<dyn PaymentGateway>,
        Arc::clone(&notifier) as Arc<dyn ShippingNotifier>,
    );

    Fixture {
        orders,
        notifier,
        service,
    }
}

async fn pending_order(fx: &Fixture) -> Order {
    fx.orders
        .create(NewOrder {
            user_id: test_user(),
            currency: CurrencyCode::USD,
            items: vec![NewOrderItem {
                product_id: ProductId::new(1),
                quantity: 1,
                unit_price: Decimal::new(40, 0),
            }],
            shipping_address: test_address(),
        })
        .await
        .expect("create order")
}

async fn order_in(fx: &Fixture, status: OrderStatus) -> Order {
    let order = pending_order(fx).await;
    let path: &[OrderStatus] = match status {
        OrderStatus::Pending => &[],
        OrderStatus::Processing | OrderStatus::Cancelled | OrderStatus::Refunded => &[status],
        OrderStatus::Shipped => &[OrderStatus::Processing, OrderStatus::Shipped],
        OrderStatus::Delivered => &[
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ],
    };
    let mut current = OrderStatus::Pending;
    for &next in path {
        let moved = fx
            .orders
            .update_status(order.id, current, next, None)
            .await
            .expect("seed transition");
        assert!(moved, "seed transition {current} -> {next}");
        current = next;
    }
    fx.orders
        .find_by_id(order.id)
        .await
        .expect("find")
        .expect("order")
}

#[tokio::test]
async fn test_happy_path_pending_to_delivered() {
    let fx = fixture();
    let order = pending_order(&fx).await;

    let order_id = order.id;
    let processing = fx
        .service
        .transition(order_id, OrderStatus::Processing, None)
        .await
        .expect("to processing");
    assert_eq!(processing.status, OrderStatus::Processing);

    let shipped = fx
        .service
        .transition(order_id, OrderStatus::Shipped, Some("TRACK-123".to_string()))
        .await
        .expect("to shipped");
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert_eq!(shipped.tracking_number.as_deref(), Some("TRACK-123"));

    let delivered = fx
        .service
        .transition(order_id, OrderStatus::Delivered, None)
        .await
        .expect("to delivered");
    assert_eq!(delivered.status, OrderStatus::Delivered);
}

#[tokio::test]
async fn test_shipping_transition_sends_notification() {
    let fx = fixture();
    let order = order_in(&fx, OrderStatus::Processing).await;

    fx.service
        .transition(order.id, OrderStatus::Shipped, Some("TRACK-9".to_string()))
        .await
        .expect("to shipped");

    let sent = fx.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].order_id, order.id);
    assert_eq!(sent[0].recipient, "quinn@example.com");
    assert_eq!(sent[0].tracking_number.as_deref(), Some("TRACK-9"));
}

#[tokio::test]
async fn test_notification_failure_does_not_roll_back_transition() {
    let fx = fixture();
    let order = order_in(&fx, OrderStatus::Processing).await;
    fx.notifier.fail_sends();

    let shipped = fx
        .service
        .transition(order.id, OrderStatus::Shipped, None)
        .await
        .expect("transition succeeds despite notifier failure");

    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert_eq!(fx.orders.status_of(order.id), Some(OrderStatus::Shipped));
}

#[tokio::test]
async fn test_invalid_transitions_leave_status_unchanged() {
    let fx = fixture();

    let cases = [
        (OrderStatus::Delivered, OrderStatus::Shipped),
        (OrderStatus::Delivered, OrderStatus::Cancelled),
        (OrderStatus::Cancelled, OrderStatus::Processing),
        (OrderStatus::Shipped, OrderStatus::Cancelled),
        (OrderStatus::Pending, OrderStatus::Shipped),
        (OrderStatus::Pending, OrderStatus::Delivered),
    ];

    for (from, to) in cases {
        let order = order_in(&fx, from).await;
        let result = fx.service.transition(order.id, to, None).await;
        assert!(
            matches!(result, Err(OrderServiceError::InvalidTransition(_))),
            "{from} -> {to} should be rejected"
        );
        assert_eq!(fx.orders.status_of(order.id), Some(from), "{from} -> {to}");
    }
}

#[tokio::test]
async fn test_cancellation_allowed_before_shipping() {
    let fx = fixture();

    let pending = pending_order(&fx).await;
    fx.service
        .transition(pending.id, OrderStatus::Cancelled, None)
        .await
        .expect("cancel pending");

    let processing = order_in(&fx, OrderStatus::Processing).await;
    fx.service
        .transition(processing.id, OrderStatus::Cancelled, None)
        .await
        .expect("cancel processing");
}

#[tokio::test]
async fn test_refunded_is_not_reachable_via_transition() {
    let fx = fixture();
    let order = order_in(&fx, OrderStatus::Processing).await;

    let result = fx
        .service
        .transition(order.id, OrderStatus::Refunded, None)
        .await;
    assert!(matches!(
        result,
        Err(OrderServiceError::InvalidState { .. })
    ));
    assert_eq!(fx.orders.status_of(order.id), Some(OrderStatus::Processing));
}

#[tokio::test]
async fn test_concurrent_modification_is_reported_as_conflict() {
    let fx = fixture();
    let order = pending_order(&fx).await;

    fx.orders.prime_status_conflict();
    let result = fx
        .service
        .transition(order.id, OrderStatus::Processing, None)
        .await;

    assert!(matches!(result, Err(OrderServiceError::Conflict(_))));
    assert_eq!(fx.orders.status_of(order.id), Some(OrderStatus::Pending));
}

#[tokio::test]
async fn test_transition_unknown_order() {
    let fx = fixture();
    let result = fx
        .service
        .transition(OrderId::new(999), OrderStatus::Processing, None)
        .await;
    assert!(matches!(result, Err(OrderServiceError::NotFound(_))));
}
