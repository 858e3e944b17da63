//! Tests of cart durability: every mutation persists, and rehydration
//! returns exactly what was saved.

use rust_decimal::Decimal;

use bramble_core::{Cart, CartAdvisory, CartId, CartStore, ProductId};
use bramble_integration_tests::{InMemoryCartStore, product};

#[tokio::test]
async fn test_unknown_cart_loads_as_none() {
    let store = InMemoryCartStore::new();
    let loaded = store.load(CartId::generate()).await.expect("load");
    assert!(loaded.is_none());
}

#[tokio::test]
async fn test_cart_survives_rehydration_across_mutations() {
    let store = InMemoryCartStore::new();
    let id = CartId::generate();
    let p1 = product(1, Decimal::new(1200, 2), 3);
    let p2 = product(2, Decimal::new(450, 2), 8);

    // Each mutation loads the persisted state, reduces, and saves - the
    // same shape the HTTP handlers use.
    store.save(id, &Cart::new()).await.expect("save empty");

    let cart = store.load(id).await.expect("load").expect("cart");
    let (cart, advisory) = cart.add_item(&p1);
    assert!(advisory.is_none());
    store.save(id, &cart).await.expect("save");

    let cart = store.load(id).await.expect("load").expect("cart");
    let (cart, _) = cart.add_item(&p2);
    store.save(id, &cart).await.expect("save");

    let cart = store.load(id).await.expect("load").expect("cart");
    let (cart, advisory) = cart.update_quantity(p2.id, 5);
    assert!(advisory.is_none());
    store.save(id, &cart).await.expect("save");

    // Rehydrate fresh and verify totals computed from persisted state.
    let rehydrated = store.load(id).await.expect("load").expect("cart");
    assert_eq!(rehydrated.items.len(), 2);
    assert_eq!(rehydrated.total_items(), 6);
    // 12.00 + 5 * 4.50
    assert_eq!(rehydrated.total_price(), Decimal::new(3450, 2));
}

#[tokio::test]
async fn test_advisories_survive_the_load_reduce_save_cycle() {
    let store = InMemoryCartStore::new();
    let id = CartId::generate();
    let scarce = product(9, Decimal::new(999, 2), 1);

    let (cart, _) = Cart::new().add_item(&scarce);
    store.save(id, &cart).await.expect("save");

    // Second unit exceeds the snapshot: state unchanged, advisory raised.
    let cart = store.load(id).await.expect("load").expect("cart");
    let (cart, advisory) = cart.add_item(&scarce);
    assert_eq!(
        advisory,
        Some(CartAdvisory::StockLimitReached {
            product_id: ProductId::new(9),
            stock: 1,
        })
    );
    store.save(id, &cart).await.expect("save");

    let rehydrated = store.load(id).await.expect("load").expect("cart");
    assert_eq!(rehydrated.total_items(), 1);
}

#[tokio::test]
async fn test_removal_persists() {
    let store = InMemoryCartStore::new();
    let id = CartId::generate();
    let p = product(4, Decimal::new(700, 2), 2);

    let (cart, _) = Cart::new().add_item(&p);
    store.save(id, &cart).await.expect("save");

    let cart = store.load(id).await.expect("load").expect("cart");
    let (cart, advisory) = cart.remove_item(p.id);
    assert!(matches!(advisory, Some(CartAdvisory::ItemRemoved { .. })));
    store.save(id, &cart).await.expect("save");

    let rehydrated = store.load(id).await.expect("load").expect("cart");
    assert!(rehydrated.is_empty());
}
