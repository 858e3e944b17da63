//! Route handlers for the storefront API.

use axum::{
    Router, middleware,
    routing::{delete, get, patch, post},
};

use crate::state::AppState;

pub mod cart;
pub mod checkout;
pub mod products;
pub mod search;

/// Build the storefront router.
///
/// The search endpoints sit behind the fixed-window rate limiter; the
/// rest of the API is unthrottled.
pub fn routes(state: &AppState) -> Router<AppState> {
    let search_routes = Router::new()
        .route("/search", get(search::search))
        .route("/search/popular", get(search::popular))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::rate_limit::enforce,
        ));

    Router::new()
        .route("/products", get(products::list))
        .route("/products/{id}", get(products::show))
        .merge(search_routes)
        .route("/carts", post(cart::create))
        .route("/carts/{id}", get(cart::show))
        .route("/carts/{id}/items", post(cart::add_item))
        .route("/carts/{id}/items/{product_id}", patch(cart::update_item))
        .route("/carts/{id}/items/{product_id}", delete(cart::remove_item))
        .route("/carts/{id}/checkout", post(checkout::place_order))
        .route("/orders/{id}", get(checkout::show_order))
        .route("/orders/{id}/payment", post(checkout::initiate_payment))
        .route("/webhooks/payment", post(checkout::payment_webhook))
}
