//! Route handlers for the admin API.
//!
//! Every route is behind the bearer-token middleware.

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::state::AppState;

pub mod orders;
pub mod reports;

/// Build the admin router with token authentication applied.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::update_status))
        .route("/orders/{id}/refund", post(orders::refund))
        .route("/reports/summary", get(reports::summary))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::require_admin_token,
        ))
}
