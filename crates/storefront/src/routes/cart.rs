//! Cart route handlers.
//!
//! Every mutation loads the persisted state, applies the pure reducer,
//! saves the result, and returns the new view together with any advisory.
//! The cart is always rehydrated from the store before it is served, so a
//! transient empty cart is never presented as authoritative.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use bramble_core::{Cart, CartAdvisory, CartId, CartItem, ProductId};

use crate::error::{AppError, Result};
use crate::state::AppState;

// =============================================================================
// Views
// =============================================================================

/// Cart line display data.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub stock: u32,
}

impl From<&CartItem> for CartLineView {
    fn from(line: &CartItem) -> Self {
        Self {
            product_id: line.product_id,
            name: line.name.clone(),
            price: line.price,
            image_url: line.image_url.clone(),
            quantity: line.quantity,
            stock: line.stock,
        }
    }
}

/// Advisory display data: the structured advisory plus a human message.
#[derive(Debug, Serialize)]
pub struct AdvisoryView {
    #[serde(flatten)]
    pub advisory: CartAdvisory,
    pub message: String,
}

/// Cart display data.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: CartId,
    pub items: Vec<CartLineView>,
    pub total_price: Decimal,
    pub total_items: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<AdvisoryView>,
}

impl CartView {
    fn new(id: CartId, cart: &Cart, advisory: Option<CartAdvisory>) -> Self {
        Self {
            id,
            items: cart.items.iter().map(CartLineView::from).collect(),
            total_price: cart.total_price(),
            total_items: cart.total_items(),
            advisory: advisory.map(|advisory| AdvisoryView {
                message: advisory.to_string(),
                advisory,
            }),
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

// =============================================================================
// Handlers
// =============================================================================

async fn load_cart(state: &AppState, id: CartId) -> Result<Cart> {
    state
        .carts()
        .load(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("cart {id}")))
}

/// Create an empty cart and hand its ID to the client.
#[instrument(skip(state))]
pub async fn create(State(state): State<AppState>) -> Result<(StatusCode, Json<CartView>)> {
    let id = CartId::generate();
    let cart = Cart::new();
    state.carts().save(id, &cart).await?;
    Ok((StatusCode::CREATED, Json(CartView::new(id, &cart, None))))
}

/// Show a cart.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<CartView>> {
    let id = CartId::from(id);
    let cart = load_cart(&state, id).await?;
    Ok(Json(CartView::new(id, &cart, None)))
}

/// Add one unit of a product to the cart.
///
/// The product is fetched from the catalog so the line carries the
/// current price and a fresh stock snapshot.
#[instrument(skip(state))]
pub async fn add_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let id = CartId::from(id);
    let cart = load_cart(&state, id).await?;

    let product_id = ProductId::new(request.product_id);
    let product = state
        .products()
        .get(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;

    let (cart, advisory) = cart.add_item(&product);
    state.carts().save(id, &cart).await?;
    Ok(Json(CartView::new(id, &cart, advisory)))
}

/// Set a line's quantity (clamped into `[1, stock]`).
#[instrument(skip(state))]
pub async fn update_item(
    State(state): State<AppState>,
    Path((id, product_id)): Path<(Uuid, i64)>,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Json<CartView>> {
    let id = CartId::from(id);
    let cart = load_cart(&state, id).await?;

    let (cart, advisory) = cart.update_quantity(ProductId::new(product_id), request.quantity);
    state.carts().save(id, &cart).await?;
    Ok(Json(CartView::new(id, &cart, advisory)))
}

/// Remove a line from the cart.
#[instrument(skip(state))]
pub async fn remove_item(
    State(state): State<AppState>,
    Path((id, product_id)): Path<(Uuid, i64)>,
) -> Result<Json<CartView>> {
    let id = CartId::from(id);
    let cart = load_cart(&state, id).await?;

    let (cart, advisory) = cart.remove_item(ProductId::new(product_id));
    state.carts().save(id, &cart).await?;
    Ok(Json(CartView::new(id, &cart, advisory)))
}
