//! Order management route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bramble_core::{CurrencyCode, Order, OrderId, OrderItem, OrderStatus, ProductId, UserId};

use crate::error::{AppError, Result};
use crate::services::RefundOutcome;
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 500;

// =============================================================================
// Views
// =============================================================================

/// Order display data for the back office.
#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total: Decimal,
    pub currency: CurrencyCode,
    pub payment_reference: Option<String>,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItemView>>,
}

/// Order line display data.
#[derive(Debug, Serialize)]
pub struct OrderItemView {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl From<&OrderItem> for OrderItemView {
    fn from(item: &OrderItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            line_total: item.line_total(),
        }
    }
}

impl OrderView {
    fn from_order(order: Order, items: Option<&[OrderItem]>) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id,
            status: order.status,
            total: order.total,
            currency: order.currency,
            payment_reference: order.payment_reference,
            tracking_number: order.tracking_number,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: items.map(|items| items.iter().map(OrderItemView::from).collect()),
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub tracking_number: Option<String>,
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    raw.parse::<OrderStatus>().map_err(AppError::BadRequest)
}

// =============================================================================
// Handlers
// =============================================================================

/// List orders, optionally filtered by status.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<OrderView>>> {
    let status = params.status.as_deref().map(parse_status).transpose()?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let orders = state.orders().list_by_status(status, limit).await?;
    Ok(Json(
        orders
            .into_iter()
            .map(|order| OrderView::from_order(order, None))
            .collect(),
    ))
}

/// Show an order with its items.
#[instrument(skip(state))]
pub async fn show(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<OrderView>> {
    let id = OrderId::new(id);
    let order = state
        .orders()
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    let items = state.orders().list_items(id).await?;
    Ok(Json(OrderView::from_order(order, Some(&items))))
}

/// Transition an order (e.g. to shipped, with a tracking number).
#[instrument(skip(state, request))]
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<OrderView>> {
    let next = parse_status(&request.status)?;
    let order = state
        .service()
        .transition(OrderId::new(id), next, request.tracking_number)
        .await?;
    Ok(Json(OrderView::from_order(order, None)))
}

/// Refund response: outcome plus an aggregate warning when some items'
/// stock could not be restored.
#[derive(Debug, Serialize)]
pub struct RefundResponse {
    #[serde(flatten)]
    pub outcome: RefundOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Refund an order.
#[instrument(skip(state))]
pub async fn refund(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RefundResponse>> {
    let outcome = state.service().refund(OrderId::new(id)).await?;

    let warning = (!outcome.fully_restored()).then(|| {
        format!(
            "refund applied, but stock restoration failed for {} item(s)",
            outcome.failures.len()
        )
    });

    Ok(Json(RefundResponse { outcome, warning }))
}
