//! Checkout route handlers: order placement, payment initiation, and the
//! gateway confirmation webhook.
//!
//! The webhook is authenticated with an HMAC-SHA256 signature over the raw
//! body before any state change. When confirmation fails because stock ran
//! out, this layer issues the compensating charge reversal the workflow
//! signals for.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use secrecy::ExposeSecret;
use tracing::{error, instrument, warn};

use bramble_core::{
    Address, CartId, CurrencyCode, Order, OrderId, OrderItem, OrderStatus, PaymentEvent, ProductId,
    UserId,
};

use crate::error::{AppError, Result};
use crate::services::{CheckoutError, PaymentIntent};
use crate::state::AppState;

/// Signature header attached by the gateway to webhook deliveries.
const SIGNATURE_HEADER: &str = "bramble-gateway-signature";

type HmacSha256 = Hmac<Sha256>;

// =============================================================================
// Views
// =============================================================================

/// Order display data.
#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total: Decimal,
    pub currency: CurrencyCode,
    pub paid: bool,
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItemView>>,
}

/// Order line display data.
#[derive(Debug, Serialize)]
pub struct OrderItemView {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderView {
    fn from_order(order: &Order, items: Option<&[OrderItem]>) -> Self {
        Self {
            id: order.id,
            status: order.status,
            total: order.total,
            currency: order.currency,
            paid: order.is_paid(),
            tracking_number: order.tracking_number.clone(),
            items: items.map(|items| {
                items
                    .iter()
                    .map(|item| OrderItemView {
                        product_id: item.product_id,
                        quantity: item.quantity,
                        unit_price: item.unit_price,
                    })
                    .collect()
            }),
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: i64,
    pub address: Address,
}

// =============================================================================
// Handlers
// =============================================================================

/// Turn a cart into a pending order.
#[instrument(skip(state, request))]
pub async fn place_order(
    State(state): State<AppState>,
    Path(cart_id): Path<uuid::Uuid>,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderView>)> {
    let order = state
        .checkout()
        .place_order(
            CartId::from(cart_id),
            UserId::new(request.user_id),
            request.address,
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(OrderView::from_order(&order, None)),
    ))
}

/// Show an order with its items.
#[instrument(skip(state))]
pub async fn show_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderView>> {
    let id = OrderId::new(id);
    let order = state
        .orders()
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    let items = state.orders().list_items(id).await?;
    Ok(Json(OrderView::from_order(&order, Some(&items))))
}

/// Create the gateway charge for an order.
#[instrument(skip(state))]
pub async fn initiate_payment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PaymentIntent>> {
    let intent = state.checkout().initiate_payment(OrderId::new(id)).await?;
    Ok(Json(intent))
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

/// Receive a gateway event and confirm the matching order.
///
/// The raw body is verified against the webhook secret before it is even
/// parsed. If confirmation fails because the order can no longer be
/// fulfilled, the charge is reversed here (compensating refund) and the
/// stock conflict is reported to the gateway's retry machinery as a final
/// failure.
#[instrument(skip(state, headers, body))]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing webhook signature".to_string()))?;

    let secret = state.config().gateway.webhook_secret.expose_secret();
    if !verify_signature(secret, &body, signature) {
        warn!("webhook signature verification failed");
        return Err(AppError::Unauthorized("invalid webhook signature".to_string()));
    }

    let event: PaymentEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("malformed webhook payload: {e}")))?;

    match state.checkout().confirm_payment(&event).await {
        Ok(order) => Ok(Json(WebhookAck {
            order_id: order.id,
            status: order.status,
        })),
        Err(
            e @ (CheckoutError::InsufficientStock { .. } | CheckoutError::UnknownProduct(_)),
        ) => {
            // The order cannot be fulfilled: reverse the charge so the
            // customer is not billed for stock that is gone.
            if let Err(reverse_err) = state.gateway().reverse_charge(&event.reference).await {
                error!(
                    reference = %event.reference,
                    error = %reverse_err,
                    "compensating reversal failed; charge needs manual review"
                );
            }
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Verify an HMAC-SHA256 hex signature over the raw webhook body.
fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };
    mac.verify_slice(&signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key");
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_verifies() {
        let body = br#"{"kind":"charge.authorized","reference":"ch_1"}"#;
        let signature = sign("whsec_test", body);
        assert!(verify_signature("whsec_test", body, &signature));
    }

    #[test]
    fn test_tampered_body_fails() {
        let body = br#"{"kind":"charge.authorized","reference":"ch_1"}"#;
        let signature = sign("whsec_test", body);
        let tampered = br#"{"kind":"charge.authorized","reference":"ch_2"}"#;
        assert!(!verify_signature("whsec_test", tampered, &signature));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let body = b"payload";
        let signature = sign("whsec_one", body);
        assert!(!verify_signature("whsec_two", body, &signature));
    }

    #[test]
    fn test_non_hex_signature_fails() {
        assert!(!verify_signature("whsec_test", b"payload", "not-hex!"));
    }
}
