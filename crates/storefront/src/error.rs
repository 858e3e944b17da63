//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures infrastructure errors
//! to Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`.
//!
//! Client-facing policy: validation and state-conflict errors pass through
//! verbatim (they are expected and user-actionable); infrastructure errors
//! are logged with full context and surfaced as generic failures. Checkout
//! failures keep the three-way distinction between "your cart changed
//! because stock ran out", "payment failed", and "we couldn't reach the
//! payment processor".

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use bramble_core::{GatewayError, RepositoryError};

use crate::services::CheckoutError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage operation failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Checkout or payment flow failed.
    #[error("checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request failed authentication (e.g. bad webhook signature).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limited; retry after the given number of seconds.
    #[error("rate limited")]
    RateLimited { retry_after: u64 },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Machine-readable error payload.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

impl AppError {
    /// Whether this error is an infrastructure failure worth a Sentry
    /// event, as opposed to an expected client-visible condition.
    fn is_infrastructure(&self) -> bool {
        match self {
            Self::Repository(_) | Self::Internal(_) => true,
            Self::Checkout(CheckoutError::Repo(_)) => true,
            Self::Checkout(CheckoutError::Gateway(GatewayError::Rejected(_))) => true,
            _ => false,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Repository(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Checkout(e) => match e {
                CheckoutError::CartNotFound(_)
                | CheckoutError::OrderNotFound(_)
                | CheckoutError::UnknownPaymentReference(_) => StatusCode::NOT_FOUND,
                CheckoutError::EmptyCart | CheckoutError::UnexpectedEvent(_) => {
                    StatusCode::BAD_REQUEST
                }
                CheckoutError::UnknownProduct(_)
                | CheckoutError::AlreadyPaid(_)
                | CheckoutError::InsufficientStock { .. }
                | CheckoutError::InvalidState { .. } => StatusCode::CONFLICT,
                CheckoutError::Gateway(GatewayError::Declined(_)) => StatusCode::PAYMENT_REQUIRED,
                CheckoutError::Gateway(GatewayError::Unavailable(_)) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                CheckoutError::Gateway(GatewayError::Rejected(_)) => StatusCode::BAD_GATEWAY,
                CheckoutError::Repo(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> ErrorBody {
        let (error, message): (&'static str, String) = match self {
            // Don't expose internal error details to clients
            Self::Repository(_) | Self::Internal(_) | Self::Checkout(CheckoutError::Repo(_)) => {
                ("internal_error", "Internal server error".to_string())
            }
            Self::NotFound(what) => ("not_found", format!("Not found: {what}")),
            Self::BadRequest(msg) => ("bad_request", msg.clone()),
            Self::Unauthorized(msg) => ("unauthorized", msg.clone()),
            Self::RateLimited { retry_after } => (
                "too_many_requests",
                format!("Too many requests; retry in {retry_after} seconds"),
            ),
            Self::Checkout(e) => match e {
                // Actionable, item-specific: the shopper's cart changed.
                CheckoutError::InsufficientStock { product_id } => (
                    "stock_conflict",
                    format!("Stock ran out for product {product_id}; please review your order"),
                ),
                CheckoutError::UnknownProduct(product_id) => (
                    "stock_conflict",
                    format!("Product {product_id} is no longer available"),
                ),
                // Retryable with another payment method.
                CheckoutError::Gateway(GatewayError::Declined(_)) => {
                    ("payment_failed", "Payment failed".to_string())
                }
                // Retryable later; not the shopper's fault.
                CheckoutError::Gateway(GatewayError::Unavailable(_)) => (
                    "gateway_unavailable",
                    "We couldn't reach the payment processor; please try again later".to_string(),
                ),
                CheckoutError::Gateway(GatewayError::Rejected(_)) => {
                    ("gateway_error", "External service error".to_string())
                }
                CheckoutError::AlreadyPaid(_) => ("already_paid", e.to_string()),
                CheckoutError::CartNotFound(_)
                | CheckoutError::OrderNotFound(_)
                | CheckoutError::UnknownPaymentReference(_) => ("not_found", e.to_string()),
                CheckoutError::EmptyCart | CheckoutError::UnexpectedEvent(_) => {
                    ("bad_request", e.to_string())
                }
                CheckoutError::InvalidState { .. } => ("conflict", e.to_string()),
                CheckoutError::Repo(_) => {
                    ("internal_error", "Internal server error".to_string())
                }
            },
        };

        ErrorBody {
            error,
            message,
            retry_after: match self {
                Self::RateLimited { retry_after } => Some(*retry_after),
                _ => None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture infrastructure errors to Sentry
        if self.is_infrastructure() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status_code();
        let body = self.body();

        let mut response = (status, Json(body)).into_response();
        if let Self::RateLimited { retry_after } = self
            && let Ok(value) = axum::http::HeaderValue::from_str(&retry_after.to_string())
        {
            response.headers_mut().insert("retry-after", value);
        }
        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
