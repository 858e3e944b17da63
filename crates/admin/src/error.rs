//! Unified error handling for the admin API.
//!
//! State-conflict errors from the lifecycle service pass through verbatim
//! (they are the admin's feedback loop); infrastructure errors are
//! captured to Sentry and surfaced as generic failures.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use bramble_core::RepositoryError;

use crate::services::OrderServiceError;

/// Application-level error type for the admin API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage operation failed.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Order lifecycle operation failed.
    #[error("order service error: {0}")]
    OrderService(#[from] OrderServiceError),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid admin token.
    #[error("unauthorized")]
    Unauthorized,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Machine-readable error payload.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl AppError {
    fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Repository(_)
                | Self::Internal(_)
                | Self::OrderService(OrderServiceError::Repo(_) | OrderServiceError::Gateway(_))
        )
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Repository(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::OrderService(e) => match e {
                OrderServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                OrderServiceError::InvalidTransition(_)
                | OrderServiceError::AlreadyRefunded(_)
                | OrderServiceError::InvalidState { .. }
                | OrderServiceError::Conflict(_) => StatusCode::CONFLICT,
                OrderServiceError::Gateway(_) => StatusCode::BAD_GATEWAY,
                OrderServiceError::Repo(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> ErrorBody {
        let (error, message): (&'static str, String) = match self {
            // Don't expose internal error details to clients
            Self::Repository(_)
            | Self::Internal(_)
            | Self::OrderService(OrderServiceError::Repo(_)) => {
                ("internal_error", "Internal server error".to_string())
            }
            Self::OrderService(OrderServiceError::Gateway(_)) => {
                ("gateway_error", "External service error".to_string())
            }
            Self::NotFound(what) => ("not_found", format!("Not found: {what}")),
            Self::BadRequest(msg) => ("bad_request", msg.clone()),
            Self::Unauthorized => ("unauthorized", "Admin token required".to_string()),
            Self::OrderService(e) => match e {
                OrderServiceError::InvalidTransition(_) => ("invalid_transition", e.to_string()),
                OrderServiceError::AlreadyRefunded(_) => ("already_refunded", e.to_string()),
                OrderServiceError::InvalidState { .. } => ("invalid_state", e.to_string()),
                OrderServiceError::Conflict(_) => ("conflict", e.to_string()),
                OrderServiceError::NotFound(_) => ("not_found", e.to_string()),
                OrderServiceError::Gateway(_) | OrderServiceError::Repo(_) => {
                    ("internal_error", "Internal server error".to_string())
                }
            },
        };
        ErrorBody { error, message }
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

        (self.status_code(), Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bramble_core::{InvalidTransition, OrderId, OrderStatus};

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(status_of(AppError::Unauthorized), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_of(AppError::NotFound("order 1".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::OrderService(
                OrderServiceError::InvalidTransition(InvalidTransition {
                    from: OrderStatus::Delivered,
                    to: OrderStatus::Shipped,
                })
            )),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::OrderService(OrderServiceError::AlreadyRefunded(
                OrderId::new(1)
            ))),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_repository_details_are_hidden() {
        let err = AppError::Repository(RepositoryError::Backend(
            "password authentication failed".to_string(),
        ));
        let body = err.body();
        assert_eq!(body.error, "internal_error");
        assert!(!body.message.contains("password"));
    }
}
