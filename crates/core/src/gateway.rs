//! Payment gateway capability trait.
//!
//! The gateway is slow, fallible I/O: both operations are awaited outside
//! any lock on order or stock state, and a call that times out must leave
//! the order untouched (no reference persisted) so it can be retried.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Money;

/// A request to create a charge.
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub amount: Money,
    /// Opaque context stored with the charge (order ID, user ID).
    pub metadata: serde_json::Value,
}

/// A created charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    /// Opaque gateway reference, persisted on the order.
    pub reference: String,
    /// Client-usable handle for completing payment in the browser.
    pub client_secret: String,
}

/// An event delivered by the gateway (webhook payload).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEvent {
    /// Event kind, e.g. `charge.authorized` or `charge.failed`.
    pub kind: String,
    /// Charge reference the event is about.
    pub reference: String,
}

impl PaymentEvent {
    /// Whether this event confirms the charge was authorized.
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        self.kind == "charge.authorized"
    }
}

/// Failure talking to the payment gateway.
///
/// The three variants drive the user-facing distinction between "payment
/// failed" (declined, retry with another card), "we couldn't reach the
/// payment processor" (unavailable, retry later), and a protocol-level
/// rejection that indicates a bug or misconfiguration.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway processed the request and declined it.
    #[error("charge declined: {0}")]
    Declined(String),

    /// The gateway could not be reached or timed out.
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),

    /// The gateway rejected the request itself (auth, malformed payload).
    #[error("payment gateway rejected request: {0}")]
    Rejected(String),
}

/// Capability interface to the payment processor.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a charge and return its reference plus a client handle.
    async fn create_charge(&self, request: ChargeRequest) -> Result<Charge, GatewayError>;

    /// Reverse a previously created charge.
    async fn reverse_charge(&self, reference: &str) -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_authorization_check() {
        let authorized = PaymentEvent {
            kind: "charge.authorized".to_string(),
            reference: "ch_1".to_string(),
        };
        let failed = PaymentEvent {
            kind: "charge.failed".to_string(),
            reference: "ch_1".to_string(),
        };
        assert!(authorized.is_authorized());
        assert!(!failed.is_authorized());
    }
}
