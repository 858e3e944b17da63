//! Order status and the lifecycle transition table.
//!
//! The status enum is the single source of truth for which lifecycle moves
//! are legal. Every writer (checkout confirmation, admin transitions,
//! refunds) consults [`OrderStatus::verify_transition`] before touching the
//! database, and the database write itself is conditional on the expected
//! current status, so two concurrent writers cannot both win.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of an order.
///
/// Happy path: `Pending -> Processing -> Shipped -> Delivered`.
/// `Pending` and `Processing` orders can be cancelled; any non-terminal
/// order can be refunded. `Cancelled`, `Delivered`, and `Refunded` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created by checkout; payment not yet confirmed, stock not reserved.
    #[default]
    Pending,
    /// Payment confirmed and stock reserved; awaiting fulfillment.
    Processing,
    /// Handed to the carrier; a tracking number may be attached.
    Shipped,
    /// Confirmed received. Terminal.
    Delivered,
    /// Abandoned or rejected before fulfillment. Terminal.
    Cancelled,
    /// Charge reversed and stock restored. Terminal.
    Refunded,
}

/// Attempted an order status transition the lifecycle does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid order transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
}

impl OrderStatus {
    /// Whether no further transitions are allowed from this status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled | Self::Refunded)
    }

    /// Whether the order has passed the reservation point, i.e. stock has
    /// been durably decremented for its items.
    #[must_use]
    pub const fn stock_reserved(&self) -> bool {
        matches!(self, Self::Processing | Self::Shipped | Self::Delivered)
    }

    /// Whether `next` is directly reachable from this status.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (*self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Shipped)
                | (Self::Shipped, Self::Delivered)
                | (Self::Pending | Self::Processing, Self::Cancelled)
                | (Self::Pending | Self::Processing | Self::Shipped, Self::Refunded)
        )
    }

    /// Check a transition, returning [`InvalidTransition`] if it is not in
    /// the lifecycle table.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` when `next` is not reachable from
    /// `self`.
    pub fn verify_transition(self, next: Self) -> Result<(), InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// All states, for iteration in reports and tests.
    #[must_use]
    pub const fn all() -> [Self; 6] {
        [
            Self::Pending,
            Self::Processing,
            Self::Shipped,
            Self::Delivered,
            Self::Cancelled,
            Self::Refunded,
        ]
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "refunded" => Ok(Self::Refunded),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}
