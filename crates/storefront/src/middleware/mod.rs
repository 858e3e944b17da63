//! Request middleware for the storefront.

pub mod client_ip;
pub mod rate_limit;

pub use client_ip::extract_client_ip;
pub use rate_limit::{FixedWindowLimiter, RateLimitDecision};
