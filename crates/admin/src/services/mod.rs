//! Business services for the admin back office.

pub mod notify;
pub mod orders;

pub use notify::{LogOnlyNotifier, NotifyError, ShippingNotifier, ShippingUpdate};
pub use orders::{OrderAdminService, OrderServiceError, RefundFailure, RefundOutcome};
