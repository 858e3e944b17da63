//! Shipping update notifications.
//!
//! Notification delivery is best-effort by contract: it sits outside the
//! order consistency boundary, and a failed send is logged by the caller
//! and never rolls back a status change. SMTP delivery via lettre; when
//! SMTP is not configured the log-only implementation is used.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::info;

use bramble_core::{OrderId, OrderStatus};

use crate::config::SmtpConfig;

/// A shipping status notification.
#[derive(Debug, Clone)]
pub struct ShippingUpdate {
    pub recipient: String,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
}

/// Errors that can occur when sending a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Capability interface for shipping notifications.
#[async_trait]
pub trait ShippingNotifier: Send + Sync {
    /// Send one shipping update. Callers treat failures as log-and-continue.
    async fn shipping_update(&self, update: ShippingUpdate) -> Result<(), NotifyError>;
}

/// SMTP-backed notifier.
#[derive(Clone)]
pub struct SmtpShippingNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpShippingNotifier {
    /// Create a notifier from SMTP configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay address is invalid.
    pub fn new(config: &SmtpConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl ShippingNotifier for SmtpShippingNotifier {
    async fn shipping_update(&self, update: ShippingUpdate) -> Result<(), NotifyError> {
        let subject = format!("Your Bramble order #{} is {}", update.order_id, update.status);
        let body = match &update.tracking_number {
            Some(tracking) => format!(
                "Good news - order #{} is {}.\n\nTrack your package: {tracking}\n\n- Bramble Goods",
                update.order_id, update.status
            ),
            None => format!(
                "Good news - order #{} is {}.\n\n- Bramble Goods",
                update.order_id, update.status
            ),
        };

        let message = Message::builder()
            .from(self
                .from_address
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(self.from_address.clone()))?)
            .to(update
                .recipient
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(update.recipient.clone()))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.mailer.send(message).await?;
        Ok(())
    }
}

/// Notifier used when SMTP is not configured: records the update in the
/// log and succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlyNotifier;

#[async_trait]
impl ShippingNotifier for LogOnlyNotifier {
    async fn shipping_update(&self, update: ShippingUpdate) -> Result<(), NotifyError> {
        info!(
            order_id = %update.order_id,
            status = %update.status,
            recipient = %update.recipient,
            "SMTP not configured; shipping update logged only"
        );
        Ok(())
    }
}
