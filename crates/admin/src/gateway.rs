//! Payment gateway client for the admin binary.
//!
//! The admin side mostly reverses charges (refunds); charge creation is
//! implemented for trait completeness. Same REST surface as the
//! storefront's client, bearer-authenticated.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::instrument;

use bramble_core::{Charge, ChargeRequest, GatewayError, PaymentGateway};

use crate::config::GatewayConfig;

/// Payment gateway client.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChargeBody {
    reference: String,
    client_secret: String,
}

impl HttpPaymentGateway {
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                client: reqwest::Client::new(),
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
                secret_key: config.secret_key.expose_secret().to_string(),
            }),
        }
    }

    /// POST a JSON body and map failures into the gateway error taxonomy.
    async fn call(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = self
            .inner
            .client
            .post(format!("{}/{path}", self.inner.base_url))
            .bearer_auth(&self.inner.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let message = response
            .json::<ApiError>()
            .await
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| format!("gateway returned {status}"));

        Err(match status {
            StatusCode::PAYMENT_REQUIRED => GatewayError::Declined(message),
            s if s.is_server_error() => GatewayError::Unavailable(message),
            _ => GatewayError::Rejected(message),
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request))]
    async fn create_charge(&self, request: ChargeRequest) -> Result<Charge, GatewayError> {
        let body = serde_json::json!({
            "amount": request.amount.amount,
            "currency": request.amount.currency.code(),
            "metadata": request.metadata,
        });
        let response = self.call("v1/charges", body).await?;
        let charge: ChargeBody = response
            .json()
            .await
            .map_err(|e| GatewayError::Rejected(format!("malformed charge response: {e}")))?;
        Ok(Charge {
            reference: charge.reference,
            client_secret: charge.client_secret,
        })
    }

    #[instrument(skip(self))]
    async fn reverse_charge(&self, reference: &str) -> Result<(), GatewayError> {
        self.call(
            &format!("v1/charges/{reference}/reverse"),
            serde_json::Value::Null,
        )
        .await
        .map(|_| ())
    }
}
