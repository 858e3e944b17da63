//! HTTP client for the payment gateway REST API.
//!
//! Implements the [`PaymentGateway`] capability over a Stripe-style JSON
//! API: `POST /v1/charges` creates a charge, `POST
//! /v1/charges/{reference}/reverse` reverses one. The API secret key is
//! sent as a bearer token.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::instrument;

use bramble_core::{Charge, ChargeRequest, GatewayError, PaymentGateway};

use crate::config::GatewayConfig;

/// Payment gateway client.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

/// Error payload returned by the gateway.
#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChargeResponseBody {
    reference: String,
    client_secret: String,
}

impl HttpPaymentGateway {
    /// Create a new gateway client from configuration.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                client: reqwest::Client::new(),
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
                secret_key: config.secret_key.expose_secret().to_string(),
            }),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.inner.base_url)
    }

    async fn post(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, GatewayError> {
        self.inner
            .client
            .post(url)
            .bearer_auth(&self.inner.secret_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)
    }
}

/// Map a transport-level failure: the gateway was never reached, or the
/// call timed out before a response arrived.
fn transport_error(e: reqwest::Error) -> GatewayError {
    GatewayError::Unavailable(e.to_string())
}

/// Map a non-success gateway response to the error taxonomy.
async fn response_error(response: reqwest::Response) -> GatewayError {
    let status = response.status();
    let message = response
        .json::<GatewayErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| format!("gateway returned {status}"));

    if status == StatusCode::PAYMENT_REQUIRED {
        GatewayError::Declined(message)
    } else if status.is_server_error() {
        GatewayError::Unavailable(message)
    } else {
        GatewayError::Rejected(message)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[instrument(skip(self, request), fields(amount = %request.amount))]
    async fn create_charge(&self, request: ChargeRequest) -> Result<Charge, GatewayError> {
        let body = serde_json::json!({
            "amount": request.amount.amount,
            "currency": request.amount.currency.code(),
            "metadata": request.metadata,
        });

        let response = self.post(&self.endpoint("v1/charges"), &body).await?;
        if !response.status().is_success() {
            return Err(response_error(response).await);
        }

        let body: ChargeResponseBody = response
            .json()
            .await
            .map_err(|e| GatewayError::Rejected(format!("malformed charge response: {e}")))?;

        Ok(Charge {
            reference: body.reference,
            client_secret: body.client_secret,
        })
    }

    #[instrument(skip(self))]
    async fn reverse_charge(&self, reference: &str) -> Result<(), GatewayError> {
        let url = self.endpoint(&format!("v1/charges/{reference}/reverse"));
        let response = self.post(&url, &serde_json::Value::Null).await?;
        if !response.status().is_success() {
            return Err(response_error(response).await);
        }
        Ok(())
    }
}
