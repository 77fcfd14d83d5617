//! Razorpay REST client.

use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument};
use url::Url;

use super::{GatewayError, Notes, PaymentGateway, RemoteOrder, RemoteOrderRequest, RemoteRefund};
use crate::config::GatewayConfig;

/// Razorpay API client.
#[derive(Clone)]
pub struct RazorpayClient {
    /// HTTP client.
    client: Client,
    /// API root, e.g. `https://api.razorpay.com`.
    api_base: Url,
    /// Public key id (basic-auth user).
    key_id: String,
    /// Key secret (basic-auth password).
    key_secret: SecretString,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("api_base", &self.api_base.as_str())
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Error envelope returned on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    description: Option<String>,
}

impl RazorpayClient {
    /// Create a new client.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.clone(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        }
    }

    /// Build an endpoint URL, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::Request(format!("invalid API base: {}", self.api_base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorEnvelope>().await {
                Ok(envelope) => envelope
                    .error
                    .description
                    .or(envelope.error.code)
                    .unwrap_or_else(|| status.to_string()),
                Err(_) => status.to_string(),
            };
            error!(status = %status, error = %message, "Razorpay API error");
            return Err(GatewayError::Api(message));
        }

        response
            .json()
            .await
            .map_err(|e| GatewayError::Response(e.to_string()))
    }
}

impl PaymentGateway for RazorpayClient {
    #[instrument(skip(self, request), fields(amount = request.amount, receipt = %request.receipt))]
    async fn create_order(&self, request: &RemoteOrderRequest) -> Result<RemoteOrder, GatewayError> {
        let url = self.endpoint(&["v1", "orders"])?;
        let response = self
            .client
            .post(url)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(request)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let order: RemoteOrder = Self::read(response).await?;
        debug!(remote_order_id = %order.id, "Razorpay order created");
        Ok(order)
    }

    #[instrument(skip(self, notes))]
    async fn refund(&self, payment_id: &str, notes: &Notes) -> Result<RemoteRefund, GatewayError> {
        let url = self.endpoint(&["v1", "payments", payment_id, "refund"])?;
        let response = self
            .client
            .post(url)
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&serde_json::json!({ "notes": notes }))
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let refund: RemoteRefund = Self::read(response).await?;
        debug!(refund_id = %refund.id, "Razorpay refund created");
        Ok(refund)
    }
}
