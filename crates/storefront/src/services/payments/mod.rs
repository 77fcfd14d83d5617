//! Payment reconciliation.
//!
//! Creates gateway-side orders, verifies the signed confirmation a customer
//! brings back from the checkout widget, and issues refunds. The gateway is
//! reached through the [`PaymentGateway`] trait so services can be exercised
//! without network access.

#[cfg(any(test, feature = "memory-store"))]
mod fake;
mod razorpay;
mod signature;

use std::collections::BTreeMap;
use std::future::Future;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

use apothecary_core::{CurrencyCode, OrderId, to_minor_units};

use super::CommerceError;

#[cfg(any(test, feature = "memory-store"))]
pub use fake::{FakeGateway, RecordedRefund};
pub use razorpay::RazorpayClient;
pub use signature::SignatureVerifier;

/// Errors that can occur when talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("gateway request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("gateway response error: {0}")]
    Response(String),

    /// Gateway rejected the call.
    #[error("gateway API error: {0}")]
    Api(String),
}

/// Free-form key/value notes attached to gateway objects.
pub type Notes = BTreeMap<String, String>;

/// Body of a create-order call. `amount` is in minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteOrderRequest {
    pub amount: i64,
    pub currency: CurrencyCode,
    pub receipt: String,
}

/// Gateway-side order the checkout widget pays against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOrder {
    pub id: String,
    /// Minor units.
    pub amount: i64,
    pub currency: String,
}

/// A refund accepted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteRefund {
    pub id: String,
}

/// Payment gateway operations.
pub trait PaymentGateway: Send + Sync + 'static {
    /// Create a gateway-side order.
    fn create_order(
        &self,
        request: &RemoteOrderRequest,
    ) -> impl Future<Output = Result<RemoteOrder, GatewayError>> + Send;

    /// Refund a captured payment in full.
    fn refund(
        &self,
        payment_id: &str,
        notes: &Notes,
    ) -> impl Future<Output = Result<RemoteRefund, GatewayError>> + Send;
}

/// Payment operations bound to a gateway and the store currency.
pub struct PaymentReconciler<'a, G> {
    gateway: &'a G,
    verifier: &'a SignatureVerifier,
    currency: CurrencyCode,
}

impl<'a, G: PaymentGateway> PaymentReconciler<'a, G> {
    /// Create a new reconciler.
    #[must_use]
    pub const fn new(gateway: &'a G, verifier: &'a SignatureVerifier, currency: CurrencyCode) -> Self {
        Self {
            gateway,
            verifier,
            currency,
        }
    }

    /// Currency used when a caller does not name one.
    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.currency
    }

    /// Create a gateway order for `amount` in the store currency unless
    /// another currency is given.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Validation` for a non-positive or oversized
    /// amount and `CommerceError::Payment` if the gateway rejects the call.
    #[instrument(skip(self), fields(amount = %amount))]
    pub async fn create_remote_order(
        &self,
        amount: Decimal,
        currency: Option<CurrencyCode>,
    ) -> Result<RemoteOrder, CommerceError> {
        let currency = currency.unwrap_or(self.currency);
        if amount <= Decimal::ZERO {
            return Err(CommerceError::Validation("amount must be positive".into()));
        }
        let minor = to_minor_units(amount, currency)
            .map_err(|e| CommerceError::Validation(e.to_string()))?;

        let request = RemoteOrderRequest {
            amount: minor,
            currency,
            receipt: format!("receipt_{}", chrono::Utc::now().timestamp_millis()),
        };

        let order = self.gateway.create_order(&request).await.map_err(|e| {
            warn!(error = %e, "Gateway rejected order creation");
            CommerceError::Payment(e.to_string())
        })?;

        info!(remote_order_id = %order.id, amount = order.amount, "Gateway order created");
        Ok(order)
    }

    /// Check a payment confirmation against the shared key secret.
    #[must_use]
    pub fn verify_payment(&self, remote_order_id: &str, remote_payment_id: &str, signature: &str) -> bool {
        self.verifier
            .verify(remote_order_id, remote_payment_id, signature)
    }

    /// Refund `payment_id` in full, returning the gateway refund id.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Refund` wrapping any gateway failure. Refunds
    /// are never retried.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn refund(
        &self,
        payment_id: &str,
        reason: &str,
        order_id: OrderId,
    ) -> Result<String, CommerceError> {
        let mut notes = Notes::new();
        notes.insert("reason".to_owned(), reason.to_owned());
        notes.insert("order_id".to_owned(), order_id.to_string());

        let refund = self.gateway.refund(payment_id, &notes).await.map_err(|e| {
            warn!(error = %e, "Refund rejected");
            CommerceError::Refund(e.to_string())
        })?;

        info!(refund_id = %refund.id, "Refund issued");
        Ok(refund.id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use secrecy::SecretString;

    use super::*;

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SecretString::from("kx8Qm2vLp9Rt4Wz7"))
    }

    #[tokio::test]
    async fn test_remote_order_amount_in_minor_units() {
        let gateway = FakeGateway::new();
        let verifier = verifier();
        let payments = PaymentReconciler::new(&gateway, &verifier, CurrencyCode::INR);

        let order = payments
            .create_remote_order(Decimal::from_str("20.00").unwrap(), None)
            .await
            .unwrap();
        assert_eq!(order.amount, 2000);
        assert_eq!(order.currency, "INR");

        let sent = gateway.created_orders();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].receipt.starts_with("receipt_"));
    }

    #[tokio::test]
    async fn test_remote_order_rejects_zero() {
        let gateway = FakeGateway::new();
        let verifier = verifier();
        let payments = PaymentReconciler::new(&gateway, &verifier, CurrencyCode::INR);

        let err = payments
            .create_remote_order(Decimal::ZERO, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Validation(_)));
        assert!(gateway.created_orders().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_rejection_is_payment_error() {
        let gateway = FakeGateway::new();
        gateway.fail_orders(true);
        let verifier = verifier();
        let payments = PaymentReconciler::new(&gateway, &verifier, CurrencyCode::INR);

        let err = payments
            .create_remote_order(Decimal::ONE, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Payment(_)));
    }

    #[tokio::test]
    async fn test_refund_attaches_notes() {
        let gateway = FakeGateway::new();
        let verifier = verifier();
        let payments = PaymentReconciler::new(&gateway, &verifier, CurrencyCode::INR);
        let order_id = OrderId::generate();

        let refund_id = payments
            .refund("pay_123", "Order cancelled by admin", order_id)
            .await
            .unwrap();

        let refunds = gateway.refunds();
        assert_eq!(refunds.len(), 1);
        assert_eq!(refunds[0].refund_id, refund_id);
        assert_eq!(refunds[0].payment_id, "pay_123");
        assert_eq!(refunds[0].notes["order_id"], order_id.to_string());
    }

    #[tokio::test]
    async fn test_refund_failure_is_refund_error() {
        let gateway = FakeGateway::new();
        gateway.fail_refunds(true);
        let verifier = verifier();
        let payments = PaymentReconciler::new(&gateway, &verifier, CurrencyCode::INR);

        let err = payments
            .refund("pay_123", "reason", OrderId::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Refund(_)));
    }
}
