//! Payment route handlers.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::Deserialize;

use apothecary_core::CurrencyCode;

use super::ApiJson;
use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequirePrincipal;
use crate::services::PaymentGateway;
use crate::services::payments::RemoteOrder;
use crate::state::AppState;

/// Body of a gateway order request. `amount` is in standard units.
#[derive(Debug, Deserialize)]
pub struct RemoteOrderBody {
    pub amount: Decimal,
    pub currency: Option<CurrencyCode>,
}

/// Create the gateway order the checkout widget pays against.
///
/// The order is recorded so the checkout it pays for must total the same
/// amount.
pub async fn create<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequirePrincipal(_principal): RequirePrincipal,
    ApiJson(body): ApiJson<RemoteOrderBody>,
) -> Result<Json<RemoteOrder>> {
    let order = state
        .orders()
        .prepare_payment(body.amount, body.currency)
        .await?;
    Ok(Json(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use apothecary_core::UserId;

    use crate::models::Principal;
    use crate::routes::test_support::{send, state};

    #[tokio::test]
    async fn test_amount_sent_in_minor_units() {
        let (state, _, gateway) = state();
        let customer = Some(Principal::customer(UserId::generate()));

        let (status, body) = send(
            &state,
            customer,
            Method::POST,
            "/api/payments/order",
            Some(json!({ "amount": "20.00" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["amount"], 2000);
        assert_eq!(body["currency"], "INR");
        assert_eq!(gateway.created_orders()[0].amount, 2000);
    }

    #[tokio::test]
    async fn test_requires_login() {
        let (state, _, gateway) = state();
        let (status, _) = send(
            &state,
            None,
            Method::POST,
            "/api/payments/order",
            Some(json!({ "amount": "20.00" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(gateway.created_orders().is_empty());
    }

    #[tokio::test]
    async fn test_gateway_failure_is_payment_error() {
        let (state, _, gateway) = state();
        gateway.fail_orders(true);
        let customer = Some(Principal::customer(UserId::generate()));

        let (status, body) = send(
            &state,
            customer,
            Method::POST,
            "/api/payments/order",
            Some(json!({ "amount": "5.00", "currency": "INR" })),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert_eq!(body["error"], "payment_error");
    }
}
