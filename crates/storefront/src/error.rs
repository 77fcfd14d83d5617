//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error response is JSON:
//!
//! ```json
//! {"error": "insufficient_stock", "message": "...", "product": "...", "available": 1, "requested": 2}
//! ```

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::CommerceError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// A catalog, order, payment or account operation failed.
    #[error(transparent)]
    Commerce(#[from] CommerceError),

    /// Database operation failed outside a service.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Commerce(err) => match err {
                CommerceError::Validation(_) => StatusCode::BAD_REQUEST,
                CommerceError::NotFound(_) => StatusCode::NOT_FOUND,
                CommerceError::Forbidden(_) => StatusCode::FORBIDDEN,
                CommerceError::Stock { .. }
                | CommerceError::InvalidState { .. }
                | CommerceError::Conflict { .. } => StatusCode::CONFLICT,
                CommerceError::Payment(_) => StatusCode::PAYMENT_REQUIRED,
                CommerceError::Refund(_) => StatusCode::BAD_GATEWAY,
                CommerceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Stable machine-readable code for the response body.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Commerce(err) => err.code(),
            Self::Database(_) | Self::Internal(_) => "internal_error",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::BadRequest(_) => "bad_request",
        }
    }

    /// Errors worth an alert: infrastructure failures and refunds that did
    /// not go through.
    const fn is_reportable(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Commerce(CommerceError::Repository(_) | CommerceError::Refund(_))
        )
    }

    fn body(&self) -> Value {
        // Don't expose internal error details to clients
        let message = match self {
            Self::Database(_) | Self::Internal(_) | Self::Commerce(CommerceError::Repository(_)) => {
                "Internal server error".to_string()
            }
            Self::Commerce(err) => err.to_string(),
            _ => self.to_string(),
        };

        let mut body = json!({ "error": self.code(), "message": message });
        if let Self::Commerce(err) = self {
            match err {
                CommerceError::Stock {
                    product,
                    available,
                    requested,
                } => {
                    body["product"] = json!(product);
                    body["available"] = json!(available);
                    body["requested"] = json!(requested);
                }
                CommerceError::InvalidState { status, .. } => {
                    body["status"] = json!(status);
                }
                CommerceError::Conflict {
                    blocking_statuses, ..
                } if !blocking_statuses.is_empty() => {
                    body["blocking_orders"] = json!(blocking_statuses.len());
                    body["blocking_statuses"] = json!(blocking_statuses);
                }
                _ => {}
            }
        }
        body
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_reportable() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), Json(self.body())).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Called once the session principal is known so errors are associated with
/// the user.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order placed", Some(&[("order_id", "…")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use apothecary_core::OrderStatus;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::from(CommerceError::Validation("cart is empty".to_string()));
        assert_eq!(err.to_string(), "validation failed: cart is empty");
    }

    #[test]
    fn test_commerce_status_codes() {
        let cases = [
            (CommerceError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (CommerceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (CommerceError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (
                CommerceError::Stock {
                    product: "x".into(),
                    available: 0,
                    requested: 1,
                },
                StatusCode::CONFLICT,
            ),
            (
                CommerceError::InvalidState {
                    action: "cancel",
                    status: OrderStatus::Shipped,
                },
                StatusCode::CONFLICT,
            ),
            (CommerceError::Payment("x".into()), StatusCode::PAYMENT_REQUIRED),
            (CommerceError::Refund("x".into()), StatusCode::BAD_GATEWAY),
            (
                CommerceError::Repository(RepositoryError::NotFound),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(get_status(err.into()), status);
        }
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_stock_body_carries_counts() {
        let body = AppError::from(CommerceError::Stock {
            product: "SLATY-OD".into(),
            available: 1,
            requested: 2,
        })
        .body();
        assert_eq!(body["error"], "insufficient_stock");
        assert_eq!(body["available"], 1);
        assert_eq!(body["requested"], 2);
    }

    #[test]
    fn test_conflict_body_lists_statuses() {
        let body = AppError::from(CommerceError::Conflict {
            message: "blocked".into(),
            blocking_statuses: vec![OrderStatus::Pending, OrderStatus::Shipped],
        })
        .body();
        assert_eq!(body["blocking_orders"], 2);
        assert_eq!(body["blocking_statuses"], json!(["PENDING", "SHIPPED"]));
    }

    #[test]
    fn test_internal_details_hidden() {
        let body = AppError::Internal("pool exhausted at 10.0.0.3".into()).body();
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["error"], "internal_error");
    }
}
