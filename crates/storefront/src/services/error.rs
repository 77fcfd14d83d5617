//! Commerce error types.

use thiserror::Error;

use apothecary_core::OrderStatus;

use crate::db::RepositoryError;

/// Errors returned by the catalog, order, payment and account services.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Malformed or missing input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Entity does not exist (or is not visible to the caller).
    #[error("{0} not found")]
    NotFound(String),

    /// Caller may not act on this entity.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Stock cannot cover a requested quantity.
    #[error("{}", stock_message(.product, .available, .requested))]
    Stock {
        product: String,
        available: i32,
        requested: i32,
    },

    /// Operation is not allowed from the order's current status.
    #[error("cannot {action} an order that is {status}")]
    InvalidState {
        action: &'static str,
        status: OrderStatus,
    },

    /// Payment signature mismatch or gateway rejection.
    #[error("payment failed: {0}")]
    Payment(String),

    /// Refund call failed; the order was left unchanged.
    #[error("refund failed: {0}")]
    Refund(String),

    /// Operation conflicts with existing data.
    #[error("{message}")]
    Conflict {
        message: String,
        /// Statuses of the orders blocking the operation, if any.
        blocking_statuses: Vec<OrderStatus>,
    },

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl CommerceError {
    /// Stable machine-readable code for API responses.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Stock { .. } => "insufficient_stock",
            Self::InvalidState { .. } => "invalid_state",
            Self::Payment(_) => "payment_error",
            Self::Refund(_) => "refund_error",
            Self::Conflict { .. } => "conflict",
            Self::Repository(_) => "internal_error",
        }
    }

    pub(crate) fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{entity} {id}"))
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn stock_message(product: &str, available: &i32, requested: &i32) -> String {
    if *available <= 0 {
        format!("{product} is out of stock")
    } else {
        format!(
            "insufficient stock for {product}: only {available} available, but {requested} requested"
        )
    }
}
