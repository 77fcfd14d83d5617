//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `catalog` - Product listing and admin catalog management
//! - `orders` - Order state machine (checkout, cancel, status changes)
//! - `stock` - Stock ledger used inside order transactions
//! - `payments` - Gateway orders, signature checks and refunds
//! - `accounts` - Saved addresses and profile
//! - `wishlist` - Saved products
//!
//! Every service borrows what it needs from the application state and runs
//! each operation as one unit of work on the [`Store`](crate::db::Store).

pub mod accounts;
pub mod catalog;
pub mod error;
pub mod orders;
pub mod payments;
pub mod stock;
pub mod wishlist;

use tracing::warn;

use crate::db::Transaction;

pub use accounts::AccountService;
pub use catalog::{CatalogCache, CatalogService};
pub use error::CommerceError;
pub use orders::OrderService;
pub use payments::{PaymentGateway, PaymentReconciler, RazorpayClient, SignatureVerifier};
pub use wishlist::WishlistService;

/// Commit `tx` if `result` is `Ok`, roll it back otherwise.
pub(crate) async fn finish<T: Transaction, R>(tx: T, result: Result<R, CommerceError>) -> Result<R, CommerceError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "Rollback failed");
            }
            Err(e)
        }
    }
}
