//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                          - Liveness
//! GET    /health/ready                    - Readiness (database ping)
//!
//! # Catalog
//! GET    /api/products                    - Listing (?search=&category=&sort=)
//! GET    /api/products/{id}               - Product detail
//!
//! # Checkout (rate limited)
//! POST   /api/payments/order              - Create gateway order (auth)
//! POST   /api/orders                      - Place order (guest or customer)
//!
//! # Orders
//! GET    /api/orders/{id}                 - Track order
//! POST   /api/orders/{id}/cancel          - Cancel order (owner or admin)
//!
//! # Account (requires auth)
//! GET    /api/account/orders              - Order history
//! GET    /api/account/addresses           - Address list
//! POST   /api/account/addresses           - Add address
//! DELETE /api/account/addresses/{id}      - Delete address
//! GET    /api/account/profile             - Profile with default address
//! PATCH  /api/account/profile             - Update phone / default address
//! GET    /api/wishlist                    - Wishlist
//! POST   /api/wishlist                    - Add to wishlist
//! DELETE /api/wishlist/{id}               - Remove from wishlist
//!
//! # Admin (requires admin role)
//! GET    /admin/api/orders                - All orders
//! PATCH  /admin/api/orders/{id}           - Edit delivery details
//! PUT    /admin/api/orders/{id}/status    - Change status
//! POST   /admin/api/products              - Create product
//! PUT    /admin/api/products/{id}         - Update product
//! DELETE /admin/api/products/{id}         - Delete product
//! DELETE /admin/api/products/{id}/images  - Remove one image
//! ```

pub mod account;
pub mod admin;
pub mod orders;
pub mod payments;
pub mod products;
pub mod wishlist;

use std::str::FromStr;

use axum::{
    Router,
    extract::{FromRequest, State},
    http::StatusCode,
    middleware::from_fn,
    routing::{delete, get, patch, post, put},
};

use crate::db::Store;
use crate::error::AppError;
use crate::middleware::{checkout_rate_limiter, load_principal, payment_rate_limiter};
use crate::services::PaymentGateway;
use crate::state::AppState;

/// JSON body extractor whose rejection is an [`AppError`] JSON response.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Parse a path id. A malformed id is reported as a missing `resource`.
pub(crate) fn parse_id<T: FromStr>(raw: &str, resource: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("{resource} {raw}")))
}

/// Build the full route tree.
///
/// The caller adds the session layer so [`load_principal`] can read it.
pub fn router<S: Store, G: PaymentGateway>() -> Router<AppState<S, G>> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness::<S, G>))
        .nest("/api", api_routes())
        .nest("/admin/api", admin_routes())
        .layer(from_fn(load_principal))
}

/// Public and customer routes.
fn api_routes<S: Store, G: PaymentGateway>() -> Router<AppState<S, G>> {
    Router::new()
        .route("/products", get(products::index::<S, G>))
        .route("/products/{id}", get(products::show::<S, G>))
        .route(
            "/payments/order",
            post(payments::create::<S, G>).layer(payment_rate_limiter()),
        )
        .route(
            "/orders",
            post(orders::create::<S, G>).layer(checkout_rate_limiter()),
        )
        .route("/orders/{id}", get(orders::track::<S, G>))
        .route("/orders/{id}/cancel", post(orders::cancel::<S, G>))
        .nest("/account", account_routes())
        .route(
            "/wishlist",
            get(wishlist::index::<S, G>).post(wishlist::add::<S, G>),
        )
        .route("/wishlist/{id}", delete(wishlist::remove::<S, G>))
}

/// Signed-in customer routes.
fn account_routes<S: Store, G: PaymentGateway>() -> Router<AppState<S, G>> {
    Router::new()
        .route("/orders", get(orders::mine::<S, G>))
        .route(
            "/addresses",
            get(account::addresses::<S, G>).post(account::create_address::<S, G>),
        )
        .route("/addresses/{id}", delete(account::delete_address::<S, G>))
        .route(
            "/profile",
            get(account::profile::<S, G>).patch(account::update_profile::<S, G>),
        )
}

/// Back-office routes. Every handler takes `RequireAdmin`.
fn admin_routes<S: Store, G: PaymentGateway>() -> Router<AppState<S, G>> {
    Router::new()
        .route("/orders", get(admin::orders::<S, G>))
        .route("/orders/{id}", patch(admin::update_contact::<S, G>))
        .route("/orders/{id}/status", put(admin::update_status::<S, G>))
        .route("/products", post(admin::create_product::<S, G>))
        .route(
            "/products/{id}",
            put(admin::update_product::<S, G>).delete(admin::delete_product::<S, G>),
        )
        .route("/products/{id}/images", delete(admin::remove_image::<S, G>))
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness<S: Store, G: PaymentGateway>(State(state): State<AppState<S, G>>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
