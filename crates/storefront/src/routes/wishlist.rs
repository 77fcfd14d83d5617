//! Wishlist route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use apothecary_core::WishlistItemId;

use super::{ApiJson, parse_id};
use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequirePrincipal;
use crate::models::{WishlistEntry, WishlistItem, WishlistRequest};
use crate::services::PaymentGateway;
use crate::state::AppState;

pub async fn index<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequirePrincipal(principal): RequirePrincipal,
) -> Result<Json<Vec<WishlistEntry>>> {
    Ok(Json(state.wishlist().list(&principal).await?))
}

pub async fn add<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequirePrincipal(principal): RequirePrincipal,
    ApiJson(request): ApiJson<WishlistRequest>,
) -> Result<(StatusCode, Json<WishlistItem>)> {
    let item = state.wishlist().add(&principal, request.product_id).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn remove<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequirePrincipal(principal): RequirePrincipal,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id: WishlistItemId = parse_id(&id, "wishlist item")?;
    state.wishlist().remove(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
