//! Account route handlers.
//!
//! These routes require authentication.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use apothecary_core::AddressId;

use super::{ApiJson, parse_id};
use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequirePrincipal;
use crate::models::{Address, AddressRequest, Profile, ProfileUpdateRequest};
use crate::services::PaymentGateway;
use crate::state::AppState;

/// Saved addresses, default first.
pub async fn addresses<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequirePrincipal(principal): RequirePrincipal,
) -> Result<Json<Vec<Address>>> {
    Ok(Json(state.accounts().list_addresses(&principal).await?))
}

/// Save a new address.
pub async fn create_address<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequirePrincipal(principal): RequirePrincipal,
    ApiJson(request): ApiJson<AddressRequest>,
) -> Result<(StatusCode, Json<Address>)> {
    let (draft, is_default) = request.validate()?;
    let address = state
        .accounts()
        .create_address(&principal, draft, is_default)
        .await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// Delete one of the caller's addresses.
pub async fn delete_address<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequirePrincipal(principal): RequirePrincipal,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id: AddressId = parse_id(&id, "address")?;
    state.accounts().delete_address(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Account details with the default address.
pub async fn profile<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequirePrincipal(principal): RequirePrincipal,
) -> Result<Json<Profile>> {
    Ok(Json(state.accounts().profile(&principal).await?))
}

/// Update the phone number and default address.
pub async fn update_profile<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequirePrincipal(principal): RequirePrincipal,
    ApiJson(request): ApiJson<ProfileUpdateRequest>,
) -> Result<Json<Profile>> {
    let update = request.validate()?;
    Ok(Json(state.accounts().update_profile(&principal, update).await?))
}
