//! Back-office route handlers.
//!
//! Every handler requires an admin principal.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Serialize;
use tracing::info;

use apothecary_core::{OrderId, ProductId};

use super::{ApiJson, parse_id};
use crate::db::Store;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{
    ContactUpdateRequest, Order, Product, ProductRequest, RemoveImageRequest, StatusUpdateRequest,
};
use crate::services::PaymentGateway;
use crate::state::AppState;

/// Response to a product deletion.
#[derive(Debug, Serialize)]
pub struct DeletedProduct {
    pub id: ProductId,
    /// Image references the caller may now remove from storage.
    pub images: Vec<String>,
}

/// Every order, newest first.
pub async fn orders<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(state.orders().list_orders().await?))
}

/// Edit an order's delivery details.
pub async fn update_contact<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<ContactUpdateRequest>,
) -> Result<Json<Order>> {
    let id: OrderId = parse_id(&id, "order")?;
    let update = request.validate()?;
    Ok(Json(state.orders().update_order_contact(id, update).await?))
}

/// Move an order to any status.
pub async fn update_status<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<StatusUpdateRequest>,
) -> Result<Json<Order>> {
    let id: OrderId = parse_id(&id, "order")?;
    let order = state
        .orders()
        .update_order_status(id, request.status)
        .await?;
    info!(admin_id = %admin.user_id, order_id = %id, status = %order.status, "Admin changed order status");
    Ok(Json(order))
}

pub async fn create_product<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequireAdmin(_admin): RequireAdmin,
    ApiJson(request): ApiJson<ProductRequest>,
) -> Result<(StatusCode, Json<Product>)> {
    let draft = request.validate()?;
    let product = state.catalog().create_product(draft).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Replace a product's fields and append any new images.
pub async fn update_product<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<ProductRequest>,
) -> Result<Json<Product>> {
    let id: ProductId = parse_id(&id, "product")?;
    let draft = request.validate()?;
    Ok(Json(state.catalog().update_product(id, draft).await?))
}

/// Delete a product that no active order references.
pub async fn delete_product<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<DeletedProduct>> {
    let id: ProductId = parse_id(&id, "product")?;
    let images = state.catalog().delete_product(id).await?;
    Ok(Json(DeletedProduct { id, images }))
}

pub async fn remove_image<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<RemoveImageRequest>,
) -> Result<Json<Product>> {
    let id: ProductId = parse_id(&id, "product")?;
    Ok(Json(
        state
            .catalog()
            .remove_product_image(id, &request.image)
            .await?,
    ))
}
