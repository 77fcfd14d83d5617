//! Product route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use apothecary_core::ProductId;

use super::parse_id;
use crate::db::Store;
use crate::error::Result;
use crate::models::{Product, ProductQuery};
use crate::services::PaymentGateway;
use crate::state::AppState;

/// Product listing with optional search, category and sort.
pub async fn index<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<Product>>> {
    let products = state.catalog().list_products(query.into()).await?;
    Ok(Json(products))
}

/// Product detail.
pub async fn show<S: Store, G: PaymentGateway>(
    State(state): State<AppState<S, G>>,
    Path(id): Path<String>,
) -> Result<Json<Product>> {
    let id: ProductId = parse_id(&id, "product")?;
    Ok(Json(state.catalog().get_product(id).await?))
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
    async fn test_listing_filters_and_sorts() {
        let (state, _, _) = state();
        let admin = Some(Principal::admin(UserId::generate()));
        for (name, price, category) in [
            ("Vitamin C", "12.50", "Vitamins"),
            ("Vitamin D3", "8.00", "Vitamins"),
            ("Zinc", "5.00", "Minerals"),
        ] {
            let (status, _) = send(
                &state,
                admin,
                Method::POST,
                "/admin/api/products",
                Some(json!({ "name": name, "price": price, "stock": 10, "category": category })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, body) = send(
            &state,
            None,
            Method::GET,
            "/api/products?search=vitamin&category=vitamins&sort=price_asc",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["Vitamin D3", "Vitamin C"]);

        let (_, all) = send(&state, None, Method::GET, "/api/products?category=All", None).await;
        assert_eq!(all.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let (state, _, _) = state();
        let uri = format!("/api/products/{}", apothecary_core::ProductId::generate());
        let (status, body) = send(&state, None, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }
}
