//! Wishlist entries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use apothecary_core::{ProductId, UserId, WishlistItemId};

/// A stored wishlist row. Unique per `(user_id, product_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WishlistItem {
    pub id: WishlistItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub created_at: DateTime<Utc>,
}

/// Wishlist row joined with the product it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WishlistEntry {
    pub id: WishlistItemId,
    pub product: ProductSummary,
    pub created_at: DateTime<Utc>,
}

/// Product fields shown on the wishlist page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
    pub images: Vec<String>,
}

/// Body of an add-to-wishlist request.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct WishlistRequest {
    pub product_id: ProductId,
}
