//! Catalog domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use apothecary_core::ProductId;

use crate::services::CommerceError;

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    /// Unit price in the store currency.
    pub price: Decimal,
    /// Units on hand. Never negative after a committed operation.
    pub stock: i32,
    pub category: String,
    /// Opaque image references (URLs or storage keys).
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProductSort {
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
    /// Creation time, newest first.
    #[default]
    Newest,
}

impl ProductSort {
    /// Parse a sort key. Unknown keys fall back to [`ProductSort::Newest`].
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        match key.trim() {
            "price_asc" => Self::PriceAsc,
            "price_desc" => Self::PriceDesc,
            "name_asc" => Self::NameAsc,
            "name_desc" => Self::NameDesc,
            _ => Self::Newest,
        }
    }
}

/// Raw listing query string, e.g. `?search=vit&category=Supplements&sort=price_asc`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
}

/// Normalized listing filter.
///
/// Empty strings and the `All` category collapse to "no filter", which makes
/// the value usable as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ProductFilter {
    /// Case-insensitive substring matched against name or description.
    pub search: Option<String>,
    /// Case-insensitive category equality.
    pub category: Option<String>,
    pub sort: ProductSort,
}

impl From<ProductQuery> for ProductFilter {
    fn from(query: ProductQuery) -> Self {
        let search = query
            .search
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());
        let category = query
            .category
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"));
        let sort = query
            .sort
            .as_deref()
            .map_or_else(ProductSort::default, ProductSort::from_key);

        Self {
            search,
            category,
            sort,
        }
    }
}

/// Admin request body for creating or replacing a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub category: String,
    /// References to append to the product's images.
    #[serde(default)]
    pub images: Vec<String>,
}

/// Validated product fields, used for both inserts and updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: i32,
    pub category: String,
    pub images: Vec<String>,
}

impl ProductRequest {
    /// Validate the request into a [`ProductDraft`].
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Validation` if the name or category is blank or
    /// the price or stock is negative.
    pub fn validate(self) -> Result<ProductDraft, CommerceError> {
        let name = self.name.trim().to_owned();
        if name.is_empty() {
            return Err(CommerceError::Validation("product name is required".into()));
        }
        let category = self.category.trim().to_owned();
        if category.is_empty() {
            return Err(CommerceError::Validation(
                "product category is required".into(),
            ));
        }
        if self.price.is_sign_negative() && !self.price.is_zero() {
            return Err(CommerceError::Validation(
                "price cannot be negative".into(),
            ));
        }
        if self.stock < 0 {
            return Err(CommerceError::Validation(
                "stock cannot be negative".into(),
            ));
        }

        let images = self
            .images
            .into_iter()
            .map(|i| i.trim().to_owned())
            .filter(|i| !i.is_empty())
            .collect();

        Ok(ProductDraft {
            name,
            description: self.description.trim().to_owned(),
            price: self.price.round_dp(2),
            stock: self.stock,
            category,
            images,
        })
    }
}

/// Admin request body for removing one image reference.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoveImageRequest {
    pub image: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn request() -> ProductRequest {
        ProductRequest {
            name: " SLATY-OD ".into(),
            description: "Sitagliptin 100 mg".into(),
            price: Decimal::from_str("299.00").unwrap(),
            stock: 50,
            category: "Diabetes".into(),
            images: vec!["  ".into(), "/uploads/slaty.jpg".into()],
        }
    }

    #[test]
    fn test_filter_normalizes_all_category() {
        let filter = ProductFilter::from(ProductQuery {
            search: Some("   ".into()),
            category: Some("ALL".into()),
            sort: None,
        });
        assert_eq!(filter, ProductFilter::default());
    }

    #[test]
    fn test_filter_keeps_real_values() {
        let filter = ProductFilter::from(ProductQuery {
            search: Some(" vitamin ".into()),
            category: Some("Supplements".into()),
            sort: Some("price_desc".into()),
        });
        assert_eq!(filter.search.as_deref(), Some("vitamin"));
        assert_eq!(filter.category.as_deref(), Some("Supplements"));
        assert_eq!(filter.sort, ProductSort::PriceDesc);
    }

    #[test]
    fn test_unknown_sort_falls_back_to_newest() {
        assert_eq!(ProductSort::from_key("popularity"), ProductSort::Newest);
        assert_eq!(ProductSort::from_key("name_asc"), ProductSort::NameAsc);
    }

    #[test]
    fn test_validate_trims_and_drops_blank_images() {
        let draft = request().validate().unwrap();
        assert_eq!(draft.name, "SLATY-OD");
        assert_eq!(draft.images, vec!["/uploads/slaty.jpg".to_string()]);
    }

    #[test]
    fn test_validate_rejects_negative_values() {
        let mut req = request();
        req.stock = -1;
        assert!(matches!(req.validate(), Err(CommerceError::Validation(_))));

        let mut req = request();
        req.price = Decimal::from_str("-0.01").unwrap();
        assert!(matches!(req.validate(), Err(CommerceError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let mut req = request();
        req.name = "  ".into();
        assert!(matches!(req.validate(), Err(CommerceError::Validation(_))));
    }
}
