//! Catalog queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use apothecary_core::{OrderStatus, ProductId};

use super::{map_constraint, parse_status};
use crate::db::RepositoryError;
use crate::models::{Product, ProductDraft, ProductFilter, ProductSort};

const PRODUCT_COLUMNS: &str =
    "id, name, description, price, stock, category, images, created_at, updated_at";

/// Internal row type for product queries.
#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: String,
    price: Decimal,
    stock: i32,
    category: String,
    images: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            price: row.price,
            stock: row.stock,
            category: row.category,
            images: row.images,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const fn order_by(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::PriceAsc => "price ASC, created_at DESC",
        ProductSort::PriceDesc => "price DESC, created_at DESC",
        ProductSort::NameAsc => "name ASC",
        ProductSort::NameDesc => "name DESC",
        ProductSort::Newest => "created_at DESC",
    }
}

/// Escape `LIKE` wildcards so the search term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

pub(super) async fn list(
    conn: &mut PgConnection,
    filter: &ProductFilter,
) -> Result<Vec<Product>, RepositoryError> {
    let sql = format!(
        r"
        SELECT {PRODUCT_COLUMNS}
        FROM storefront.product
        WHERE ($1::text IS NULL OR name ILIKE $1 OR description ILIKE $1)
          AND ($2::text IS NULL OR lower(category) = lower($2))
        ORDER BY {}
        ",
        order_by(filter.sort)
    );

    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(filter.search.as_deref().map(like_pattern))
        .bind(filter.category.as_deref())
        .fetch_all(conn)
        .await?;

    Ok(rows.into_iter().map(Product::from).collect())
}

pub(super) async fn get(
    conn: &mut PgConnection,
    id: ProductId,
) -> Result<Option<Product>, RepositoryError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM storefront.product WHERE id = $1");
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Product::from))
}

pub(super) async fn lock(
    conn: &mut PgConnection,
    ids: &[ProductId],
) -> Result<Vec<Product>, RepositoryError> {
    // Ordered locking keeps concurrent checkouts over the same products
    // from deadlocking.
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM storefront.product
         WHERE id = ANY($1) ORDER BY id FOR UPDATE"
    );
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(ids)
        .fetch_all(conn)
        .await?;

    Ok(rows.into_iter().map(Product::from).collect())
}

pub(super) async fn insert(
    conn: &mut PgConnection,
    draft: &ProductDraft,
) -> Result<Product, RepositoryError> {
    let sql = format!(
        r"
        INSERT INTO storefront.product (id, name, description, price, stock, category, images)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {PRODUCT_COLUMNS}
        "
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(ProductId::generate())
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.stock)
        .bind(&draft.category)
        .bind(&draft.images)
        .fetch_one(conn)
        .await
        .map_err(map_constraint)?;

    Ok(row.into())
}

pub(super) async fn update(
    conn: &mut PgConnection,
    id: ProductId,
    draft: &ProductDraft,
) -> Result<Option<Product>, RepositoryError> {
    let sql = format!(
        r"
        UPDATE storefront.product
        SET name = $2, description = $3, price = $4, stock = $5, category = $6,
            images = images || $7, updated_at = now()
        WHERE id = $1
        RETURNING {PRODUCT_COLUMNS}
        "
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.stock)
        .bind(&draft.category)
        .bind(&draft.images)
        .fetch_optional(conn)
        .await
        .map_err(map_constraint)?;

    Ok(row.map(Product::from))
}

pub(super) async fn set_images(
    conn: &mut PgConnection,
    id: ProductId,
    images: &[String],
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE storefront.product SET images = $2, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(images)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn delete(conn: &mut PgConnection, id: ProductId) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM storefront.product WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn adjust_stock(
    conn: &mut PgConnection,
    id: ProductId,
    delta: i32,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE storefront.product SET stock = stock + $2, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(delta)
    .execute(conn)
    .await
    .map_err(map_constraint)?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

pub(super) async fn active_order_statuses(
    conn: &mut PgConnection,
    product: ProductId,
) -> Result<Vec<OrderStatus>, RepositoryError> {
    let statuses: Vec<String> = sqlx::query_scalar(
        r"
        SELECT o.status
        FROM storefront.customer_order o
        WHERE o.status NOT IN ('DELIVERED', 'CANCELLED')
          AND EXISTS (
              SELECT 1 FROM storefront.order_item i
              WHERE i.order_id = o.id AND i.product_id = $1
          )
        ORDER BY o.created_at
        ",
    )
    .bind(product)
    .fetch_all(conn)
    .await?;

    statuses.iter().map(|s| parse_status(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("vit"), "%vit%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_order_by_newest_is_default() {
        assert_eq!(order_by(ProductSort::default()), "created_at DESC");
    }
}
