//! Account, address and wishlist queries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use apothecary_core::{AddressId, ProductId, UserId, WishlistItemId};

use crate::db::RepositoryError;
use crate::models::{Address, AddressDraft, ProductSummary, User, WishlistEntry, WishlistItem};

const ADDRESS_COLUMNS: &str = "id, user_id, full_name, phone, address_line1, address_line2, \
     city, state, pincode, is_default, created_at, updated_at";

/// Internal row type for user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: Option<String>,
    email: String,
    phone: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            name: row.name,
            email: row.email,
            phone: row.phone,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for address queries.
#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: Uuid,
    user_id: Uuid,
    full_name: String,
    phone: String,
    address_line1: String,
    address_line2: Option<String>,
    city: String,
    state: String,
    pincode: String,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            full_name: row.full_name,
            phone: row.phone,
            address_line1: row.address_line1,
            address_line2: row.address_line2,
            city: row.city,
            state: row.state,
            pincode: row.pincode,
            is_default: row.is_default,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for wishlist rows.
#[derive(Debug, sqlx::FromRow)]
struct WishlistRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<WishlistRow> for WishlistItem {
    fn from(row: WishlistRow) -> Self {
        Self {
            id: WishlistItemId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            product_id: ProductId::from_uuid(row.product_id),
            created_at: row.created_at,
        }
    }
}

/// Internal row type for wishlist rows joined with their product.
#[derive(Debug, sqlx::FromRow)]
struct WishlistEntryRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    product_id: Uuid,
    product_name: String,
    product_price: Decimal,
    product_stock: i32,
    product_images: Vec<String>,
}

impl From<WishlistEntryRow> for WishlistEntry {
    fn from(row: WishlistEntryRow) -> Self {
        Self {
            id: WishlistItemId::from_uuid(row.id),
            product: ProductSummary {
                id: ProductId::from_uuid(row.product_id),
                name: row.product_name,
                price: row.product_price,
                stock: row.product_stock,
                images: row.product_images,
            },
            created_at: row.created_at,
        }
    }
}

// =============================================================================
// Users
// =============================================================================

pub(super) async fn get_user(
    conn: &mut PgConnection,
    id: UserId,
) -> Result<Option<User>, RepositoryError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, name, email, phone, created_at, updated_at FROM storefront.user WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(User::from))
}

pub(super) async fn set_user_phone(
    conn: &mut PgConnection,
    id: UserId,
    phone: &str,
) -> Result<(), RepositoryError> {
    let result =
        sqlx::query("UPDATE storefront.user SET phone = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(phone)
            .execute(conn)
            .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

// =============================================================================
// Addresses
// =============================================================================

pub(super) async fn list_addresses(
    conn: &mut PgConnection,
    user: UserId,
) -> Result<Vec<Address>, RepositoryError> {
    let sql = format!(
        "SELECT {ADDRESS_COLUMNS} FROM storefront.address
         WHERE user_id = $1 ORDER BY is_default DESC, created_at DESC"
    );
    let rows = sqlx::query_as::<_, AddressRow>(&sql)
        .bind(user)
        .fetch_all(conn)
        .await?;

    Ok(rows.into_iter().map(Address::from).collect())
}

pub(super) async fn get_default_address(
    conn: &mut PgConnection,
    user: UserId,
) -> Result<Option<Address>, RepositoryError> {
    let sql = format!(
        "SELECT {ADDRESS_COLUMNS} FROM storefront.address WHERE user_id = $1 AND is_default"
    );
    let row = sqlx::query_as::<_, AddressRow>(&sql)
        .bind(user)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Address::from))
}

pub(super) async fn clear_default_addresses(
    conn: &mut PgConnection,
    user: UserId,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query(
        "UPDATE storefront.address SET is_default = FALSE, updated_at = now()
         WHERE user_id = $1 AND is_default",
    )
    .bind(user)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

pub(super) async fn insert_address(
    conn: &mut PgConnection,
    user: UserId,
    draft: &AddressDraft,
    is_default: bool,
) -> Result<Address, RepositoryError> {
    let sql = format!(
        r"
        INSERT INTO storefront.address
            (id, user_id, full_name, phone, address_line1, address_line2, city, state, pincode, is_default)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {ADDRESS_COLUMNS}
        "
    );
    let row = sqlx::query_as::<_, AddressRow>(&sql)
        .bind(AddressId::generate())
        .bind(user)
        .bind(&draft.full_name)
        .bind(&draft.phone)
        .bind(&draft.address_line1)
        .bind(draft.address_line2.as_deref())
        .bind(&draft.city)
        .bind(&draft.state)
        .bind(&draft.pincode)
        .bind(is_default)
        .fetch_one(conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("user already has a default address".to_owned());
            }
            RepositoryError::Database(e)
        })?;

    Ok(row.into())
}

pub(super) async fn update_address(
    conn: &mut PgConnection,
    id: AddressId,
    draft: &AddressDraft,
) -> Result<Option<Address>, RepositoryError> {
    let sql = format!(
        r"
        UPDATE storefront.address
        SET full_name = $2, phone = $3, address_line1 = $4, address_line2 = $5,
            city = $6, state = $7, pincode = $8, updated_at = now()
        WHERE id = $1
        RETURNING {ADDRESS_COLUMNS}
        "
    );
    let row = sqlx::query_as::<_, AddressRow>(&sql)
        .bind(id)
        .bind(&draft.full_name)
        .bind(&draft.phone)
        .bind(&draft.address_line1)
        .bind(draft.address_line2.as_deref())
        .bind(&draft.city)
        .bind(&draft.state)
        .bind(&draft.pincode)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(Address::from))
}

pub(super) async fn delete_address(
    conn: &mut PgConnection,
    user: UserId,
    id: AddressId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM storefront.address WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Wishlist
// =============================================================================

pub(super) async fn list_wishlist(
    conn: &mut PgConnection,
    user: UserId,
) -> Result<Vec<WishlistEntry>, RepositoryError> {
    let rows = sqlx::query_as::<_, WishlistEntryRow>(
        r"
        SELECT w.id, w.created_at,
               p.id AS product_id, p.name AS product_name, p.price AS product_price,
               p.stock AS product_stock, p.images AS product_images
        FROM storefront.wishlist_item w
        JOIN storefront.product p ON p.id = w.product_id
        WHERE w.user_id = $1
        ORDER BY w.created_at DESC
        ",
    )
    .bind(user)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(WishlistEntry::from).collect())
}

pub(super) async fn insert_wishlist_item(
    conn: &mut PgConnection,
    user: UserId,
    product: ProductId,
) -> Result<WishlistItem, RepositoryError> {
    let row = sqlx::query_as::<_, WishlistRow>(
        r"
        INSERT INTO storefront.wishlist_item (id, user_id, product_id)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, product_id, created_at
        ",
    )
    .bind(WishlistItemId::generate())
    .bind(user)
    .bind(product)
    .fetch_one(conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.is_unique_violation() {
                return RepositoryError::Conflict("product already in wishlist".to_owned());
            }
            if db_err.is_foreign_key_violation() {
                return RepositoryError::NotFound;
            }
        }
        RepositoryError::Database(e)
    })?;

    Ok(row.into())
}

pub(super) async fn delete_wishlist_item(
    conn: &mut PgConnection,
    user: UserId,
    id: WishlistItemId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM storefront.wishlist_item WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user)
        .execute(conn)
        .await?;

    Ok(result.rows_affected() > 0)
}
