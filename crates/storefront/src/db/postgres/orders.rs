//! Order queries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use apothecary_core::{CurrencyCode, OrderId, OrderItemId, OrderStatus, ProductId, UserId};

use super::{map_constraint, parse_status};
use crate::db::RepositoryError;
use crate::models::{ContactUpdate, NewOrder, Order, OrderItem, PaymentIntent, PaymentRecord};

const ORDER_COLUMNS: &str = "id, user_id, customer_name, customer_email, customer_phone, \
     address, total, status, payment_verified, gateway_order_id, gateway_payment_id, \
     gateway_signature, refund_id, stock_released, created_at, updated_at";

/// Internal row type for order queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: Option<Uuid>,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    address: String,
    total: Decimal,
    status: String,
    payment_verified: bool,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    gateway_signature: Option<String>,
    refund_id: Option<String>,
    stock_released: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        Ok(Order {
            id: OrderId::from_uuid(self.id),
            user_id: self.user_id.map(UserId::from_uuid),
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            customer_phone: self.customer_phone,
            address: self.address,
            total: self.total,
            status: parse_status(&self.status)?,
            payment: PaymentRecord {
                payment_verified: self.payment_verified,
                gateway_order_id: self.gateway_order_id,
                gateway_payment_id: self.gateway_payment_id,
                gateway_signature: self.gateway_signature,
            },
            refund_id: self.refund_id,
            stock_released: self.stock_released,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Internal row type for order line queries.
#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Option<Uuid>,
    product_name: String,
    quantity: i32,
    price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::from_uuid(row.id),
            order_id: OrderId::from_uuid(row.order_id),
            product_id: row.product_id.map(ProductId::from_uuid),
            product_name: row.product_name,
            quantity: row.quantity,
            price: row.price,
        }
    }
}

async fn items_for(
    conn: &mut PgConnection,
    order_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<OrderItem>>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT id, order_id, product_id, product_name, quantity, price
        FROM storefront.order_item
        WHERE order_id = ANY($1)
        ORDER BY product_name, id
        ",
    )
    .bind(order_ids)
    .fetch_all(conn)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for row in rows {
        grouped.entry(row.order_id).or_default().push(row.into());
    }
    Ok(grouped)
}

async fn attach_items(
    conn: &mut PgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<Order>, RepositoryError> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut items = items_for(conn, &ids).await?;

    rows.into_iter()
        .map(|row| {
            let lines = items.remove(&row.id).unwrap_or_default();
            row.into_order(lines)
        })
        .collect()
}

async fn fetch_one(
    conn: &mut PgConnection,
    id: OrderId,
    for_update: bool,
) -> Result<Option<Order>, RepositoryError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {ORDER_COLUMNS} FROM storefront.customer_order WHERE id = $1{lock}");

    let Some(row) = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let mut orders = attach_items(conn, vec![row]).await?;
    Ok(orders.pop())
}

pub(super) async fn get(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    fetch_one(conn, id, false).await
}

pub(super) async fn lock(
    conn: &mut PgConnection,
    id: OrderId,
) -> Result<Option<Order>, RepositoryError> {
    fetch_one(conn, id, true).await
}

pub(super) async fn insert(
    conn: &mut PgConnection,
    order: &NewOrder,
) -> Result<Order, RepositoryError> {
    let id = OrderId::generate();
    sqlx::query(
        r"
        INSERT INTO storefront.customer_order
            (id, user_id, customer_name, customer_email, customer_phone, address, total,
             status, payment_verified, gateway_order_id, gateway_payment_id, gateway_signature)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ",
    )
    .bind(id)
    .bind(order.user_id)
    .bind(&order.customer_name)
    .bind(&order.customer_email)
    .bind(order.customer_phone.as_deref())
    .bind(&order.address)
    .bind(order.total)
    .bind(order.status.as_str())
    .bind(order.payment.payment_verified)
    .bind(order.payment.gateway_order_id.as_deref())
    .bind(order.payment.gateway_payment_id.as_deref())
    .bind(order.payment.gateway_signature.as_deref())
    .execute(&mut *conn)
    .await
    .map_err(map_constraint)?;

    for item in &order.items {
        sqlx::query(
            r"
            INSERT INTO storefront.order_item (id, order_id, product_id, product_name, quantity, price)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(OrderItemId::generate())
        .bind(id)
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(item.price)
        .execute(&mut *conn)
        .await?;
    }

    fetch_one(conn, id, false)
        .await?
        .ok_or_else(|| RepositoryError::DataCorruption(format!("order {id} vanished after insert")))
}

pub(super) async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
    refund_id: Option<&str>,
    stock_released: bool,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE storefront.customer_order
        SET status = $2,
            refund_id = COALESCE($3, refund_id),
            stock_released = $4,
            updated_at = now()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(status.as_str())
    .bind(refund_id)
    .bind(stock_released)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

pub(super) async fn update_contact(
    conn: &mut PgConnection,
    id: OrderId,
    update: &ContactUpdate,
) -> Result<Option<Order>, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE storefront.customer_order
        SET customer_name = COALESCE($2, customer_name),
            customer_phone = COALESCE($3, customer_phone),
            address = COALESCE($4, address),
            updated_at = now()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(update.customer_name.as_deref())
    .bind(update.customer_phone.as_deref())
    .bind(update.address.as_deref())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    fetch_one(conn, id, false).await
}

pub(super) async fn list(
    conn: &mut PgConnection,
    user: Option<UserId>,
) -> Result<Vec<Order>, RepositoryError> {
    let sql = format!(
        r"
        SELECT {ORDER_COLUMNS}
        FROM storefront.customer_order
        WHERE $1::uuid IS NULL OR user_id = $1
        ORDER BY created_at DESC
        "
    );
    let rows = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(user)
        .fetch_all(&mut *conn)
        .await?;

    attach_items(conn, rows).await
}

/// Internal row type for payment intent queries.
#[derive(Debug, sqlx::FromRow)]
struct PaymentIntentRow {
    gateway_order_id: String,
    amount: i64,
    currency: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentIntentRow> for PaymentIntent {
    type Error = RepositoryError;

    fn try_from(row: PaymentIntentRow) -> Result<Self, Self::Error> {
        let currency: CurrencyCode = row.currency.parse().map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid currency in database: {e}"))
        })?;
        Ok(Self {
            gateway_order_id: row.gateway_order_id,
            amount: row.amount,
            currency,
            created_at: row.created_at,
        })
    }
}

pub(super) async fn insert_intent(
    conn: &mut PgConnection,
    intent: &PaymentIntent,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO storefront.payment_intent (gateway_order_id, amount, currency, created_at)
        VALUES ($1, $2, $3, $4)
        ",
    )
    .bind(&intent.gateway_order_id)
    .bind(intent.amount)
    .bind(intent.currency.as_str())
    .bind(intent.created_at)
    .execute(conn)
    .await
    .map_err(map_constraint)?;
    Ok(())
}

pub(super) async fn get_intent(
    conn: &mut PgConnection,
    gateway_order_id: &str,
) -> Result<Option<PaymentIntent>, RepositoryError> {
    sqlx::query_as::<_, PaymentIntentRow>(
        r"
        SELECT gateway_order_id, amount, currency, created_at
        FROM storefront.payment_intent
        WHERE gateway_order_id = $1
        ",
    )
    .bind(gateway_order_id)
    .fetch_optional(conn)
    .await?
    .map(PaymentIntent::try_from)
    .transpose()
}
