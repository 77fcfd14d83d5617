//! Order domain types and checkout input.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use apothecary_core::{
    CurrencyCode, Email, OrderId, OrderItemId, OrderStatus, Phone, ProductId, UserId,
};

use crate::services::CommerceError;

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    /// Owning account; `None` for guest checkouts.
    pub user_id: Option<UserId>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    /// Delivery address as a single denormalized string.
    pub address: String,
    /// Sum of `price * quantity` over the items at creation time.
    pub total: Decimal,
    pub status: OrderStatus,
    #[serde(flatten)]
    pub payment: PaymentRecord,
    pub refund_id: Option<String>,
    /// Whether cancelling this order credited its items back to stock.
    #[serde(skip)]
    pub stock_released: bool,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether `user` placed this order.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user_id == Some(user)
    }
}

/// Payment attributes of an order, orthogonal to its fulfillment status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaymentRecord {
    /// Whether a gateway signature was checked when the order was placed.
    pub payment_verified: bool,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    #[serde(skip)]
    pub gateway_signature: Option<String>,
}

impl PaymentRecord {
    /// Record for a confirmation whose signature has been verified.
    #[must_use]
    pub fn verified(confirmation: &PaymentConfirmation) -> Self {
        Self {
            payment_verified: true,
            gateway_order_id: Some(confirmation.gateway_order_id.clone()),
            gateway_payment_id: Some(confirmation.gateway_payment_id.clone()),
            gateway_signature: Some(confirmation.signature.clone()),
        }
    }
}

/// A gateway order created by the storefront, recorded so the checkout that
/// pays it can be matched against its amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub gateway_order_id: String,
    /// Minor units.
    pub amount: i64,
    pub currency: CurrencyCode,
    pub created_at: DateTime<Utc>,
}

/// One line of an order. Name and price are snapshots taken at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// `None` once the product has been deleted from the catalog.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
}

/// An order ready to be inserted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub address: String,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment: PaymentRecord,
    pub items: Vec<NewOrderItem>,
}

/// An order line ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
}

/// Sum of `price * quantity` over `items`.
#[must_use]
pub fn order_total(items: &[NewOrderItem]) -> Decimal {
    items
        .iter()
        .map(|item| item.price * Decimal::from(item.quantity))
        .sum()
}

/// Signed payment confirmation returned by the gateway's checkout widget.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentConfirmation {
    #[serde(alias = "razorpay_order_id")]
    pub gateway_order_id: String,
    #[serde(alias = "razorpay_payment_id")]
    pub gateway_payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
}

/// Raw checkout request body.
///
/// Clients may send display fields such as `price` or `name` on each line;
/// they are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub items: Vec<CheckoutLineRequest>,
    /// Total the client displayed; rejected if it no longer matches.
    pub expected_total: Option<Decimal>,
    pub payment: Option<PaymentConfirmation>,
}

/// Raw checkout line.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Validated checkout input.
#[derive(Debug, Clone)]
pub struct Checkout {
    /// Optional for signed-in customers whose account supplies it.
    pub customer_name: Option<String>,
    pub customer_email: Option<Email>,
    pub customer_phone: Phone,
    pub address: String,
    /// One entry per product, quantities of repeated lines merged.
    pub lines: Vec<CheckoutLine>,
    pub expected_total: Option<Decimal>,
    pub payment: Option<PaymentConfirmation>,
}

/// A validated checkout line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

impl CheckoutRequest {
    /// Validate the request into a [`Checkout`].
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Validation` for an empty cart, a non-positive
    /// quantity, a missing address or phone, a malformed email, or an
    /// incomplete payment confirmation.
    pub fn validate(self) -> Result<Checkout, CommerceError> {
        if self.items.is_empty() {
            return Err(CommerceError::Validation("cart is empty".into()));
        }

        let mut lines: Vec<CheckoutLine> = Vec::with_capacity(self.items.len());
        for item in self.items {
            if item.quantity <= 0 {
                return Err(CommerceError::Validation(format!(
                    "quantity for product {} must be positive",
                    item.product_id
                )));
            }
            let quantity = i32::try_from(item.quantity).map_err(|_| {
                CommerceError::Validation(format!(
                    "quantity for product {} is too large",
                    item.product_id
                ))
            })?;

            if let Some(existing) = lines.iter_mut().find(|l| l.product_id == item.product_id) {
                existing.quantity = existing.quantity.checked_add(quantity).ok_or_else(|| {
                    CommerceError::Validation(format!(
                        "quantity for product {} is too large",
                        item.product_id
                    ))
                })?;
            } else {
                lines.push(CheckoutLine {
                    product_id: item.product_id,
                    quantity,
                });
            }
        }

        let address = non_blank(self.address)
            .ok_or_else(|| CommerceError::Validation("delivery address is required".into()))?;
        let phone = non_blank(self.customer_phone)
            .ok_or_else(|| CommerceError::Validation("phone number is required".into()))?;
        let customer_phone =
            Phone::parse(&phone).map_err(|e| CommerceError::Validation(e.to_string()))?;
        let customer_email = non_blank(self.customer_email)
            .map(|e| Email::parse(&e))
            .transpose()
            .map_err(|e| CommerceError::Validation(e.to_string()))?;

        if let Some(payment) = &self.payment
            && (payment.gateway_order_id.trim().is_empty()
                || payment.gateway_payment_id.trim().is_empty()
                || payment.signature.trim().is_empty())
        {
            return Err(CommerceError::Validation(
                "payment confirmation is incomplete".into(),
            ));
        }

        Ok(Checkout {
            customer_name: non_blank(self.customer_name),
            customer_email,
            customer_phone,
            address,
            lines,
            expected_total: self.expected_total,
            payment: self.payment,
        })
    }
}

/// Admin edit of an order's delivery details.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactUpdateRequest {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub address: Option<String>,
}

/// Validated delivery-detail edit. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactUpdate {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub address: Option<String>,
}

impl ContactUpdateRequest {
    /// Validate the edit.
    ///
    /// # Errors
    ///
    /// Returns `CommerceError::Validation` if a supplied field is blank, the
    /// phone number is malformed, or nothing would change.
    pub fn validate(self) -> Result<ContactUpdate, CommerceError> {
        let customer_name = self
            .customer_name
            .map(|n| required_field(&n, "customer name"))
            .transpose()?;
        let customer_phone = self
            .customer_phone
            .map(|p| {
                Phone::parse(&p)
                    .map(String::from)
                    .map_err(|e| CommerceError::Validation(e.to_string()))
            })
            .transpose()?;
        let address = self
            .address
            .map(|a| required_field(&a, "address"))
            .transpose()?;

        let update = ContactUpdate {
            customer_name,
            customer_phone,
            address,
        };
        if update == ContactUpdate::default() {
            return Err(CommerceError::Validation("nothing to update".into()));
        }
        Ok(update)
    }
}

/// Admin status change body.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: OrderStatus,
}

/// Public view of an order for tracking by id. Contact details are omitted.
#[derive(Debug, Clone, Serialize)]
pub struct OrderTracking {
    pub id: OrderId,
    pub status: OrderStatus,
    pub payment_verified: bool,
    pub total: Decimal,
    pub items: Vec<TrackedItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line of an [`OrderTracking`] view.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedItem {
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
}

impl From<Order> for OrderTracking {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            status: order.status,
            payment_verified: order.payment.payment_verified,
            total: order.total,
            items: order
                .items
                .into_iter()
                .map(|i| TrackedItem {
                    product_name: i.product_name,
                    quantity: i.quantity,
                    price: i.price,
                })
                .collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn required_field(value: &str, field: &str) -> Result<String, CommerceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CommerceError::Validation(format!("{field} cannot be blank")));
    }
    Ok(value.to_owned())
}
