//! Stock ledger.
//!
//! Stock only moves inside order transactions: reserved when an order is
//! placed or reopened, credited back when it is cancelled. Product rows are
//! locked before they are checked so concurrent checkouts over the same
//! product serialize.

use std::collections::{BTreeMap, HashMap};

use apothecary_core::ProductId;

use super::CommerceError;
use crate::db::{RepositoryError, Transaction};
use crate::models::{OrderItem, Product};

/// Check that `product` can cover `requested` units.
///
/// # Errors
///
/// Returns `CommerceError::Stock` if the product is out of stock or holds
/// fewer than `requested` units.
pub fn ensure_available(product: &Product, requested: i32) -> Result<(), CommerceError> {
    if product.stock <= 0 || requested > product.stock {
        return Err(CommerceError::Stock {
            product: product.name.clone(),
            available: product.stock.max(0),
            requested,
        });
    }
    Ok(())
}

/// Sum quantities per product, in id order.
fn merge(lines: impl IntoIterator<Item = (ProductId, i32)>) -> Result<BTreeMap<ProductId, i32>, CommerceError> {
    let mut merged: BTreeMap<ProductId, i32> = BTreeMap::new();
    for (id, quantity) in lines {
        let total = merged.entry(id).or_insert(0);
        *total = total
            .checked_add(quantity)
            .ok_or_else(|| CommerceError::Validation(format!("quantity for product {id} is too large")))?;
    }
    Ok(merged)
}

/// Lock, validate and decrement stock for every line.
///
/// Nothing is written unless every line can be covered. Returns the locked
/// products as they were before the decrement.
///
/// # Errors
///
/// Returns `CommerceError::Validation` for a product that no longer exists
/// and `CommerceError::Stock` for one that cannot cover its quantity.
pub async fn reserve<T: Transaction>(
    tx: &mut T,
    lines: impl IntoIterator<Item = (ProductId, i32)>,
) -> Result<HashMap<ProductId, Product>, CommerceError> {
    let merged = merge(lines)?;
    let ids: Vec<ProductId> = merged.keys().copied().collect();
    let products: HashMap<ProductId, Product> = tx
        .lock_products(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    for (id, quantity) in &merged {
        let product = products.get(id).ok_or_else(|| {
            CommerceError::Validation(format!("product {id} is no longer available"))
        })?;
        ensure_available(product, *quantity)?;
    }

    for (id, quantity) in &merged {
        tx.adjust_stock(*id, -quantity).await.map_err(|e| match e {
            // Lost a race despite the lock; report it like any shortfall.
            RepositoryError::Conflict(_) => CommerceError::Stock {
                product: products.get(id).map_or_else(|| id.to_string(), |p| p.name.clone()),
                available: 0,
                requested: *quantity,
            },
            other => other.into(),
        })?;
    }

    Ok(products)
}

/// Credit stock back for every item that still references a product.
///
/// Items whose product has since been deleted are skipped.
///
/// # Errors
///
/// Returns `CommerceError::Repository` if a write fails.
pub async fn release<T: Transaction>(tx: &mut T, items: &[OrderItem]) -> Result<(), CommerceError> {
    let merged = merge(
        items
            .iter()
            .filter_map(|item| item.product_id.map(|id| (id, item.quantity))),
    )?;
    let ids: Vec<ProductId> = merged.keys().copied().collect();
    let live: Vec<ProductId> = tx.lock_products(&ids).await?.into_iter().map(|p| p.id).collect();

    for (id, quantity) in merged {
        if live.contains(&id) {
            tx.adjust_stock(id, quantity).await?;
        }
    }
    Ok(())
}
