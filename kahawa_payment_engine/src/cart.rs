//! Server-side cart pricing.
//!
//! Clients submit product ids and quantities. Prices always come from the catalog; a client-declared total is only
//! ever used as a cross-check. This is what makes order totals trustworthy downstream: by the time an order row
//! exists, its `total_price` was computed here from catalog prices.
use std::collections::HashMap;

use kps_common::Cents;
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::NewOrderItem,
    traits::{CatalogReader, PaymentGatewayError},
};

/// One line of a client-submitted cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartEntry {
    pub product_id: String,
    pub quantity: i64,
}

/// A cart priced against the catalog.
#[derive(Debug, Clone)]
pub struct PricedCart {
    pub items: Vec<NewOrderItem>,
    pub total: Cents,
}

/// Prices the cart against the catalog and cross-checks the client-declared total, if any.
///
/// * Quantities are clamped to a minimum of 1.
/// * Every product id must exist in the catalog, otherwise [`PaymentGatewayError::ItemNotFound`].
/// * A declared total that differs from the computed total by more than one cent is rejected with
///   [`PaymentGatewayError::TotalMismatch`]. The computed total is authoritative either way.
pub async fn price_cart<C: CatalogReader>(
    catalog: &C,
    entries: &[CartEntry],
    declared_total: Option<Cents>,
) -> Result<PricedCart, PaymentGatewayError> {
    if entries.is_empty() {
        return Err(PaymentGatewayError::EmptyCart);
    }
    let mut ids = entries.iter().map(|e| e.product_id.clone()).collect::<Vec<_>>();
    ids.sort();
    ids.dedup();
    let products = catalog.fetch_products(&ids).await?;
    let by_id = products.into_iter().map(|p| (p.id.clone(), p)).collect::<HashMap<_, _>>();
    let mut items = Vec::with_capacity(entries.len());
    let mut total = Cents::from(0);
    for entry in entries {
        let product = by_id
            .get(&entry.product_id)
            .ok_or_else(|| PaymentGatewayError::ItemNotFound(entry.product_id.clone()))?;
        let quantity = entry.quantity.max(1);
        total = total + product.price * quantity;
        items.push(NewOrderItem {
            product_id: product.id.clone(),
            name: product.name.clone(),
            quantity,
            price: product.price,
        });
    }
    if total <= Cents::from(0) {
        return Err(PaymentGatewayError::InvalidTotal);
    }
    if let Some(declared) = declared_total {
        if !total.within_one_cent(declared) {
            warn!("🛒️ Cart total mismatch. Client declared {declared}, catalog says {total}");
            return Err(PaymentGatewayError::TotalMismatch {
                declared: declared.to_string(),
                computed: total.to_string(),
            });
        }
    }
    Ok(PricedCart { items, total })
}
