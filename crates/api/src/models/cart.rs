//! Cart display types.

use serde::Serialize;

use bangle_core::{CurrencyCode, Handle, Price, ProductId, ProductStatus};

/// A cart line joined with the product data needed to display it.
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub handle: Handle,
    pub name: String,
    pub unit_price: Price,
    pub quantity: u32,
    pub line_total: Price,
    pub image_url: Option<String>,
    /// Stock left for the product; the storefront warns when it drops below
    /// the quantity held.
    pub stock: i32,
    #[serde(skip)]
    pub status: ProductStatus,
}

/// A customer's cart with totals.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub item_count: u32,
    pub subtotal: Price,
}

impl CartView {
    /// Build a cart view, computing the item count and subtotal.
    #[must_use]
    pub fn new(items: Vec<CartItem>) -> Self {
        let currency = items
            .first()
            .map_or_else(CurrencyCode::default, |i| i.unit_price.currency_code);
        let subtotal = items
            .iter()
            .fold(Price::zero(currency), |acc, item| acc.plus(&item.line_total));
        let item_count = items.iter().map(|i| i.quantity).sum();

        Self {
            items,
            item_count,
            subtotal,
        }
    }

    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}
