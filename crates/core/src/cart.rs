//! Cart line rules shared by the API and its clients.
//!
//! A cart holds at most one line per product, and every line carries a
//! quantity in `1..=MAX_LINE_QUANTITY`. Guests keep their cart in the browser;
//! on login that guest cart is folded into the customer's stored cart with
//! [`merge_lines`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ProductId;

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 10;

/// Largest number of distinct products a cart may hold.
pub const MAX_CART_LINES: usize = 50;

/// Most lines a guest cart may send for merging. A guest cart obeys the same
/// one-line-per-product limit as a stored cart.
pub const MAX_GUEST_CART_LINES: usize = MAX_CART_LINES;

/// One product and how many of it the customer wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartLine {
    /// Create a new cart line.
    #[must_use]
    pub const fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Clamp a requested quantity to what a line may hold and what is in stock.
///
/// Returns `None` when nothing can be held (zero requested or zero stock).
#[must_use]
pub fn clamp_quantity(requested: u32, stock: u32) -> Option<u32> {
    let quantity = requested.min(MAX_LINE_QUANTITY).min(stock);
    (quantity > 0).then_some(quantity)
}

/// Merge a guest cart into a customer's stored cart.
///
/// Lines for the same product are combined by summing their quantities,
/// capped at [`MAX_LINE_QUANTITY`]. Guest lines with a zero quantity are
/// ignored. The stored lines keep their order; products only the guest had
/// are appended in the order the guest first added them.
///
/// ```
/// use bangle_core::ProductId;
/// use bangle_core::cart::{CartLine, merge_lines};
///
/// let stored = [CartLine::new(ProductId::new(1), 2)];
/// let guest = [
///     CartLine::new(ProductId::new(2), 1),
///     CartLine::new(ProductId::new(1), 3),
/// ];
///
/// let merged = merge_lines(&stored, &guest);
/// assert_eq!(
///     merged,
///     vec![
///         CartLine::new(ProductId::new(1), 5),
///         CartLine::new(ProductId::new(2), 1),
///     ]
/// );
/// ```
#[must_use]
pub fn merge_lines(stored: &[CartLine], guest: &[CartLine]) -> Vec<CartLine> {
    let mut merged: Vec<CartLine> = Vec::with_capacity(stored.len() + guest.len());
    let mut index: HashMap<ProductId, usize> = HashMap::new();

    let incoming = stored
        .iter()
        .chain(guest.iter().filter(|line| line.quantity > 0));

    for line in incoming {
        if let Some(&pos) = index.get(&line.product_id) {
            if let Some(existing) = merged.get_mut(pos) {
                existing.quantity = existing
                    .quantity
                    .saturating_add(line.quantity)
                    .min(MAX_LINE_QUANTITY);
            }
        } else {
            index.insert(line.product_id, merged.len());
            merged.push(CartLine::new(
                line.product_id,
                line.quantity.min(MAX_LINE_QUANTITY),
            ));
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: i32, quantity: u32) -> CartLine {
        CartLine::new(ProductId::new(product), quantity)
    }

    #[test]
    fn test_merge_into_empty_cart_keeps_guest_order() {
        let merged = merge_lines(&[], &[line(3, 1), line(1, 2)]);
        assert_eq!(merged, vec![line(3, 1), line(1, 2)]);
    }

    #[test]
    fn test_merge_empty_guest_cart_is_identity() {
        let stored = [line(1, 1), line(2, 4)];
        assert_eq!(merge_lines(&stored, &[]), stored.to_vec());
    }

    #[test]
    fn test_merge_never_duplicates_products() {
        let merged = merge_lines(&[line(1, 1)], &[line(1, 1), line(2, 1), line(2, 2)]);
        assert_eq!(merged, vec![line(1, 2), line(2, 3)]);
    }

    #[test]
    fn test_merge_caps_quantity() {
        let merged = merge_lines(&[line(1, 8)], &[line(1, 5), line(2, 40)]);
        assert_eq!(
            merged,
            vec![line(1, MAX_LINE_QUANTITY), line(2, MAX_LINE_QUANTITY)]
        );
    }

    #[test]
    fn test_merge_ignores_zero_quantity_guest_lines() {
        let merged = merge_lines(&[line(1, 1)], &[line(2, 0), line(1, 0)]);
        assert_eq!(merged, vec![line(1, 1)]);
    }

    #[test]
    fn test_clamp_quantity() {
        assert_eq!(clamp_quantity(3, 10), Some(3));
        assert_eq!(clamp_quantity(30, 100), Some(MAX_LINE_QUANTITY));
        assert_eq!(clamp_quantity(5, 2), Some(2));
        assert_eq!(clamp_quantity(0, 10), None);
        assert_eq!(clamp_quantity(4, 0), None);
    }
}
