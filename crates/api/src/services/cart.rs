//! Customer cart operations.
//!
//! Explicit edits (add, set quantity) are strict: they fail when the product
//! is not for sale or the stock cannot cover the request. Merging a guest
//! cart is lenient: lines that cannot be honoured are dropped or clamped so
//! that logging in never fails because of a stale browser cart.

use std::collections::{HashMap, HashSet};

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use bangle_core::cart::{CartLine, MAX_CART_LINES, MAX_LINE_QUANTITY, clamp_quantity, merge_lines};
use bangle_core::{CustomerId, ProductId};

use crate::db::{CartRepository, ProductRepository, RepositoryError};
use crate::models::{CartView, Product};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product does not exist, or is not in the cart.
    #[error("product not found")]
    ProductNotFound,

    /// The product exists but is not for sale.
    #[error("product is not available")]
    ProductUnavailable,

    /// Quantity outside `1..=MAX_LINE_QUANTITY`.
    #[error("quantity must be between 1 and {MAX_LINE_QUANTITY}")]
    InvalidQuantity,

    /// Not enough stock for the requested quantity.
    #[error("only {available} left in stock")]
    OutOfStock { available: u32 },

    /// The cart already holds the maximum number of products.
    #[error("cart cannot hold more than {MAX_CART_LINES} products")]
    CartFull,

    /// The signed-in customer's account was deleted.
    #[error("account no longer exists")]
    AccountNotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A missing row on a locked cart write means the customer is gone.
fn account_gone(err: CartError) -> CartError {
    match err {
        CartError::Repository(RepositoryError::NotFound) => CartError::AccountNotFound,
        other => other,
    }
}

/// Cart service for one request.
pub struct CartService<'a> {
    carts: CartRepository<'a>,
    products: ProductRepository<'a>,
}

impl<'a> CartService<'a> {
    /// Create a cart service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            carts: CartRepository::new(pool),
            products: ProductRepository::new(pool),
        }
    }

    /// The customer's cart. Lines for products no longer for sale are left
    /// out of the view and the totals.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    pub async fn view(&self, customer: CustomerId) -> Result<CartView, CartError> {
        let mut items = self.carts.items(customer).await?;
        items.retain(|item| item.status.is_purchasable());
        Ok(CartView::new(items))
    }

    /// Add units of a product, on top of any already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if the resulting line would fall
    /// outside `1..=MAX_LINE_QUANTITY`, `CartError::OutOfStock` if stock
    /// cannot cover it, and `CartError::CartFull` if a new line would exceed
    /// the line limit. The check and the write happen under the customer's
    /// cart lock.
    #[instrument(skip(self), fields(customer = %customer, product = %product_id))]
    pub async fn add(
        &self,
        customer: CustomerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView, CartError> {
        if quantity == 0 || quantity > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity);
        }

        let product = self.purchasable(product_id).await?;

        self.carts
            .update_line(customer, product_id, |lines| {
                let existing = lines
                    .iter()
                    .find(|line| line.product_id == product_id)
                    .map(|line| line.quantity);

                if existing.is_none() && lines.len() >= MAX_CART_LINES {
                    return Err(CartError::CartFull);
                }

                let total = existing.unwrap_or(0).saturating_add(quantity);
                check_quantity(total, &product)?;
                Ok(total)
            })
            .await
            .map_err(account_gone)?;

        self.view(customer).await
    }

    /// Set the quantity of a line already in the cart. Zero removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` if the product is not in the cart
    /// and `CartError::AccountNotFound` if the customer was deleted.
    #[instrument(skip(self), fields(customer = %customer, product = %product_id))]
    pub async fn set_quantity(
        &self,
        customer: CustomerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView, CartError> {
        if quantity == 0 {
            return self.remove(customer, product_id).await;
        }
        if quantity > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity);
        }

        let product = self.purchasable(product_id).await?;

        self.carts
            .update_line(customer, product_id, |lines| {
                if !lines.iter().any(|line| line.product_id == product_id) {
                    return Err(CartError::ProductNotFound);
                }
                check_quantity(quantity, &product)?;
                Ok(quantity)
            })
            .await
            .map_err(account_gone)?;

        self.view(customer).await
    }

    /// Remove a product from the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ProductNotFound` if the product is not in the cart.
    pub async fn remove(
        &self,
        customer: CustomerId,
        product_id: ProductId,
    ) -> Result<CartView, CartError> {
        self.carts
            .remove(customer, product_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CartError::ProductNotFound,
                other => CartError::Repository(other),
            })?;

        self.view(customer).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn clear(&self, customer: CustomerId) -> Result<CartView, CartError> {
        self.carts.clear(customer).await?;
        Ok(CartView::empty())
    }

    /// Fold a guest cart into the customer's stored cart.
    ///
    /// Quantities for the same product are summed (see [`merge_lines`]),
    /// then every line is checked against the catalog: products that are
    /// gone or not for sale are dropped and quantities are clamped to stock.
    ///
    /// # Errors
    ///
    /// Returns `CartError::AccountNotFound` if the customer was deleted and
    /// `CartError::Repository` if a query fails.
    #[instrument(skip(self, guest), fields(customer = %customer, guest_lines = guest.len()))]
    pub async fn merge(
        &self,
        customer: CustomerId,
        guest: &[CartLine],
    ) -> Result<CartView, CartError> {
        if guest.iter().all(|line| line.quantity == 0) {
            return self.view(customer).await;
        }

        let stored = self.carts.lines(customer).await?;
        let ids: Vec<ProductId> = stored
            .iter()
            .chain(guest)
            .map(|line| line.product_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let products = self.products.get_many(&ids).await?;

        self.carts
            .rewrite(customer, |current| {
                reconcile(current, merge_lines(current, guest), &products)
            })
            .await
            .map_err(|e| account_gone(e.into()))?;

        tracing::info!("Merged guest cart");

        self.view(customer).await
    }

    async fn purchasable(&self, product_id: ProductId) -> Result<Product, CartError> {
        let product = self
            .products
            .get_by_id(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;

        if !product.status.is_purchasable() {
            return Err(CartError::ProductUnavailable);
        }

        Ok(product)
    }
}

fn check_quantity(quantity: u32, product: &Product) -> Result<(), CartError> {
    if quantity > MAX_LINE_QUANTITY {
        return Err(CartError::InvalidQuantity);
    }
    let available = product.available();
    if quantity > available {
        return Err(CartError::OutOfStock { available });
    }
    Ok(())
}

/// Check merged lines against the catalog.
///
/// Lines for products missing from `products` were added to the stored cart
/// after the catalog was read; those are kept as stored. Everything else must
/// be for sale and is clamped to stock.
fn reconcile(
    current: &[CartLine],
    merged: Vec<CartLine>,
    products: &HashMap<ProductId, Product>,
) -> Vec<CartLine> {
    let stored: HashMap<ProductId, u32> = current
        .iter()
        .map(|line| (line.product_id, line.quantity))
        .collect();

    merged
        .into_iter()
        .filter_map(|line| match products.get(&line.product_id) {
            Some(product) if product.status.is_purchasable() => {
                clamp_quantity(line.quantity, product.available())
                    .map(|quantity| CartLine::new(line.product_id, quantity))
            }
            Some(_) => None,
            None => stored
                .get(&line.product_id)
                .map(|&quantity| CartLine::new(line.product_id, quantity)),
        })
        .take(MAX_CART_LINES)
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use bangle_core::{Handle, Price, ProductStatus};

    use super::*;

    fn product(id: i32, stock: i32, status: ProductStatus) -> Product {
        Product {
            id: ProductId::new(id),
            handle: Handle::parse(&format!("bangle-{id}")).unwrap(),
            name: format!("Bangle {id}"),
            description: String::new(),
            price: Price::parse("19.99").unwrap(),
            stock,
            status,
            collection_id: None,
            images: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn catalog(products: Vec<Product>) -> HashMap<ProductId, Product> {
        products.into_iter().map(|p| (p.id, p)).collect()
    }

    fn line(product: i32, quantity: u32) -> CartLine {
        CartLine::new(ProductId::new(product), quantity)
    }

    #[test]
    fn test_reconcile_drops_unavailable_products() {
        let products = catalog(vec![
            product(1, 5, ProductStatus::Active),
            product(2, 5, ProductStatus::Draft),
            product(3, 5, ProductStatus::Archived),
        ]);

        let result = reconcile(
            &[],
            vec![line(1, 1), line(2, 1), line(3, 1), line(4, 1)],
            &products,
        );

        assert_eq!(result, vec![line(1, 1)]);
    }

    #[test]
    fn test_reconcile_clamps_to_stock() {
        let products = catalog(vec![
            product(1, 3, ProductStatus::Active),
            product(2, 0, ProductStatus::Active),
        ]);

        let result = reconcile(&[], vec![line(1, 8), line(2, 1)], &products);

        assert_eq!(result, vec![line(1, 3)]);
    }

    #[test]
    fn test_reconcile_keeps_lines_added_concurrently() {
        let products = catalog(vec![product(1, 10, ProductStatus::Active)]);
        let current = [line(9, 2)];

        let merged = merge_lines(&current, &[line(1, 2)]);
        let result = reconcile(&current, merged, &products);

        assert_eq!(result, vec![line(9, 2), line(1, 2)]);
    }

    #[test]
    fn test_reconcile_respects_line_limit() {
        let products = catalog(
            (1..=60)
                .map(|id| product(id, 5, ProductStatus::Active))
                .collect(),
        );
        let merged = (1..=60).map(|id| line(id, 1)).collect();

        assert_eq!(reconcile(&[], merged, &products).len(), MAX_CART_LINES);
    }

    #[test]
    fn test_check_quantity() {
        let p = product(1, 4, ProductStatus::Active);
        assert!(check_quantity(4, &p).is_ok());
        assert!(matches!(
            check_quantity(5, &p),
            Err(CartError::OutOfStock { available: 4 })
        ));
        let plenty = product(2, 100, ProductStatus::Active);
        assert!(matches!(
            check_quantity(MAX_LINE_QUANTITY + 1, &plenty),
            Err(CartError::InvalidQuantity)
        ));
    }

    #[test]
    fn test_missing_customer_row_is_a_gone_account() {
        assert!(matches!(
            account_gone(RepositoryError::NotFound.into()),
            CartError::AccountNotFound
        ));
        assert!(matches!(
            account_gone(CartError::ProductNotFound),
            CartError::ProductNotFound
        ));
        assert!(matches!(
            account_gone(RepositoryError::Conflict("product no longer exists".into()).into()),
            CartError::Repository(RepositoryError::Conflict(_))
        ));
    }

    #[test]
    fn test_negative_stock_reads_as_sold_out() {
        let p = product(1, -3, ProductStatus::Active);
        assert!(matches!(
            check_quantity(1, &p),
            Err(CartError::OutOfStock { available: 0 })
        ));
    }
}
