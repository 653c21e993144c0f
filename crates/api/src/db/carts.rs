//! Cart repository for database operations.
//!
//! A cart is the set of `cart_item` rows for one customer. The composite
//! primary key `(customer_id, product_id)` guarantees one line per product.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use bangle_core::cart::CartLine;
use bangle_core::{CurrencyCode, CustomerId, Handle, Price, ProductId, ProductStatus};

use super::RepositoryError;
use crate::models::CartItem;

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    product_id: i32,
    quantity: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        Self::new(
            ProductId::new(row.product_id),
            u32::try_from(row.quantity).unwrap_or(0),
        )
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    product_id: i32,
    quantity: i32,
    handle: String,
    name: String,
    price: Decimal,
    stock: i32,
    status: ProductStatus,
    image_url: Option<String>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        let handle = Handle::parse(&row.handle).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid handle in database: {e}"))
        })?;
        let unit_price = Price::new(row.price, CurrencyCode::default()).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price in database: {e}"))
        })?;
        let quantity = u32::try_from(row.quantity).map_err(|_| {
            RepositoryError::DataCorruption(format!("invalid cart quantity {}", row.quantity))
        })?;

        Ok(Self {
            product_id: ProductId::new(row.product_id),
            handle,
            name: row.name,
            unit_price,
            quantity,
            line_total: unit_price.line_total(quantity),
            image_url: row.image_url,
            stock: row.stock,
            status: row.status,
        })
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Cart lines in the order they were first added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, customer: CustomerId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            "SELECT product_id, quantity FROM cart_item \
             WHERE customer_id = $1 ORDER BY added_at, product_id",
        )
        .bind(customer)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(CartLine::from).collect())
    }

    /// Cart lines joined with product details and the product's featured image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, customer: CustomerId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(
            "SELECT c.product_id, c.quantity, \
                    p.handle, p.name, p.price, p.stock, p.status, \
                    (SELECT i.url FROM product_image i \
                      WHERE i.product_id = p.id ORDER BY i.position LIMIT 1) AS image_url \
             FROM cart_item c \
             JOIN product p ON p.id = c.product_id \
             WHERE c.customer_id = $1 \
             ORDER BY c.added_at, c.product_id",
        )
        .bind(customer)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Set one line from the current cart under the customer lock.
    ///
    /// `decide` sees the current lines and returns the line's new quantity.
    /// Concurrent edits for the same customer apply one after the other, so
    /// the quantity never comes from a stale read.
    ///
    /// # Errors
    ///
    /// Returns the error from `decide` unchanged. Returns
    /// `RepositoryError::NotFound` if the customer does not exist and
    /// `RepositoryError::Conflict` if the product does not exist.
    pub async fn update_line<F, E>(
        &self,
        customer: CustomerId,
        product: ProductId,
        decide: F,
    ) -> Result<(), E>
    where
        F: FnOnce(&[CartLine]) -> Result<u32, E> + Send,
        E: From<RepositoryError>,
    {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let current = lock_lines(&mut tx, customer).await?;
        let quantity = decide(&current)?;
        write_line(&mut tx, customer, CartLine::new(product, quantity)).await?;

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product was not in the cart.
    pub async fn remove(
        &self,
        customer: CustomerId,
        product: ProductId,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("DELETE FROM cart_item WHERE customer_id = $1 AND product_id = $2")
                .bind(customer)
                .bind(product)
                .execute(self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, customer: CustomerId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_item WHERE customer_id = $1")
            .bind(customer)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Rewrite the cart from its current lines in one transaction.
    ///
    /// The customer row is locked while `rewrite` runs, so concurrent merges
    /// for the same customer apply one after the other. Lines kept by
    /// `rewrite` keep their original `added_at`; new lines are appended.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the customer does not exist.
    /// Returns `RepositoryError::Conflict` if a line references a missing product.
    pub async fn rewrite<F>(&self, customer: CustomerId, rewrite: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&[CartLine]) -> Vec<CartLine> + Send,
    {
        let mut tx = self.pool.begin().await?;

        let current = lock_lines(&mut tx, customer).await?;

        let next = rewrite(&current);
        let keep: Vec<i32> = next.iter().map(|l| l.product_id.as_i32()).collect();

        sqlx::query("DELETE FROM cart_item WHERE customer_id = $1 AND NOT (product_id = ANY($2))")
            .bind(customer)
            .bind(&keep)
            .execute(&mut *tx)
            .await?;

        for line in &next {
            write_line(&mut tx, customer, *line).await?;
        }

        tx.commit().await?;

        Ok(())
    }
}

/// Lock the customer row and read their cart lines.
async fn lock_lines(
    tx: &mut PgConnection,
    customer: CustomerId,
) -> Result<Vec<CartLine>, RepositoryError> {
    sqlx::query_scalar::<_, i32>("SELECT id FROM customer WHERE id = $1 FOR UPDATE")
        .bind(customer)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

    let rows = sqlx::query_as::<_, CartLineRow>(
        "SELECT product_id, quantity FROM cart_item \
         WHERE customer_id = $1 ORDER BY added_at, product_id",
    )
    .bind(customer)
    .fetch_all(&mut *tx)
    .await?;

    Ok(rows.into_iter().map(CartLine::from).collect())
}

/// Insert or update one line. The customer row must already be locked.
async fn write_line(
    tx: &mut PgConnection,
    customer: CustomerId,
    line: CartLine,
) -> Result<(), RepositoryError> {
    let quantity = i32::try_from(line.quantity)
        .map_err(|_| RepositoryError::Conflict("quantity out of range".to_owned()))?;

    sqlx::query(
        "INSERT INTO cart_item (customer_id, product_id, quantity, added_at) \
         VALUES ($1, $2, $3, clock_timestamp()) \
         ON CONFLICT (customer_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity",
    )
    .bind(customer)
    .bind(line.product_id)
    .bind(quantity)
    .execute(&mut *tx)
    .await
    .map_err(|e| RepositoryError::from_write(e, "product no longer exists"))?;

    Ok(())
}
