//! Product repository for database operations.
//!
//! Products and their image galleries are always read together; every write
//! that touches more than one row runs inside a transaction.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use bangle_core::{
    CollectionId, CurrencyCode, Handle, Price, ProductId, ProductImageId, ProductStatus,
};

use super::{Page, Pagination, RepositoryError, like_pattern};
use crate::models::{Image, Product, ProductImage};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    handle: String,
    name: String,
    description: String,
    price: Decimal,
    stock: i32,
    status: ProductStatus,
    collection_id: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self, images: Vec<ProductImage>) -> Result<Product, RepositoryError> {
        let handle = Handle::parse(&self.handle).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid handle in database: {e}"))
        })?;
        let price = Price::new(self.price, CurrencyCode::default()).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid price in database: {e}"))
        })?;

        Ok(Product {
            id: ProductId::new(self.id),
            handle,
            name: self.name,
            description: self.description,
            price,
            stock: self.stock,
            status: self.status,
            collection_id: self.collection_id.map(CollectionId::new),
            images,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    id: i32,
    product_id: i32,
    url: String,
    public_id: String,
    position: i32,
}

impl From<ImageRow> for ProductImage {
    fn from(row: ImageRow) -> Self {
        Self {
            id: ProductImageId::new(row.id),
            url: row.url,
            public_id: row.public_id,
            position: row.position,
        }
    }
}

const PRODUCT_COLUMNS: &str = "id, handle, name, description, price, stock, status, \
                               collection_id, created_at, updated_at";

// =============================================================================
// Inputs
// =============================================================================

/// Filters for product listings. `None` means "don't filter".
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub status: Option<ProductStatus>,
    pub collection_id: Option<CollectionId>,
    pub query: Option<String>,
}

impl ProductFilter {
    /// Filter used by the public storefront: active products only.
    #[must_use]
    pub fn storefront(collection_id: Option<CollectionId>, query: Option<String>) -> Self {
        Self {
            status: Some(ProductStatus::Active),
            collection_id,
            query,
        }
    }
}

/// Fields for a new product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub handle: Handle,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub stock: i32,
    pub status: ProductStatus,
    pub collection_id: Option<CollectionId>,
}

/// Partial product update. `None` leaves a field unchanged; for
/// `collection_id`, `Some(None)` removes the product from its collection.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub handle: Option<Handle>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Price>,
    pub stock: Option<i32>,
    pub status: Option<ProductStatus>,
    pub collection_id: Option<Option<CollectionId>>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching a filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<Page<Product>, RepositoryError> {
        let pattern = filter.query.as_deref().map(like_pattern);
        let collection_id = filter.collection_id.map(|id| id.as_i32());

        let where_clause = "WHERE ($1::product_status IS NULL OR status = $1) \
                            AND ($2::int IS NULL OR collection_id = $2) \
                            AND ($3::text IS NULL OR name ILIKE $3)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM product {where_clause}"))
            .bind(filter.status)
            .bind(collection_id)
            .bind(pattern.as_deref())
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product {where_clause} \
             ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
        ))
        .bind(filter.status)
        .bind(collection_id)
        .bind(pattern.as_deref())
        .bind(pagination.limit)
        .bind(pagination.offset)
        .fetch_all(self.pool)
        .await?;

        let products = self.attach_images(rows).await?;
        Ok(pagination.page(products, total))
    }

    /// Get a product by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_images(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Get a product by its handle.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_handle(&self, handle: &Handle) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE handle = $1"
        ))
        .bind(handle.as_str())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.attach_images(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Get several products at once, keyed by ID. Missing IDs are simply absent.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        Ok(self
            .attach_images(rows)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect())
    }

    /// Create a product together with its initial gallery.
    ///
    /// Images are stored in the given order starting at position 0.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the handle is taken or the
    /// collection does not exist.
    pub async fn create(
        &self,
        product: &NewProduct,
        images: &[Image],
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "INSERT INTO product (handle, name, description, price, stock, status, collection_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product.handle.as_str())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.amount)
        .bind(product.stock)
        .bind(product.status)
        .bind(product.collection_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            RepositoryError::from_write(e, "handle already exists or collection is missing")
        })?;

        let product_id = ProductId::new(row.id);
        let gallery = insert_images(&mut tx, product_id, 0, images).await?;

        tx.commit().await?;

        row.into_product(gallery)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if the new handle is taken or the
    /// collection does not exist.
    pub async fn update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let (set_collection, collection_id) = match update.collection_id {
            Some(collection_id) => (true, collection_id),
            None => (false, None),
        };

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "UPDATE product SET \
                 handle = COALESCE($2, handle), \
                 name = COALESCE($3, name), \
                 description = COALESCE($4, description), \
                 price = COALESCE($5, price), \
                 stock = COALESCE($6, stock), \
                 status = COALESCE($7, status), \
                 collection_id = CASE WHEN $8 THEN $9 ELSE collection_id END, \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .bind(update.handle.as_ref().map(Handle::as_str))
        .bind(update.name.as_deref())
        .bind(update.description.as_deref())
        .bind(update.price.map(|p| p.amount))
        .bind(update.stock)
        .bind(update.status)
        .bind(set_collection)
        .bind(collection_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| {
            RepositoryError::from_write(e, "handle already exists or collection is missing")
        })?
        .ok_or(RepositoryError::NotFound)?;

        let mut products = self.attach_images(vec![row]).await?;
        products.pop().ok_or(RepositoryError::NotFound)
    }

    /// Delete a product, returning its gallery so the CDN assets can be removed.
    ///
    /// Cart lines referencing the product are removed by the foreign key cascade.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<Vec<ProductImage>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let images = sqlx::query_as::<_, ImageRow>(
            "SELECT id, product_id, url, public_id, position FROM product_image \
             WHERE product_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM product WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;

        Ok(images.into_iter().map(ProductImage::from).collect())
    }

    /// Append images to the end of a product's gallery.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add_images(
        &self,
        id: ProductId,
        images: &[Image],
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        lock_product(&mut tx, id).await?;

        let next_position: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM product_image WHERE product_id = $1",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        insert_images(&mut tx, id, next_position, images).await?;
        touch_product(&mut tx, id).await?;

        tx.commit().await?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Remove one image from a gallery and close the gap in positions.
    ///
    /// Returns the removed image so its CDN asset can be deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the image does not belong to the product.
    pub async fn remove_image(
        &self,
        id: ProductId,
        image_id: ProductImageId,
    ) -> Result<ProductImage, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        lock_product(&mut tx, id).await?;

        let removed = sqlx::query_as::<_, ImageRow>(
            "DELETE FROM product_image WHERE id = $1 AND product_id = $2 \
             RETURNING id, product_id, url, public_id, position",
        )
        .bind(image_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        sqlx::query(
            "UPDATE product_image SET position = position - 1 \
             WHERE product_id = $1 AND position > $2",
        )
        .bind(id)
        .bind(removed.position)
        .execute(&mut *tx)
        .await?;

        touch_product(&mut tx, id).await?;

        tx.commit().await?;

        Ok(removed.into())
    }

    /// Reorder a gallery. `order` must list every image of the product exactly once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    /// Returns `RepositoryError::Conflict` if `order` is not a permutation of
    /// the product's images.
    pub async fn reorder_images(
        &self,
        id: ProductId,
        order: &[ProductImageId],
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        lock_product(&mut tx, id).await?;

        let existing: Vec<i32> =
            sqlx::query_scalar("SELECT id FROM product_image WHERE product_id = $1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        if !is_permutation(&existing, order) {
            return Err(RepositoryError::Conflict(
                "image order must list every image of the product exactly once".to_owned(),
            ));
        }

        for (position, image_id) in order.iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| {
                RepositoryError::Conflict("too many images to reorder".to_owned())
            })?;
            sqlx::query("UPDATE product_image SET position = $1 WHERE id = $2")
                .bind(position)
                .bind(*image_id)
                .execute(&mut *tx)
                .await?;
        }

        touch_product(&mut tx, id).await?;

        tx.commit().await?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Load galleries for a batch of product rows, preserving row order.
    async fn attach_images(&self, rows: Vec<ProductRow>) -> Result<Vec<Product>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = rows.iter().map(|r| r.id).collect();
        let image_rows = sqlx::query_as::<_, ImageRow>(
            "SELECT id, product_id, url, public_id, position FROM product_image \
             WHERE product_id = ANY($1) ORDER BY product_id, position",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut galleries: HashMap<i32, Vec<ProductImage>> = HashMap::new();
        for image in image_rows {
            galleries
                .entry(image.product_id)
                .or_default()
                .push(image.into());
        }

        rows.into_iter()
            .map(|row| {
                let images = galleries.remove(&row.id).unwrap_or_default();
                row.into_product(images)
            })
            .collect()
    }
}

/// Insert gallery rows starting at `first_position`.
async fn insert_images(
    tx: &mut Transaction<'_, Postgres>,
    product_id: ProductId,
    first_position: i32,
    images: &[Image],
) -> Result<Vec<ProductImage>, RepositoryError> {
    let mut inserted = Vec::with_capacity(images.len());
    let mut position = first_position;

    for image in images {
        let row = sqlx::query_as::<_, ImageRow>(
            "INSERT INTO product_image (product_id, url, public_id, position) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, product_id, url, public_id, position",
        )
        .bind(product_id)
        .bind(&image.url)
        .bind(&image.public_id)
        .bind(position)
        .fetch_one(&mut **tx)
        .await?;

        inserted.push(row.into());
        position += 1;
    }

    Ok(inserted)
}

/// Take a row lock on the product so concurrent gallery edits serialize.
async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    id: ProductId,
) -> Result<(), RepositoryError> {
    sqlx::query_scalar::<_, i32>("SELECT id FROM product WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .map(|_| ())
        .ok_or(RepositoryError::NotFound)
}

async fn touch_product(
    tx: &mut Transaction<'_, Postgres>,
    id: ProductId,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE product SET updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Whether `order` contains exactly the IDs in `existing`, each once.
fn is_permutation(existing: &[i32], order: &[ProductImageId]) -> bool {
    if existing.len() != order.len() {
        return false;
    }
    let expected: HashSet<i32> = existing.iter().copied().collect();
    let mut seen = HashSet::with_capacity(order.len());
    order
        .iter()
        .all(|id| expected.contains(&id.as_i32()) && seen.insert(id.as_i32()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[i32]) -> Vec<ProductImageId> {
        raw.iter().copied().map(ProductImageId::new).collect()
    }

    #[test]
    fn test_is_permutation() {
        assert!(is_permutation(&[1, 2, 3], &ids(&[3, 1, 2])));
        assert!(is_permutation(&[], &[]));
        assert!(!is_permutation(&[1, 2, 3], &ids(&[1, 2])));
        assert!(!is_permutation(&[1, 2, 3], &ids(&[1, 2, 2])));
        assert!(!is_permutation(&[1, 2], &ids(&[1, 4])));
    }

    #[test]
    fn test_storefront_filter_only_shows_active() {
        let filter = ProductFilter::storefront(Some(CollectionId::new(3)), None);
        assert_eq!(filter.status, Some(ProductStatus::Active));
        assert_eq!(filter.collection_id, Some(CollectionId::new(3)));
    }
}
