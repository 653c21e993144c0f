//! Public catalog reads.
//!
//! Caches products and collections using `moka` (5-minute TTL). Only active
//! products are ever returned from here. Search results are not cached.
//! Admin writes call [`CatalogCache::invalidate_all`].

use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, instrument};

use bangle_core::{Handle, ProductStatus};

use crate::db::products::ProductFilter;
use crate::db::{CollectionRepository, Page, Pagination, ProductRepository, RepositoryError};
use crate::models::{Collection, Product};

const CACHE_TTL: Duration = Duration::from_secs(300);
const CACHE_CAPACITY: u64 = 1000;

/// A collection together with a page of its active products.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionWithProducts {
    #[serde(flatten)]
    pub collection: Collection,
    pub products: Page<Product>,
}

#[derive(Clone)]
enum CacheValue {
    Product(Box<Product>),
    Products(Page<Product>),
    Collection(Box<CollectionWithProducts>),
    Collections(Vec<Collection>),
}

/// Shared cache of public catalog responses.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<String, CacheValue>,
}

impl CatalogCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(CACHE_CAPACITY)
                .time_to_live(CACHE_TTL)
                .build(),
        }
    }

    /// Drop every cached entry.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only catalog queries for the storefront.
pub struct CatalogService<'a> {
    pool: &'a PgPool,
    cache: &'a CatalogCache,
}

impl<'a> CatalogService<'a> {
    /// Create a catalog service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, cache: &'a CatalogCache) -> Self {
        Self { pool, cache }
    }

    /// List active products, optionally within a collection or matching a search.
    ///
    /// An unknown collection handle yields an empty page.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    #[instrument(skip(self))]
    pub async fn products(
        &self,
        collection: Option<&Handle>,
        query: Option<&str>,
        pagination: Pagination,
    ) -> Result<Page<Product>, RepositoryError> {
        let cache_key = format!(
            "products:{}:{}:{}",
            collection.map_or("", Handle::as_str),
            pagination.limit,
            pagination.offset
        );

        if query.is_none()
            && let Some(CacheValue::Products(page)) = self.cache.cache.get(&cache_key).await
        {
            debug!("Cache hit for products");
            return Ok(page);
        }

        let collection_id = match collection {
            Some(handle) => {
                match CollectionRepository::new(self.pool)
                    .get_by_handle(handle)
                    .await?
                {
                    Some(c) => Some(c.id),
                    None => return Ok(pagination.page(Vec::new(), 0)),
                }
            }
            None => None,
        };

        let filter = ProductFilter::storefront(collection_id, query.map(str::to_owned));
        let page = ProductRepository::new(self.pool)
            .list(&filter, pagination)
            .await?;

        if query.is_none() {
            self.cache
                .cache
                .insert(cache_key, CacheValue::Products(page.clone()))
                .await;
        }

        Ok(page)
    }

    /// Get an active product by handle.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn product(&self, handle: &Handle) -> Result<Option<Product>, RepositoryError> {
        let cache_key = format!("product:{handle}");

        if let Some(CacheValue::Product(product)) = self.cache.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(Some(*product));
        }

        let product = ProductRepository::new(self.pool)
            .get_by_handle(handle)
            .await?
            .filter(|p| p.status == ProductStatus::Active);

        if let Some(product) = &product {
            self.cache
                .cache
                .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
                .await;
        }

        Ok(product)
    }

    /// List all collections.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails.
    #[instrument(skip(self))]
    pub async fn collections(&self) -> Result<Vec<Collection>, RepositoryError> {
        let cache_key = "collections".to_owned();

        if let Some(CacheValue::Collections(collections)) = self.cache.cache.get(&cache_key).await
        {
            debug!("Cache hit for collections");
            return Ok(collections);
        }

        let collections = CollectionRepository::new(self.pool).list_all().await?;

        self.cache
            .cache
            .insert(cache_key, CacheValue::Collections(collections.clone()))
            .await;

        Ok(collections)
    }

    /// Get a collection by handle with a page of its active products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if a query fails.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn collection(
        &self,
        handle: &Handle,
        pagination: Pagination,
    ) -> Result<Option<CollectionWithProducts>, RepositoryError> {
        let cache_key = format!(
            "collection:{handle}:{}:{}",
            pagination.limit, pagination.offset
        );

        if let Some(CacheValue::Collection(found)) = self.cache.cache.get(&cache_key).await {
            debug!("Cache hit for collection");
            return Ok(Some(*found));
        }

        let Some(collection) = CollectionRepository::new(self.pool)
            .get_by_handle(handle)
            .await?
        else {
            return Ok(None);
        };

        let filter = ProductFilter::storefront(Some(collection.id), None);
        let products = ProductRepository::new(self.pool)
            .list(&filter, pagination)
            .await?;

        let found = CollectionWithProducts {
            collection,
            products,
        };

        self.cache
            .cache
            .insert(cache_key, CacheValue::Collection(Box::new(found.clone())))
            .await;

        Ok(Some(found))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use bangle_core::CollectionId;

    use super::*;

    #[tokio::test]
    async fn test_invalidate_all_empties_cache() {
        let cache = CatalogCache::new();
        let collection = Collection {
            id: CollectionId::new(1),
            handle: Handle::parse("cuffs").unwrap(),
            name: "Cuffs".to_owned(),
            description: String::new(),
            image: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        cache
            .cache
            .insert(
                "collections".to_owned(),
                CacheValue::Collections(vec![collection]),
            )
            .await;
        assert!(cache.cache.get("collections").await.is_some());

        cache.invalidate_all().await;

        assert!(cache.cache.get("collections").await.is_none());
    }
}
