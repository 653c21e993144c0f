//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::services::catalog::CatalogCache;
use crate::services::media::{CloudinaryStore, ImageStore, MediaError};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    images: Arc<dyn ImageStore>,
    catalog: CatalogCache,
}

impl AppState {
    /// Create a new application state backed by Cloudinary.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Http` if the CDN client cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, MediaError> {
        let images = Arc::new(CloudinaryStore::new(config.cloudinary.clone())?);
        Ok(Self::with_image_store(config, pool, images))
    }

    /// Create application state with a specific image store.
    #[must_use]
    pub fn with_image_store(config: ApiConfig, pool: PgPool, images: Arc<dyn ImageStore>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                images,
                catalog: CatalogCache::new(),
            }),
        }
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get the image CDN.
    #[must_use]
    pub fn images(&self) -> &dyn ImageStore {
        self.inner.images.as_ref()
    }

    /// Get the public catalog cache.
    #[must_use]
    pub fn catalog(&self) -> &CatalogCache {
        &self.inner.catalog
    }
}
