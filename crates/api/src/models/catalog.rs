//! Catalog domain types: products, their image galleries, and collections.

use chrono::{DateTime, Utc};
use serde::Serialize;

use bangle_core::{CollectionId, Handle, Price, ProductId, ProductImageId, ProductStatus};

/// An image hosted on the CDN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    /// Public delivery URL.
    pub url: String,
    /// CDN identifier, needed to delete the asset.
    #[serde(skip)]
    pub public_id: String,
}

/// One image in a product's gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductImage {
    pub id: ProductImageId,
    pub url: String,
    #[serde(skip)]
    pub public_id: String,
    /// Zero-based gallery position.
    pub position: i32,
}

impl ProductImage {
    /// The CDN asset behind this gallery entry.
    #[must_use]
    pub fn image(&self) -> Image {
        Image {
            url: self.url.clone(),
            public_id: self.public_id.clone(),
        }
    }
}

/// A bracelet (or any other item) for sale.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub handle: Handle,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub stock: i32,
    pub status: ProductStatus,
    pub collection_id: Option<CollectionId>,
    /// Gallery ordered by position.
    pub images: Vec<ProductImage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// First gallery image, used as the thumbnail.
    #[must_use]
    pub fn featured_image(&self) -> Option<&ProductImage> {
        self.images.first()
    }

    /// Units available, never negative.
    #[must_use]
    pub fn available(&self) -> u32 {
        u32::try_from(self.stock).unwrap_or(0)
    }
}

/// A named grouping of products.
#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub id: CollectionId,
    pub handle: Handle,
    pub name: String,
    pub description: String,
    pub image: Option<Image>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
