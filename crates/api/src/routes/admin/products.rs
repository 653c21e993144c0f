//! Admin product management.
//!
//! Image uploads go to the CDN before the database write. If the write
//! fails, the fresh uploads are deleted again so no orphaned assets are left.

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use bangle_core::{
    CollectionId, CurrencyCode, Handle, Price, ProductId, ProductImageId, ProductStatus,
};

use super::{UploadForm, double_option, validate_name};
use crate::db::products::{NewProduct, ProductFilter, ProductUpdate};
use crate::db::{Page, Pagination, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAdminWriter};
use crate::models::{Image, Product};
use crate::routes::extract::{ApiJson, ApiPath, ApiQuery};
use crate::routes::search_text;
use crate::services::media::{destroy_all, upload_all};
use crate::state::AppState;

const MAX_NAME_CHARS: usize = 200;
const IMAGE_FIELD: &str = "images";

#[derive(Debug, Default, Deserialize)]
pub struct AdminProductQuery {
    pub status: Option<ProductStatus>,
    pub collection: Option<i32>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// JSON body for a partial product update.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductPatch {
    pub handle: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub status: Option<ProductStatus>,
    /// `null` removes the product from its collection.
    #[serde(default, deserialize_with = "double_option")]
    pub collection_id: Option<Option<CollectionId>>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub image_ids: Vec<ProductImageId>,
}

fn parse_handle(raw: &str) -> Result<Handle> {
    Handle::parse(raw).map_err(|e| AppError::BadRequest(format!("`handle` is invalid: {e}")))
}

fn check_stock(stock: i32) -> Result<i32> {
    if stock < 0 {
        return Err(AppError::BadRequest("`stock` cannot be negative".to_owned()));
    }
    Ok(stock)
}

/// Build a new product from the text fields of a create form.
fn new_product(form: &UploadForm) -> Result<NewProduct> {
    let name = validate_name(form.required("name")?, MAX_NAME_CHARS)?;

    let handle = match form.text("handle") {
        Some(raw) => parse_handle(raw)?,
        None => Handle::from_name(&name).map_err(|_| {
            AppError::BadRequest("cannot derive a handle from `name`, supply `handle`".to_owned())
        })?,
    };

    let price = Price::parse(form.required("price")?)
        .map_err(|e| AppError::BadRequest(format!("`price` is invalid: {e}")))?;

    Ok(NewProduct {
        handle,
        name,
        description: form.text("description").unwrap_or_default().to_owned(),
        price,
        stock: check_stock(form.parsed("stock")?.unwrap_or(0))?,
        status: form.parsed("status")?.unwrap_or_default(),
        collection_id: form.parsed::<i32>("collection_id")?.map(CollectionId::new),
    })
}

impl ProductPatch {
    fn into_update(self) -> Result<ProductUpdate> {
        let price = self
            .price
            .map(|amount| Price::new(amount, CurrencyCode::default()))
            .transpose()
            .map_err(|e| AppError::BadRequest(format!("`price` is invalid: {e}")))?;

        Ok(ProductUpdate {
            handle: self.handle.as_deref().map(parse_handle).transpose()?,
            name: self
                .name
                .as_deref()
                .map(|n| validate_name(n, MAX_NAME_CHARS))
                .transpose()?,
            description: self.description,
            price,
            stock: self.stock.map(check_stock).transpose()?,
            status: self.status,
            collection_id: self.collection_id,
        })
    }
}

/// Delete uploads that never made it into the database.
async fn discard(state: &AppState, images: &[Image]) {
    let ids: Vec<String> = images.iter().map(|i| i.public_id.clone()).collect();
    destroy_all(state.images(), &ids).await;
}

/// GET /api/admin/products
#[instrument(skip(state, _admin))]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiQuery(query): ApiQuery<AdminProductQuery>,
) -> Result<Json<Page<Product>>> {
    let filter = ProductFilter {
        status: query.status,
        collection_id: query.collection.map(CollectionId::new),
        query: search_text(query.q.as_deref())?.map(str::to_owned),
    };

    let page = ProductRepository::new(state.pool())
        .list(&filter, Pagination::new(query.limit, query.offset))
        .await?;

    Ok(Json(page))
}

/// Create a product from a multipart form with optional `images` files.
///
/// POST /api/admin/product/new
#[instrument(skip(state, admin, multipart), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdminWriter(admin): RequireAdminWriter,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Product>)> {
    let mut form =
        UploadForm::read(multipart?, &[IMAGE_FIELD], state.config().max_upload_bytes).await?;
    let product = new_product(&form)?;

    let images = upload_all(state.images(), form.take_files(IMAGE_FIELD)).await?;

    let created = match ProductRepository::new(state.pool())
        .create(&product, &images)
        .await
    {
        Ok(created) => created,
        Err(e) => {
            discard(&state, &images).await;
            return Err(e.into());
        }
    };

    state.catalog().invalidate_all().await;
    tracing::info!(product_id = %created.id, images = images.len(), "Product created");

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/admin/products/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Product>> {
    ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("product not found".to_owned()))
}

/// PATCH /api/admin/products/{id}
#[instrument(skip(state, admin, patch), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdminWriter(admin): RequireAdminWriter,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(patch): ApiJson<ProductPatch>,
) -> Result<Json<Product>> {
    let update = patch.into_update()?;

    let product = ProductRepository::new(state.pool())
        .update(id, &update)
        .await?;

    state.catalog().invalidate_all().await;

    Ok(Json(product))
}

/// Delete a product and, best effort, its CDN images.
///
/// DELETE /api/admin/products/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdminWriter(admin): RequireAdminWriter,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<StatusCode> {
    let images = ProductRepository::new(state.pool()).delete(id).await?;

    state.catalog().invalidate_all().await;

    let ids: Vec<String> = images.into_iter().map(|i| i.public_id).collect();
    destroy_all(state.images(), &ids).await;

    tracing::info!(product_id = %id, "Product deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Append images to a product's gallery.
///
/// POST /api/admin/products/{id}/images
#[instrument(skip(state, admin, multipart), fields(admin_id = %admin.id))]
pub async fn add_images(
    State(state): State<AppState>,
    RequireAdminWriter(admin): RequireAdminWriter,
    ApiPath(id): ApiPath<ProductId>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Product>> {
    let mut form =
        UploadForm::read(multipart?, &[IMAGE_FIELD], state.config().max_upload_bytes).await?;
    let uploads = form.take_files(IMAGE_FIELD);
    if uploads.is_empty() {
        return Err(AppError::BadRequest(format!(
            "at least one `{IMAGE_FIELD}` file is required"
        )));
    }

    let products = ProductRepository::new(state.pool());
    if products.get_by_id(id).await?.is_none() {
        return Err(AppError::NotFound("product not found".to_owned()));
    }

    let images = upload_all(state.images(), uploads).await?;

    let product = match products.add_images(id, &images).await {
        Ok(product) => product,
        Err(e) => {
            discard(&state, &images).await;
            return Err(e.into());
        }
    };

    state.catalog().invalidate_all().await;

    Ok(Json(product))
}

/// Remove one image from a gallery and delete it from the CDN.
///
/// DELETE /api/admin/products/{id}/images/{image_id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn remove_image(
    State(state): State<AppState>,
    RequireAdminWriter(admin): RequireAdminWriter,
    ApiPath((id, image_id)): ApiPath<(ProductId, ProductImageId)>,
) -> Result<Json<Product>> {
    let products = ProductRepository::new(state.pool());
    let removed = products.remove_image(id, image_id).await?;

    state.catalog().invalidate_all().await;
    destroy_all(state.images(), &[removed.public_id]).await;

    products
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("product not found".to_owned()))
}

/// PUT /api/admin/products/{id}/images/order
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn reorder_images(
    State(state): State<AppState>,
    RequireAdminWriter(admin): RequireAdminWriter,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<ReorderRequest>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .reorder_images(id, &body.image_ids)
        .await?;

    state.catalog().invalidate_all().await;

    Ok(Json(product))
}
