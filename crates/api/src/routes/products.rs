//! Public product routes. Only active products are visible here.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use bangle_core::Handle;

use crate::db::{Page, Pagination};
use crate::error::{AppError, Result};
use crate::models::Product;
use crate::routes::extract::{ApiPath, ApiQuery};
use crate::routes::search_text;
use crate::services::catalog::CatalogService;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    /// Collection handle.
    pub collection: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Product listing.
///
/// GET /api/products
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductListQuery>,
) -> Result<Json<Page<Product>>> {
    let pagination = Pagination::new(query.limit, query.offset);

    let collection = match query.collection.as_deref().filter(|c| !c.is_empty()) {
        Some(raw) => match Handle::parse(raw) {
            Ok(handle) => Some(handle),
            // No collection can have this handle.
            Err(_) => return Ok(Json(pagination.page(Vec::new(), 0))),
        },
        None => None,
    };

    let search = search_text(query.q.as_deref())?;

    let page = CatalogService::new(state.pool(), state.catalog())
        .products(collection.as_ref(), search, pagination)
        .await?;

    Ok(Json(page))
}

/// Product detail.
///
/// GET /api/products/{handle}
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(handle): ApiPath<String>,
) -> Result<Json<Product>> {
    let not_found = || AppError::NotFound("product not found".to_owned());

    let handle = Handle::parse(&handle).map_err(|_| not_found())?;

    CatalogService::new(state.pool(), state.catalog())
        .product(&handle)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}
