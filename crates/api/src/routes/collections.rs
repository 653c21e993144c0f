//! Public collection routes.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use bangle_core::Handle;

use crate::db::Pagination;
use crate::error::{AppError, Result};
use crate::models::Collection;
use crate::routes::extract::{ApiPath, ApiQuery};
use crate::services::catalog::{CatalogService, CollectionWithProducts};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CollectionQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// All collections.
///
/// GET /api/collections
#[instrument(skip(state))]
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Collection>>> {
    let collections = CatalogService::new(state.pool(), state.catalog())
        .collections()
        .await?;
    Ok(Json(collections))
}

/// A collection with a page of its active products.
///
/// GET /api/collections/{handle}
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    ApiPath(handle): ApiPath<String>,
    ApiQuery(query): ApiQuery<CollectionQuery>,
) -> Result<Json<CollectionWithProducts>> {
    let not_found = || AppError::NotFound("collection not found".to_owned());

    let handle = Handle::parse(&handle).map_err(|_| not_found())?;

    CatalogService::new(state.pool(), state.catalog())
        .collection(&handle, Pagination::new(query.limit, query.offset))
        .await?
        .map(Json)
        .ok_or_else(not_found)
}
