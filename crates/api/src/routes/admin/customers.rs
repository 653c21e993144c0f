//! Admin customer management.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bangle_core::CustomerId;

use crate::db::{CartRepository, CustomerRepository, Page, Pagination};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAdminWriter};
use crate::models::{CartView, Customer};
use crate::routes::extract::{ApiPath, ApiQuery};
use crate::routes::search_text;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A customer together with their current cart.
#[derive(Debug, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub cart: CartView,
}

/// GET /api/admin/customers
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiQuery(query): ApiQuery<CustomerQuery>,
) -> Result<Json<Page<Customer>>> {
    let page = CustomerRepository::new(state.pool())
        .list(
            search_text(query.q.as_deref())?,
            Pagination::new(query.limit, query.offset),
        )
        .await?;
    Ok(Json(page))
}

/// GET /api/admin/customers/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiPath(id): ApiPath<CustomerId>,
) -> Result<Json<CustomerDetail>> {
    let customer = CustomerRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("customer not found".to_owned()))?;

    let items = CartRepository::new(state.pool()).items(id).await?;

    Ok(Json(CustomerDetail {
        customer,
        cart: CartView::new(items),
    }))
}

/// DELETE /api/admin/customers/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdminWriter(admin): RequireAdminWriter,
    ApiPath(id): ApiPath<CustomerId>,
) -> Result<StatusCode> {
    CustomerRepository::new(state.pool()).delete(id).await?;
    tracing::info!(customer_id = %id, "Customer deleted");
    Ok(StatusCode::NO_CONTENT)
}
