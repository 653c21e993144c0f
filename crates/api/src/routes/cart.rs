//! Customer cart routes. Every route requires a customer token and returns
//! the whole cart after the change.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use bangle_core::ProductId;
use bangle_core::cart::{CartLine, MAX_GUEST_CART_LINES};

use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::CartView;
use crate::routes::extract::{ApiJson, ApiPath};
use crate::services::cart::CartService;
use crate::state::AppState;

const fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct MergeRequest {
    pub items: Vec<CartLine>,
}

/// Reject guest carts longer than a real cart could be.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if there are too many lines.
pub fn check_guest_cart(lines: &[CartLine]) -> Result<()> {
    if lines.len() > MAX_GUEST_CART_LINES {
        return Err(AppError::BadRequest(format!(
            "a guest cart may hold at most {MAX_GUEST_CART_LINES} lines"
        )));
    }
    Ok(())
}

/// GET /api/cart
pub async fn show(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<CartView>> {
    Ok(Json(CartService::new(state.pool()).view(customer.id).await?))
}

/// POST /api/cart/items
#[instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    ApiJson(body): ApiJson<AddItemRequest>,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool())
        .add(customer.id, body.product_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// PUT /api/cart/items/{product_id}
#[instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(body): ApiJson<UpdateItemRequest>,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool())
        .set_quantity(customer.id, product_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// DELETE /api/cart/items/{product_id}
#[instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool())
        .remove(customer.id, product_id)
        .await?;
    Ok(Json(cart))
}

/// DELETE /api/cart
#[instrument(skip(state, customer), fields(customer_id = %customer.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<CartView>> {
    Ok(Json(CartService::new(state.pool()).clear(customer.id).await?))
}

/// Merge a guest cart for a customer who is already signed in.
///
/// POST /api/cart/merge
#[instrument(skip(state, customer, body), fields(customer_id = %customer.id, lines = body.items.len()))]
pub async fn merge(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    ApiJson(body): ApiJson<MergeRequest>,
) -> Result<Json<CartView>> {
    check_guest_cart(&body.items)?;
    let cart = CartService::new(state.pool())
        .merge(customer.id, &body.items)
        .await?;
    Ok(Json(cart))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_cart_length_is_capped() {
        let lines: Vec<CartLine> = (1..=51)
            .map(|id| CartLine::new(ProductId::new(id), 1))
            .collect();

        assert!(check_guest_cart(&lines[..MAX_GUEST_CART_LINES]).is_ok());
        assert!(check_guest_cart(&[]).is_ok());
        assert!(matches!(
            check_guest_cart(&lines),
            Err(AppError::BadRequest(_))
        ));
    }
}
