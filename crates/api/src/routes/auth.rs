//! Customer authentication routes.

use std::time::SystemTime;

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use bangle_core::cart::CartLine;

use crate::db::CustomerRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::{CartView, Customer};
use crate::routes::cart::check_guest_cart;
use crate::routes::extract::ApiJson;
use crate::services::auth::AuthService;
use crate::services::cart::CartService;
use crate::services::token::TokenService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Cart the customer built before logging in.
    #[serde(default)]
    pub guest_cart: Vec<CartLine>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub token: String,
    pub expires_in: u64,
    pub customer: Customer,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: u64,
    pub customer: Customer,
    pub cart: CartView,
}

/// Create a customer account and sign it in.
///
/// POST /api/auth/register
#[instrument(skip(state, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    let customer = AuthService::new(state.pool())
        .register_customer(&body.email, &body.name, &body.password)
        .await?;

    let tokens = TokenService::new(&state.config().auth);
    let token = tokens.issue_customer(&customer, SystemTime::now())?;

    tracing::info!(customer_id = %customer.id, "Customer registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            token,
            expires_in: tokens.ttl().as_secs(),
            customer,
        }),
    ))
}

/// Sign a customer in, folding any guest cart into their stored cart.
///
/// POST /api/auth/login
#[instrument(skip(state, body), fields(guest_lines = body.guest_cart.len()))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    check_guest_cart(&body.guest_cart)?;

    let customer = AuthService::new(state.pool())
        .login_customer(&body.email, &body.password)
        .await
        .inspect_err(|e| tracing::info!(error = %e, "Customer login failed"))?;

    let cart = CartService::new(state.pool())
        .merge(customer.id, &body.guest_cart)
        .await?;

    let tokens = TokenService::new(&state.config().auth);
    let token = tokens.issue_customer(&customer, SystemTime::now())?;

    tracing::info!(customer_id = %customer.id, "Customer logged in");

    Ok(Json(LoginResponse {
        token,
        expires_in: tokens.ttl().as_secs(),
        customer,
        cart,
    }))
}

/// The signed-in customer.
///
/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
) -> Result<Json<Customer>> {
    let customer = CustomerRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_owned()))?;

    Ok(Json(customer))
}
