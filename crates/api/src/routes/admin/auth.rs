//! Admin authentication routes.

use std::time::SystemTime;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::db::AdminRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::Admin;
use crate::routes::extract::ApiJson;
use crate::services::auth::AuthService;
use crate::services::token::TokenService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AdminLoginResponse {
    pub token: String,
    pub expires_in: u64,
    pub admin: Admin,
}

/// POST /api/admin/auth/login
#[instrument(skip(state, body))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AdminLoginRequest>,
) -> Result<Json<AdminLoginResponse>> {
    let admin = AuthService::new(state.pool())
        .login_admin(&body.email, &body.password)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Admin login failed"))?;

    let tokens = TokenService::new(&state.config().auth);
    let token = tokens.issue_admin(&admin, SystemTime::now())?;

    tracing::info!(admin_id = %admin.id, role = %admin.role, "Admin logged in");

    Ok(Json(AdminLoginResponse {
        token,
        expires_in: tokens.ttl().as_secs(),
        admin,
    }))
}

/// GET /api/admin/auth/me
pub async fn me(
    State(state): State<AppState>,
    RequireAdmin(current): RequireAdmin,
) -> Result<Json<Admin>> {
    let admin = AdminRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_owned()))?;

    Ok(Json(admin))
}
