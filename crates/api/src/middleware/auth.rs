//! Authentication extractors.
//!
//! Every protected route takes one of these extractors. They read the
//! `Authorization: Bearer <jwt>` header, verify the token, and reject the
//! request with a JSON 401/403 before the handler runs.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn cart(RequireCustomer(customer): RequireCustomer) -> impl IntoResponse {
//!     format!("cart for customer {}", customer.id)
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use bangle_core::{AdminId, AdminRole, CustomerId};

use crate::error::{AppError, set_sentry_user};
use crate::services::token::{Claims, TokenError, TokenService};
use crate::state::AppState;

/// The customer a request was authenticated as.
#[derive(Debug, Clone)]
pub struct CurrentCustomer {
    pub id: CustomerId,
    pub email: String,
}

/// The admin a request was authenticated as.
#[derive(Debug, Clone)]
pub struct CurrentAdmin {
    pub id: AdminId,
    pub email: String,
    pub role: AdminRole,
}

/// Extractor that requires a customer token.
pub struct RequireCustomer(pub CurrentCustomer);

/// Extractor that requires an admin token of any role.
pub struct RequireAdmin(pub CurrentAdmin);

/// Extractor that requires an admin token whose role may modify store data.
pub struct RequireAdminWriter(pub CurrentAdmin);

/// Pull the token out of an `Authorization: Bearer` header.
fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_owned()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("malformed authorization header".to_owned()))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::Unauthorized("malformed authorization header".to_owned()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::Unauthorized(
            "authorization scheme must be Bearer".to_owned(),
        ));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::Unauthorized("missing bearer token".to_owned()));
    }

    Ok(token)
}

fn verified_claims(parts: &Parts, state: &AppState) -> Result<Claims, AppError> {
    let token = bearer_token(parts)?;
    TokenService::new(&state.config().auth)
        .verify(token)
        .map_err(|e| {
            if matches!(e, TokenError::Expired) {
                tracing::debug!("Rejected expired token");
            }
            AppError::from(e)
        })
}

impl FromRequestParts<AppState> for RequireCustomer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = verified_claims(parts, state)?;
        let id = claims
            .customer_id()
            .ok_or_else(|| AppError::Forbidden("customer account required".to_owned()))?;

        set_sentry_user(&id, &claims.email);

        Ok(Self(CurrentCustomer {
            id,
            email: claims.email,
        }))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = verified_claims(parts, state)?;
        let (id, role) = claims
            .admin()
            .ok_or_else(|| AppError::Forbidden("admin account required".to_owned()))?;

        set_sentry_user(&format!("admin:{id}"), &claims.email);

        Ok(Self(CurrentAdmin {
            id,
            email: claims.email,
            role,
        }))
    }
}

impl FromRequestParts<AppState> for RequireAdminWriter {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAdmin(admin) = RequireAdmin::from_request_parts(parts, state).await?;

        if !admin.role.can_write() {
            return Err(AppError::Forbidden(format!(
                "the {} role is read-only",
                admin.role
            )));
        }

        Ok(Self(admin))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/api/cart");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token_extracts_token() {
        assert_eq!(bearer_token(&parts(Some("Bearer abc.def"))).unwrap(), "abc.def");
        assert_eq!(bearer_token(&parts(Some("bearer  abc "))).unwrap(), "abc");
    }

    #[test]
    fn test_bearer_token_rejections() {
        for header in [None, Some("Basic dXNlcjpwYXNz"), Some("Bearer"), Some("Bearer   ")] {
            assert!(matches!(
                bearer_token(&parts(header)),
                Err(AppError::Unauthorized(_))
            ));
        }
    }
}
