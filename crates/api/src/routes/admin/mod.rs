//! Admin dashboard routes.
//!
//! Every route requires an admin token. Routes that change store data take
//! [`RequireAdminWriter`](crate::middleware::RequireAdminWriter), which
//! rejects the read-only `viewer` role. Successful catalog writes clear the
//! public catalog cache.

pub mod auth;
pub mod collections;
pub mod customers;
pub mod products;

use std::collections::HashMap;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart},
    middleware::map_response,
    routing::{get, post, put},
};
use serde::{Deserialize, Deserializer};

use crate::config::ApiConfig;
use crate::error::AppError;
use crate::middleware::{auth_rate_limiter, json_rate_limit_response};
use crate::services::media::{ImageUpload, validate_image};
use crate::state::AppState;

/// Most image files accepted in one request.
pub const MAX_IMAGES_PER_REQUEST: usize = 10;

/// Longest text field accepted in a multipart form.
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

/// Room for multipart framing and text fields on top of the image bytes.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Body limit for the image upload routes. Every other route keeps the
/// application-wide default.
#[must_use]
pub fn upload_body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes
        .saturating_mul(MAX_IMAGES_PER_REQUEST)
        .saturating_add(MULTIPART_OVERHEAD_BYTES)
}

/// A parsed multipart form: text fields plus validated image files.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: Vec<(String, ImageUpload)>,
}

impl UploadForm {
    /// Read every part of a multipart body.
    ///
    /// Parts named in `file_fields` are read as images and validated against
    /// `max_image_bytes`; every other part is read as text.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for malformed bodies or too many files
    /// and the validation error for any unacceptable image.
    pub async fn read(
        mut multipart: Multipart,
        file_fields: &[&str],
        max_image_bytes: usize,
    ) -> Result<Self, AppError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };

            if file_fields.contains(&name.as_str()) {
                let file_name = field.file_name().map(str::to_owned);
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was picked.
                if bytes.is_empty() && file_name.as_deref().is_none_or(str::is_empty) {
                    continue;
                }
                if form.files.len() >= MAX_IMAGES_PER_REQUEST {
                    return Err(AppError::BadRequest(format!(
                        "at most {MAX_IMAGES_PER_REQUEST} images per request"
                    )));
                }
                let upload = validate_image(file_name.as_deref(), bytes.to_vec(), max_image_bytes)?;
                form.files.push((name, upload));
            } else {
                let text = field.text().await?;
                if text.len() > MAX_TEXT_FIELD_BYTES {
                    return Err(AppError::BadRequest(format!("field `{name}` is too long")));
                }
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    /// A text field, trimmed, treating blank values as absent.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// A required text field.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the field is missing or blank.
    pub fn required(&self, name: &str) -> Result<&str, AppError> {
        self.text(name)
            .ok_or_else(|| AppError::BadRequest(format!("`{name}` is required")))
    }

    /// A text field parsed with `FromStr`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the value does not parse.
    pub fn parsed<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, AppError> {
        self.text(name)
            .map(|raw| {
                raw.parse()
                    .map_err(|_| AppError::BadRequest(format!("`{name}` is invalid: {raw}")))
            })
            .transpose()
    }

    /// Take the files uploaded under `name`, in upload order.
    pub fn take_files(&mut self, name: &str) -> Vec<ImageUpload> {
        let (taken, kept) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|(field, _)| field == name);
        self.files = kept;
        taken.into_iter().map(|(_, upload)| upload).collect()
    }
}

/// Deserialize a field that distinguishes "absent" from "explicitly null".
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`: an absent
/// field stays `None`, `null` becomes `Some(None)`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Reject blank or overlong names.
///
/// # Errors
///
/// Returns `AppError::BadRequest` describing the problem.
pub fn validate_name(name: &str, max_chars: usize) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("`name` is required".to_owned()));
    }
    if name.chars().count() > max_chars {
        return Err(AppError::BadRequest(format!(
            "`name` must be at most {max_chars} characters"
        )));
    }
    Ok(name.to_owned())
}

/// Create the admin router, mounted at `/api/admin`.
pub fn routes(config: &ApiConfig) -> Router<AppState> {
    let uploads = DefaultBodyLimit::max(upload_body_limit(config.max_upload_bytes));

    Router::new()
        .route(
            "/auth/login",
            post(auth::login)
                .layer(auth_rate_limiter(config.trust_proxy_headers))
                .layer(map_response(json_rate_limit_response)),
        )
        .route("/auth/me", get(auth::me))
        // Products
        .route("/products", get(products::index))
        .route("/product/new", post(products::create).layer(uploads))
        .route(
            "/products/{id}",
            get(products::show)
                .patch(products::update)
                .delete(products::delete),
        )
        .route(
            "/products/{id}/images",
            post(products::add_images).layer(uploads),
        )
        .route("/products/{id}/images/order", put(products::reorder_images))
        .route(
            "/products/{id}/images/{image_id}",
            axum::routing::delete(products::remove_image),
        )
        // Collections
        .route("/collections", get(collections::index))
        .route("/collection/new", post(collections::create).layer(uploads))
        .route(
            "/collections/{id}",
            get(collections::show)
                .patch(collections::update)
                .delete(collections::delete),
        )
        .route(
            "/collections/{id}/image",
            put(collections::set_image).layer(uploads),
        )
        // Customers
        .route("/customers", get(customers::index))
        .route(
            "/customers/{id}",
            get(customers::show).delete(customers::delete),
        )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        collection_id: Option<Option<i32>>,
    }

    #[test]
    fn test_double_option() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.collection_id, None);

        let cleared: Patch = serde_json::from_str(r#"{"collection_id": null}"#).unwrap();
        assert_eq!(cleared.collection_id, Some(None));

        let set: Patch = serde_json::from_str(r#"{"collection_id": 4}"#).unwrap();
        assert_eq!(set.collection_id, Some(Some(4)));
    }

    #[test]
    fn test_form_field_helpers() {
        let mut form = UploadForm::default();
        form.fields.insert("name".into(), "  Cuff  ".into());
        form.fields.insert("stock".into(), "12".into());
        form.fields.insert("price".into(), "abc".into());
        form.fields.insert("description".into(), "   ".into());

        assert_eq!(form.required("name").unwrap(), "Cuff");
        assert_eq!(form.text("description"), None);
        assert!(form.required("description").is_err());
        assert_eq!(form.parsed::<i32>("stock").unwrap(), Some(12));
        assert_eq!(form.parsed::<i32>("missing").unwrap(), None);
        assert!(form.parsed::<i32>("price").is_err());
    }

    #[test]
    fn test_upload_body_limit_covers_a_full_request() {
        let limit = upload_body_limit(5 * 1024 * 1024);
        assert!(limit > 5 * 1024 * 1024 * MAX_IMAGES_PER_REQUEST);
        assert_eq!(upload_body_limit(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_validate_name() {
        assert_eq!(validate_name(" Ring ", 10).unwrap(), "Ring");
        assert!(validate_name("", 10).is_err());
        assert!(validate_name("abcdefghijk", 10).is_err());
    }
}
