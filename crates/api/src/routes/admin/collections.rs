//! Admin collection management.

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use bangle_core::{CollectionId, Handle};

use super::{UploadForm, validate_name};
use crate::db::CollectionRepository;
use crate::db::collections::{CollectionUpdate, NewCollection};
use crate::error::{AppError, Result};
use crate::middleware::{RequireAdmin, RequireAdminWriter};
use crate::models::{Collection, Image};
use crate::routes::extract::{ApiJson, ApiPath};
use crate::services::media::{destroy_all, upload_all};
use crate::state::AppState;

const MAX_NAME_CHARS: usize = 100;
const IMAGE_FIELD: &str = "image";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionPatch {
    pub handle: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
}

fn parse_handle(raw: &str) -> Result<Handle> {
    Handle::parse(raw).map_err(|e| AppError::BadRequest(format!("`handle` is invalid: {e}")))
}

fn new_collection(form: &UploadForm) -> Result<NewCollection> {
    let name = validate_name(form.required("name")?, MAX_NAME_CHARS)?;
    let handle = match form.text("handle") {
        Some(raw) => parse_handle(raw)?,
        None => Handle::from_name(&name).map_err(|_| {
            AppError::BadRequest("cannot derive a handle from `name`, supply `handle`".to_owned())
        })?,
    };

    Ok(NewCollection {
        handle,
        name,
        description: form.text("description").unwrap_or_default().to_owned(),
    })
}

impl CollectionPatch {
    fn into_update(self) -> Result<CollectionUpdate> {
        Ok(CollectionUpdate {
            handle: self.handle.as_deref().map(parse_handle).transpose()?,
            name: self
                .name
                .as_deref()
                .map(|n| validate_name(n, MAX_NAME_CHARS))
                .transpose()?,
            description: self.description,
        })
    }
}

/// Upload the single `image` file of a form, if one was sent.
async fn upload_cover(state: &AppState, form: &mut UploadForm) -> Result<Option<Image>> {
    let mut files = form.take_files(IMAGE_FIELD);
    if files.len() > 1 {
        return Err(AppError::BadRequest(format!(
            "only one `{IMAGE_FIELD}` file is allowed"
        )));
    }
    let Some(upload) = files.pop() else {
        return Ok(None);
    };
    Ok(upload_all(state.images(), vec![upload]).await?.pop())
}

async fn discard(state: &AppState, image: Option<Image>) {
    if let Some(image) = image {
        destroy_all(state.images(), &[image.public_id]).await;
    }
}

/// GET /api/admin/collections
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Collection>>> {
    Ok(Json(CollectionRepository::new(state.pool()).list_all().await?))
}

/// GET /api/admin/collections/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiPath(id): ApiPath<CollectionId>,
) -> Result<Json<Collection>> {
    CollectionRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("collection not found".to_owned()))
}

/// Create a collection from a multipart form with an optional `image` file.
///
/// POST /api/admin/collection/new
#[instrument(skip(state, admin, multipart), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdminWriter(admin): RequireAdminWriter,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Collection>)> {
    let mut form =
        UploadForm::read(multipart?, &[IMAGE_FIELD], state.config().max_upload_bytes).await?;
    let collection = new_collection(&form)?;
    let image = upload_cover(&state, &mut form).await?;

    let created = match CollectionRepository::new(state.pool())
        .create(&collection, image.as_ref())
        .await
    {
        Ok(created) => created,
        Err(e) => {
            discard(&state, image).await;
            return Err(e.into());
        }
    };

    state.catalog().invalidate_all().await;
    tracing::info!(collection_id = %created.id, "Collection created");

    Ok((StatusCode::CREATED, Json(created)))
}

/// PATCH /api/admin/collections/{id}
#[instrument(skip(state, admin, patch), fields(admin_id = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdminWriter(admin): RequireAdminWriter,
    ApiPath(id): ApiPath<CollectionId>,
    ApiJson(patch): ApiJson<CollectionPatch>,
) -> Result<Json<Collection>> {
    let collection = CollectionRepository::new(state.pool())
        .update(id, &patch.into_update()?)
        .await?;

    state.catalog().invalidate_all().await;

    Ok(Json(collection))
}

/// Replace the cover image. The previous image is deleted from the CDN.
///
/// PUT /api/admin/collections/{id}/image
#[instrument(skip(state, admin, multipart), fields(admin_id = %admin.id))]
pub async fn set_image(
    State(state): State<AppState>,
    RequireAdminWriter(admin): RequireAdminWriter,
    ApiPath(id): ApiPath<CollectionId>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Collection>> {
    let mut form =
        UploadForm::read(multipart?, &[IMAGE_FIELD], state.config().max_upload_bytes).await?;
    let image = upload_cover(&state, &mut form)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("`{IMAGE_FIELD}` file is required")))?;

    let (collection, previous) = match CollectionRepository::new(state.pool())
        .set_image(id, &image)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            discard(&state, Some(image)).await;
            return Err(e.into());
        }
    };

    state.catalog().invalidate_all().await;
    discard(&state, previous).await;

    Ok(Json(collection))
}

/// Delete a collection. Its products are kept without a collection.
///
/// DELETE /api/admin/collections/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdminWriter(admin): RequireAdminWriter,
    ApiPath(id): ApiPath<CollectionId>,
) -> Result<StatusCode> {
    let deleted = CollectionRepository::new(state.pool()).delete(id).await?;

    state.catalog().invalidate_all().await;
    discard(&state, deleted.image).await;

    tracing::info!(collection_id = %id, "Collection deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_collection_derives_handle() {
        let mut form = UploadForm::default();
        form.fields.insert("name".into(), "Summer Stacks".into());

        let collection = new_collection(&form).unwrap();

        assert_eq!(collection.handle.as_str(), "summer-stacks");
        assert_eq!(collection.description, "");
    }

    #[test]
    fn test_new_collection_requires_name() {
        let mut form = UploadForm::default();
        form.fields.insert("handle".into(), "summer".into());

        assert!(matches!(new_collection(&form), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_patch_validation() {
        let patch: CollectionPatch = serde_json::from_str(r#"{"handle": "Bad Handle"}"#).unwrap();
        assert!(matches!(patch.into_update(), Err(AppError::BadRequest(_))));

        let patch: CollectionPatch = serde_json::from_str(r#"{"name": " Charms "}"#).unwrap();
        assert_eq!(patch.into_update().unwrap().name.as_deref(), Some("Charms"));

        assert!(serde_json::from_str::<CollectionPatch>(r#"{"image": "x"}"#).is_err());
    }
}
