//! Collection repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use bangle_core::{CollectionId, Handle};

use super::RepositoryError;
use crate::models::{Collection, Image};

#[derive(Debug, sqlx::FromRow)]
struct CollectionRow {
    id: i32,
    handle: String,
    name: String,
    description: String,
    image_url: Option<String>,
    image_public_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CollectionRow> for Collection {
    type Error = RepositoryError;

    fn try_from(row: CollectionRow) -> Result<Self, Self::Error> {
        let handle = Handle::parse(&row.handle).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid handle in database: {e}"))
        })?;

        let image = match (row.image_url, row.image_public_id) {
            (Some(url), Some(public_id)) => Some(Image { url, public_id }),
            _ => None,
        };

        Ok(Self {
            id: CollectionId::new(row.id),
            handle,
            name: row.name,
            description: row.description,
            image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const COLLECTION_COLUMNS: &str =
    "id, handle, name, description, image_url, image_public_id, created_at, updated_at";

/// Fields for a new collection.
#[derive(Debug, Clone)]
pub struct NewCollection {
    pub handle: Handle,
    pub name: String,
    pub description: String,
}

/// Partial collection update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct CollectionUpdate {
    pub handle: Option<Handle>,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// Repository for collection database operations.
pub struct CollectionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CollectionRepository<'a> {
    /// Create a new collection repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all collections alphabetically.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Collection>, RepositoryError> {
        let rows = sqlx::query_as::<_, CollectionRow>(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collection ORDER BY name ASC, id ASC"
        ))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a collection by its ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CollectionId) -> Result<Option<Collection>, RepositoryError> {
        let row = sqlx::query_as::<_, CollectionRow>(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collection WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a collection by its handle.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_handle(
        &self,
        handle: &Handle,
    ) -> Result<Option<Collection>, RepositoryError> {
        let row = sqlx::query_as::<_, CollectionRow>(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collection WHERE handle = $1"
        ))
        .bind(handle.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Create a collection, optionally with a cover image.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the handle is taken.
    pub async fn create(
        &self,
        collection: &NewCollection,
        image: Option<&Image>,
    ) -> Result<Collection, RepositoryError> {
        let row = sqlx::query_as::<_, CollectionRow>(&format!(
            "INSERT INTO collection (handle, name, description, image_url, image_public_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLLECTION_COLUMNS}"
        ))
        .bind(collection.handle.as_str())
        .bind(&collection.name)
        .bind(&collection.description)
        .bind(image.map(|i| i.url.as_str()))
        .bind(image.map(|i| i.public_id.as_str()))
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "handle already exists"))?;

        row.try_into()
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the collection does not exist.
    /// Returns `RepositoryError::Conflict` if the new handle is taken.
    pub async fn update(
        &self,
        id: CollectionId,
        update: &CollectionUpdate,
    ) -> Result<Collection, RepositoryError> {
        let row = sqlx::query_as::<_, CollectionRow>(&format!(
            "UPDATE collection SET \
                 handle = COALESCE($2, handle), \
                 name = COALESCE($3, name), \
                 description = COALESCE($4, description), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING {COLLECTION_COLUMNS}"
        ))
        .bind(id)
        .bind(update.handle.as_ref().map(Handle::as_str))
        .bind(update.name.as_deref())
        .bind(update.description.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::from_write(e, "handle already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// Replace the cover image, returning the collection and the image it replaced.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the collection does not exist.
    pub async fn set_image(
        &self,
        id: CollectionId,
        image: &Image,
    ) -> Result<(Collection, Option<Image>), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_as::<_, CollectionRow>(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collection WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        let previous: Collection = previous.try_into()?;

        let row = sqlx::query_as::<_, CollectionRow>(&format!(
            "UPDATE collection SET image_url = $2, image_public_id = $3, updated_at = now() \
             WHERE id = $1 \
             RETURNING {COLLECTION_COLUMNS}"
        ))
        .bind(id)
        .bind(&image.url)
        .bind(&image.public_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((row.try_into()?, previous.image))
    }

    /// Delete a collection. Its products stay in the catalog without a collection.
    ///
    /// Returns the deleted collection so its cover image can be removed from the CDN.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the collection does not exist.
    pub async fn delete(&self, id: CollectionId) -> Result<Collection, RepositoryError> {
        let row = sqlx::query_as::<_, CollectionRow>(&format!(
            "DELETE FROM collection WHERE id = $1 RETURNING {COLLECTION_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }
}
