//! Image hosting on the Cloudinary CDN.
//!
//! Uploads are signed server side: the API secret never leaves the backend.
//! Handlers talk to [`ImageStore`] so tests can swap in an in-memory store.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;

use crate::config::CloudinaryConfig;
use crate::models::Image;

/// Content types accepted for upload.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from validating, uploading, or deleting images.
#[derive(Debug, Error)]
pub enum MediaError {
    /// The file is not an acceptable image.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The file exceeds the upload limit.
    #[error("image is {size} bytes, the limit is {max} bytes")]
    TooLarge { size: usize, max: usize },

    /// HTTP request to the CDN failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The CDN rejected the request.
    #[error("CDN error: {0}")]
    Cdn(String),
}

/// A validated image file ready to send to the CDN.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Somewhere images can be stored and later deleted.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store an image and return where it is served from.
    async fn upload(&self, upload: ImageUpload) -> Result<Image, MediaError>;

    /// Delete a previously stored image.
    async fn destroy(&self, public_id: &str) -> Result<(), MediaError>;
}

/// Check an uploaded file before it is sent anywhere.
///
/// The declared content type is not trusted; the file's leading bytes decide
/// what it is.
///
/// # Errors
///
/// Returns `MediaError::InvalidImage` for empty or unsupported files and
/// `MediaError::TooLarge` for files over `max_bytes`.
pub fn validate_image(
    file_name: Option<&str>,
    bytes: Vec<u8>,
    max_bytes: usize,
) -> Result<ImageUpload, MediaError> {
    if bytes.is_empty() {
        return Err(MediaError::InvalidImage("file is empty".to_owned()));
    }
    if bytes.len() > max_bytes {
        return Err(MediaError::TooLarge {
            size: bytes.len(),
            max: max_bytes,
        });
    }

    let content_type = sniff_content_type(&bytes).ok_or_else(|| {
        MediaError::InvalidImage(format!(
            "unsupported file type, expected one of: {}",
            ALLOWED_CONTENT_TYPES.join(", ")
        ))
    })?;

    let file_name = file_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("upload")
        .to_owned();

    Ok(ImageUpload {
        file_name,
        content_type,
        bytes,
    })
}

/// Identify an image by its magic bytes.
fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP")
    {
        Some("image/webp")
    } else {
        None
    }
}

/// Delete images, logging failures instead of returning them.
///
/// Used to clean up after a failed write and when products are deleted; a
/// leftover CDN asset is not worth failing the request over.
pub async fn destroy_all(store: &dyn ImageStore, public_ids: &[String]) {
    for public_id in public_ids {
        if let Err(e) = store.destroy(public_id).await {
            tracing::warn!(public_id = %public_id, error = %e, "Failed to delete image from CDN");
        }
    }
}

/// Upload several images, rolling back the ones already uploaded if any fails.
///
/// # Errors
///
/// Returns the first upload error.
pub async fn upload_all(
    store: &dyn ImageStore,
    uploads: Vec<ImageUpload>,
) -> Result<Vec<Image>, MediaError> {
    let mut images = Vec::with_capacity(uploads.len());
    for upload in uploads {
        match store.upload(upload).await {
            Ok(image) => images.push(image),
            Err(e) => {
                let uploaded: Vec<String> = images.into_iter().map(|i| i.public_id).collect();
                destroy_all(store, &uploaded).await;
                return Err(e);
            }
        }
    }
    Ok(images)
}

// =============================================================================
// Cloudinary
// =============================================================================

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Cloudinary upload API client.
#[derive(Clone)]
pub struct CloudinaryStore {
    inner: Arc<CloudinaryInner>,
}

struct CloudinaryInner {
    client: reqwest::Client,
    config: CloudinaryConfig,
    base_url: String,
}

impl CloudinaryStore {
    /// Create a new Cloudinary client.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Http` if the HTTP client cannot be built.
    pub fn new(config: CloudinaryConfig) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base_url = format!("https://api.cloudinary.com/v1_1/{}", config.cloud_name);

        Ok(Self {
            inner: Arc::new(CloudinaryInner {
                client,
                config,
                base_url,
            }),
        })
    }

    fn sign(&self, params: &[(&str, &str)]) -> String {
        sign_params(params, self.inner.config.api_secret.expose_secret())
    }

    async fn send(&self, endpoint: &str, form: Form) -> Result<reqwest::Response, MediaError> {
        let response = self
            .inner
            .client
            .post(format!("{}/image/{endpoint}", self.inner.base_url))
            .multipart(form)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let message = response
            .json::<ErrorResponse>()
            .await
            .map_or_else(|_| status.to_string(), |body| body.error.message);
        Err(MediaError::Cdn(message))
    }
}

#[async_trait]
impl ImageStore for CloudinaryStore {
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, size = upload.bytes.len()))]
    async fn upload(&self, upload: ImageUpload) -> Result<Image, MediaError> {
        let timestamp = unix_timestamp();
        let folder = self.inner.config.folder.as_str();
        let signature = self.sign(&[("folder", folder), ("timestamp", &timestamp)]);

        let file = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(upload.content_type)?;

        let form = Form::new()
            .part("file", file)
            .text("api_key", self.inner.config.api_key.clone())
            .text("folder", folder.to_owned())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let body: UploadResponse = self.send("upload", form).await?.json().await?;

        tracing::info!(public_id = %body.public_id, "Uploaded image");

        Ok(Image {
            url: body.secure_url,
            public_id: body.public_id,
        })
    }

    #[instrument(skip(self))]
    async fn destroy(&self, public_id: &str) -> Result<(), MediaError> {
        let timestamp = unix_timestamp();
        let signature = self.sign(&[("public_id", public_id), ("timestamp", &timestamp)]);

        let form = Form::new()
            .text("api_key", self.inner.config.api_key.clone())
            .text("public_id", public_id.to_owned())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let body: DestroyResponse = self.send("destroy", form).await?.json().await?;

        match body.result.as_str() {
            // Already gone counts as deleted.
            "ok" | "not found" => Ok(()),
            other => Err(MediaError::Cdn(format!("destroy returned {other}"))),
        }
    }
}

/// Cloudinary request signature: SHA-256 over the parameters sorted by name,
/// joined as `k=v&k=v`, with the API secret appended.
fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_unstable_by_key(|(key, _)| *key);

    let mut payload = String::new();
    for (i, (key, value)) in sorted.iter().enumerate() {
        if i > 0 {
            payload.push('&');
        }
        let _ = write!(payload, "{key}={value}");
    }
    payload.push_str(api_secret);

    hex::encode(Sha256::digest(payload.as_bytes()))
}

fn unix_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}

// =============================================================================
// In-memory store for tests
// =============================================================================


#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::testing::MemoryImageStore;
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    #[test]
    fn test_signature_sorts_params_and_appends_secret() {
        let signature = sign_params(&[("timestamp", "1315060510"), ("folder", "bangle")], "abcd");
        let expected = hex::encode(Sha256::digest(b"folder=bangle&timestamp=1315060510abcd"));
        assert_eq!(signature, expected);
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let params = [("public_id", "bangle/abc"), ("timestamp", "1")];
        assert_ne!(sign_params(&params, "one"), sign_params(&params, "two"));
    }

    #[test]
    fn test_validate_image_sniffs_type() {
        let upload = validate_image(Some("cuff.png"), PNG.to_vec(), 1024).unwrap();
        assert_eq!(upload.content_type, "image/png");
        assert_eq!(upload.file_name, "cuff.png");

        let upload = validate_image(None, JPEG.to_vec(), 1024).unwrap();
        assert_eq!(upload.content_type, "image/jpeg");
        assert_eq!(upload.file_name, "upload");
    }

    #[test]
    fn test_validate_image_webp() {
        let mut webp = b"RIFF\0\0\0\0WEBPVP8 ".to_vec();
        webp.extend_from_slice(&[0; 8]);
        let upload = validate_image(Some("a.webp"), webp, 1024).unwrap();
        assert_eq!(upload.content_type, "image/webp");
    }

    #[test]
    fn test_validate_image_rejects_empty() {
        assert!(matches!(
            validate_image(Some("a.png"), Vec::new(), 1024),
            Err(MediaError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_validate_image_rejects_non_images() {
        assert!(matches!(
            validate_image(Some("notes.png"), b"just some text".to_vec(), 1024),
            Err(MediaError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_validate_image_rejects_oversize() {
        let mut big = PNG.to_vec();
        big.resize(2048, 0);
        assert!(matches!(
            validate_image(Some("big.png"), big, 1024),
            Err(MediaError::TooLarge {
                size: 2048,
                max: 1024
            })
        ));
    }

    #[tokio::test]
    async fn test_upload_all_rolls_back_on_failure() {
        let store = MemoryImageStore::default();
        store.fail_uploads_after(2);

        let uploads = (0..3)
            .map(|i| validate_image(Some(&format!("{i}.png")), PNG.to_vec(), 1024).unwrap())
            .collect();

        let result = upload_all(&store, uploads).await;

        assert!(matches!(result, Err(MediaError::Cdn(_))));
        assert_eq!(store.uploaded().len(), 2);
        assert_eq!(store.destroyed(), store.uploaded());
    }

    #[tokio::test]
    async fn test_destroy_all_keeps_going_after_failures() {
        let store = MemoryImageStore::default();
        store.fail_destroys();

        destroy_all(&store, &["a".to_owned(), "b".to_owned()]).await;

        assert!(store.destroyed().is_empty());
    }
}
