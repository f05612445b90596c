//! Profile image storage.
//!
//! Images are written to the configured uploads directory as `{unix_millis}-{tag}-{name}` and
//! served back under `/uploads/`, where the served content type follows the file extension. An
//! upload is accepted only if both its declared type and its extension are raster images.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::{prelude::RngExt, rng};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use crate::{api::models::auth::ImageUpload, config::UploadsConfig, errors::Error};

/// URL prefix uploaded files are served from.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// A file written by [`UploadStore::store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    /// Location on disk
    pub path: PathBuf,
    /// Path the browser fetches it from
    pub public_path: String,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_file_size: u64,
}

impl UploadStore {
    pub fn new(config: &UploadsConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            max_file_size: config.max_file_size,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the uploads directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Check an upload against the content type and size rules without touching the disk.
    pub fn validate(&self, upload: &ImageUpload) -> Result<(), Error> {
        let content_type = resolve_content_type(upload);
        if !is_allowed_image(&content_type) {
            return Err(Error::BadRequest {
                message: format!("Only image uploads are allowed (got {content_type})"),
            });
        }

        // The stored name keeps this extension and the file is served by it
        let name = sanitize_file_name(upload.file_name.as_deref().unwrap_or_default());
        if let Some(guessed) = mime_guess::from_path(&name).first() {
            if !is_allowed_image(guessed.essence_str()) {
                return Err(Error::BadRequest {
                    message: format!("File extension of {name} is not an image type"),
                });
            }
        }

        if upload.bytes.len() as u64 > self.max_file_size {
            return Err(Error::PayloadTooLarge {
                message: format!("Image exceeds the {} byte limit", self.max_file_size),
            });
        }

        Ok(())
    }

    /// Validate and persist an image.
    #[instrument(skip_all, fields(file_name = ?upload.file_name, size = upload.bytes.len()), err)]
    pub async fn store(&self, upload: &ImageUpload) -> Result<StoredUpload, Error> {
        self.validate(upload)?;

        let name = sanitize_file_name(upload.file_name.as_deref().unwrap_or_default());
        let file_name = format!("{}-{}-{}", Utc::now().timestamp_millis(), random_tag(), name);
        let path = self.dir.join(&file_name);

        let write_error = |e: std::io::Error| Error::Internal {
            operation: format!("write upload {}: {e}", path.display()),
        };
        // create_new: never replace another user's image
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(write_error)?;
        file.write_all(&upload.bytes).await.map_err(write_error)?;
        file.flush().await.map_err(write_error)?;
        debug!(path = %path.display(), "Stored upload");

        Ok(StoredUpload {
            path,
            public_path: format!("{PUBLIC_PREFIX}/{file_name}"),
        })
    }

    /// Remove a stored upload. Failure is logged, not returned.
    pub async fn discard(&self, upload: &StoredUpload) {
        if let Err(e) = tokio::fs::remove_file(&upload.path).await {
            warn!(path = %upload.path.display(), "Failed to remove orphaned upload: {}", e);
        }
    }
}

/// Raster image types. SVG is excluded since browsers run scripts embedded in it.
fn is_allowed_image(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence.starts_with("image/") && essence != "image/svg+xml"
}

/// Eight hex characters distinguishing uploads stored in the same millisecond.
fn random_tag() -> String {
    let mut bytes = [0u8; 4];
    rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// The declared content type, falling back to a guess from the file extension when the client
/// sent none or a generic one.
fn resolve_content_type(upload: &ImageUpload) -> String {
    let declared = upload.content_type.trim().to_ascii_lowercase();
    if !declared.is_empty() && declared != "application/octet-stream" {
        return declared;
    }
    upload
        .file_name
        .as_deref()
        .and_then(|name| mime_guess::from_path(name).first())
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or(declared)
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// Directory parts are dropped and anything outside `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.chars().take(100).collect()
    }
}
