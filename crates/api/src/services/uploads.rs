//! Product image storage on the local filesystem.
//!
//! Files live in the configured upload directory and are served back under
//! [`Product::UPLOADS_PREFIX`](crate::models::Product::UPLOADS_PREFIX).

use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;

use crate::models::Product;

/// Extensions (and MIME subtypes) accepted for product images.
const ALLOWED_TYPES: [&str; 3] = ["jpeg", "jpg", "png"];

/// Errors from storing an uploaded image.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The multipart form had no `image` field.
    #[error("Please upload a file")]
    MissingFile,

    /// The file is not a JPEG or PNG.
    #[error("Images only! Allowed types: jpeg, jpg, png")]
    InvalidType,

    /// Writing to disk failed.
    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes and removes uploaded product images.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    /// Create a store rooted at `dir`.
    #[must_use]
    pub const fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Directory the files are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save an image and return the public path to reference it by.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::InvalidType` if the file is not a JPEG or PNG.
    /// Returns `UploadError::Io` if the file cannot be written.
    pub async fn save(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, UploadError> {
        let ext = image_extension(file_name, content_type).ok_or(UploadError::InvalidType)?;

        tokio::fs::create_dir_all(&self.dir).await?;

        let stored_name = format!("product-image-{}.{ext}", Utc::now().timestamp_millis());
        tokio::fs::write(self.dir.join(&stored_name), bytes).await?;

        tracing::info!(file = %stored_name, size = bytes.len(), "Stored product image");
        Ok(format!("{}/{stored_name}", Product::UPLOADS_PREFIX))
    }

    /// Delete a previously stored image by its public path.
    ///
    /// Paths outside the uploads prefix are ignored. Failures are logged, not
    /// returned.
    pub async fn remove(&self, public_path: &str) {
        let Some(file_name) = stored_file_name(public_path) else {
            return;
        };

        match tokio::fs::remove_file(self.dir.join(file_name)).await {
            Ok(()) => tracing::info!(file = %file_name, "Removed replaced product image"),
            Err(e) => tracing::warn!(file = %file_name, error = %e, "Could not remove product image"),
        }
    }
}

/// The lowercased extension of an acceptable image, if both the file name and
/// the declared MIME type say JPEG or PNG.
fn image_extension(file_name: &str, content_type: &str) -> Option<String> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)?;

    let content_type = content_type.to_ascii_lowercase();
    let ext_ok = ALLOWED_TYPES.contains(&ext.as_str());
    let mime_ok = ALLOWED_TYPES.iter().any(|t| content_type.contains(t));

    (ext_ok && mime_ok).then_some(ext)
}

/// The bare file name behind an `/uploads/...` path. Rejects anything that
/// could escape the upload directory.
fn stored_file_name(public_path: &str) -> Option<&str> {
    let rest = public_path
        .strip_prefix(Product::UPLOADS_PREFIX)?
        .strip_prefix('/')?;

    if rest.is_empty() || rest.contains(['/', '\\']) || rest.starts_with('.') {
        return None;
    }
    Some(rest)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension_requires_both_checks() {
        assert_eq!(
            image_extension("photo.JPG", "image/jpeg").as_deref(),
            Some("jpg")
        );
        assert_eq!(
            image_extension("photo.png", "image/png").as_deref(),
            Some("png")
        );
        assert_eq!(image_extension("photo.gif", "image/gif"), None);
        assert_eq!(image_extension("photo.png", "application/pdf"), None);
        assert_eq!(image_extension("photo.pdf", "image/png"), None);
        assert_eq!(image_extension("photo", "image/png"), None);
    }

    #[test]
    fn test_stored_file_name_rejects_escapes() {
        assert_eq!(
            stored_file_name("/uploads/product-image-1.png"),
            Some("product-image-1.png")
        );
        assert_eq!(stored_file_name("/images/sample.jpg"), None);
        assert_eq!(stored_file_name("/uploads/../secret.txt"), None);
        assert_eq!(stored_file_name("/uploads/"), None);
        assert_eq!(stored_file_name("/uploadsx/a.png"), None);
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));

        let path = store.save("k2.png", "image/png", b"\x89PNG").await.unwrap();
        assert!(path.starts_with("/uploads/product-image-"));
        assert!(path.ends_with(".png"));

        let on_disk = store.dir().join(stored_file_name(&path).unwrap());
        assert!(on_disk.exists());

        store.remove(&path).await;
        assert!(!on_disk.exists());
    }

    #[tokio::test]
    async fn test_save_rejects_wrong_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().to_path_buf());

        let err = store
            .save("notes.txt", "text/plain", b"hello")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::InvalidType));
    }
}
