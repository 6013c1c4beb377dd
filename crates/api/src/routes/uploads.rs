//! Product image upload.

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::services::UploadError;
use crate::state::AppState;

/// Largest accepted request body for an upload.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Multipart field carrying the file.
const FIELD_NAME: &str = "image";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub image: String,
}

/// `POST /api/upload`
pub async fn upload_image(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(FIELD_NAME) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_owned();
        let content_type = field.content_type().unwrap_or_default().to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        if file_name.is_empty() || bytes.is_empty() {
            break;
        }

        let image = state
            .uploads()
            .save(&file_name, &content_type, &bytes)
            .await?;

        tracing::info!(admin_id = %admin.id, image = %image, "Product image uploaded");
        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                message: "Image uploaded successfully",
                image,
            }),
        ));
    }

    Err(UploadError::MissingFile.into())
}
