//! services/api/src/web/images.rs
//!
//! Multipart image uploads for covers and illustrations, plus the shared
//! upload pipeline the avatar endpoint also uses.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use quillwright_core::{AccessMethod, Book, ImageKind};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::books::stored_name;
use crate::web::extract::{ApiMultipart, ApiPath};
use crate::web::middleware::Viewer;
use crate::web::response::{self, ApiResponse};
use crate::web::state::AppState;

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// The file part plus the optional text fields sent alongside it.
#[derive(Debug)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub caption: String,
}

/// A processed file that has been written to the store.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub name: String,
    pub url: String,
}

/// Reads the multipart form, expecting the file under `field_name`.
pub async fn read_image_upload(mut multipart: Multipart, field_name: &str) -> ApiResult<ImageUpload> {
    let mut bytes = None;
    let mut caption = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == field_name {
            let content_type = field.content_type().unwrap_or_default().to_string();
            if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
                return Err(ApiError::BadRequest(
                    "Only image files are allowed (jpeg, png, webp, gif)".to_string(),
                ));
            }
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read file bytes: {e}")))?;
            if data.len() > MAX_UPLOAD_BYTES {
                return Err(ApiError::BadRequest("File too large, the limit is 5 MB".to_string()));
            }
            bytes = Some(data.to_vec());
        } else if name == "caption" {
            caption = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read caption: {e}")))?;
        }
    }

    let bytes = bytes.ok_or_else(|| {
        ApiError::BadRequest(format!("Multipart form must include a '{field_name}' file"))
    })?;
    Ok(ImageUpload {
        bytes,
        caption: caption.trim().to_string(),
    })
}

/// Resizes and re-encodes the upload off the async runtime, then stores it.
pub async fn store_image(state: &AppState, bytes: Vec<u8>, kind: ImageKind) -> ApiResult<StoredUpload> {
    let processor = state.images.clone();
    let processed = tokio::task::spawn_blocking(move || processor.process(&bytes, kind))
        .await
        .map_err(|e| ApiError::Internal(format!("Image task failed: {e}")))?
        .map_err(|e| ApiError::BadRequest(format!("Could not process image: {e}")))?;

    let name = format!("{}-{}.{}", kind.prefix(), Uuid::new_v4(), processed.extension);
    let url = state.files.save(&name, &processed.bytes).await?;
    Ok(StoredUpload { name, url })
}

/// Saves the book; on failure the freshly written file is removed again.
async fn save_or_discard(state: &AppState, book: &Book, upload: &StoredUpload) -> ApiResult<()> {
    if let Err(e) = state.db.save_book(book).await {
        warn!(file = %upload.name, "Book save failed after upload, discarding file");
        state.discard_file(&upload.name).await;
        return Err(e.into());
    }
    Ok(())
}

/// POST /api/books/{id}/cover - Upload or replace the cover
#[utoipa::path(
    post,
    path = "/api/books/{id}/cover",
    params(("id" = Uuid, Path, description = "Book id")),
    request_body(content_type = "multipart/form-data", description = "Image in the `cover` field."),
    responses(
        (status = 200, description = "Cover stored"),
        (status = 400, description = "Missing, oversized or non-image file"),
        (status = 403, description = "No edit access")
    )
)]
pub async fn upload_cover_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath(book_id): ApiPath<Uuid>,
    ApiMultipart(multipart): ApiMultipart,
) -> ApiResult<Json<ApiResponse<Book>>> {
    let (mut book, access) = state.load_book(book_id, viewer.0, AccessMethod::Write).await?;
    access.require_edit()?;

    let upload = read_image_upload(multipart, "cover").await?;
    let stored = store_image(&state, upload.bytes, ImageKind::Cover).await?;
    let previous = book.set_cover(stored.url.clone(), Utc::now());
    save_or_discard(&state, &book, &stored).await?;

    if let Some(previous) = previous {
        state.discard_file(stored_name(&previous)).await;
    }
    info!(book_id = %book.id, file = %stored.name, "Cover updated");
    Ok(response::ok(book))
}

/// POST /api/books/{id}/images - Add an illustration
#[utoipa::path(
    post,
    path = "/api/books/{id}/images",
    params(("id" = Uuid, Path, description = "Book id")),
    request_body(content_type = "multipart/form-data", description = "Image in the `image` field, optional `caption`."),
    responses(
        (status = 201, description = "Image stored"),
        (status = 400, description = "Missing, oversized or non-image file")
    )
)]
pub async fn upload_image_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath(book_id): ApiPath<Uuid>,
    ApiMultipart(multipart): ApiMultipart,
) -> ApiResult<impl IntoResponse> {
    let (mut book, access) = state.load_book(book_id, viewer.0, AccessMethod::Write).await?;
    access.require_edit()?;

    let upload = read_image_upload(multipart, "image").await?;
    let stored = store_image(&state, upload.bytes, ImageKind::Illustration).await?;
    let image = book
        .add_image(stored.url.clone(), stored.name.clone(), upload.caption, Utc::now())
        .clone();
    save_or_discard(&state, &book, &stored).await?;
    Ok(response::created(image))
}

/// DELETE /api/books/{id}/images/{image_id}
#[utoipa::path(
    delete,
    path = "/api/books/{id}/images/{image_id}",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("image_id" = Uuid, Path, description = "Image id")
    ),
    responses(
        (status = 200, description = "Image removed"),
        (status = 404, description = "No such image")
    )
)]
pub async fn delete_image_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((book_id, image_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let (mut book, access) = state.load_book(book_id, viewer.0, AccessMethod::Write).await?;
    access.require_delete()?;
    let removed = book.remove_image(image_id, Utc::now())?;
    state.db.save_book(&book).await?;
    state.discard_file(&removed.filename).await;
    Ok(response::message("Image deleted"))
}
