//! services/api/src/web/export.rs
//!
//! Book export as a file download.

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};
use quillwright_core::text::slugify;
use quillwright_core::{AccessMethod, ExportDocument, ExportFormat, ExportOptions, PortError};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::extract::{ApiPath, ApiQuery};
use crate::web::middleware::Viewer;
use crate::web::state::AppState;

/// GET /api/export/books/{id}/{format} - Download the book as pdf, docx or txt
#[utoipa::path(
    get,
    path = "/api/export/books/{id}/{format}",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("format" = String, Path, description = "pdf, docx or txt"),
        ("include_cover" = Option<bool>, Query, description = "Title page, default true"),
        ("include_toc" = Option<bool>, Query, description = "Table of contents, default true"),
        ("include_chapter_numbers" = Option<bool>, Query, description = "Prefix headings with the chapter number, default true"),
        ("font_size" = Option<u8>, Query, description = "Body font size for pdf and docx, 8 to 24, default 12")
    ),
    responses(
        (status = 200, description = "The exported file"),
        (status = 400, description = "Unknown format or no chapter with content"),
        (status = 403, description = "No access"),
        (status = 404, description = "No such book")
    )
)]
pub async fn export_book_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((book_id, format)): ApiPath<(Uuid, String)>,
    ApiQuery(options): ApiQuery<ExportOptions>,
) -> ApiResult<impl IntoResponse> {
    let (book, _) = state.load_book(book_id, viewer.0, AccessMethod::Read).await?;
    let format: ExportFormat = format.parse()?;

    let author = match state.db.get_user_by_id(book.author_id).await {
        Ok(user) => user.name,
        Err(PortError::NotFound(_)) => "Unknown author".to_string(),
        Err(e) => return Err(e.into()),
    };
    let document = ExportDocument::from_book(&book, &author, options)?;

    let renderer = state.renderer(format);
    let bytes = tokio::task::spawn_blocking(move || renderer.render(&document))
        .await
        .map_err(|e| ApiError::Internal(format!("Export task failed: {e}")))??;

    let filename = format!("{}.{}", slugify(&book.title), format.extension());
    info!(book_id = %book.id, %filename, size = bytes.len(), "Book exported");
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}
