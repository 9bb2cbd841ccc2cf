//! services/api/src/web/chapters.rs
//!
//! Chapter endpoints. Every write recomputes the book's derived counters
//! through the aggregate before it is saved.

use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use quillwright_core::book::{ChapterDraft, ChapterPatch};
use quillwright_core::{AccessMethod, Chapter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::web::books::persist;
use crate::web::extract::{ApiJson, ApiPath};
use crate::web::middleware::Viewer;
use crate::web::response::{self, ApiResponse};
use crate::web::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReorderRequest {
    /// Every chapter id of the book, in the new order.
    pub chapter_ids: Vec<Uuid>,
}

/// A chapter together with the book totals it changed.
#[derive(Serialize)]
pub struct ChapterWithTotals {
    pub chapter: Chapter,
    pub book_word_count: u64,
    pub book_reading_time: u32,
    pub book_progress: u8,
}

/// GET /api/books/{id}/chapters - Chapters in reading order
#[utoipa::path(
    get,
    path = "/api/books/{id}/chapters",
    params(("id" = Uuid, Path, description = "Book id")),
    responses((status = 200, description = "Chapters ordered by `order`"))
)]
pub async fn list_chapters_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath(book_id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Vec<Chapter>>>> {
    let (book, _) = state.load_book(book_id, viewer.0, AccessMethod::Read).await?;
    let chapters = book.ordered_chapters().into_iter().cloned().collect();
    Ok(response::ok(chapters))
}

/// POST /api/books/{id}/chapters - Append a chapter
#[utoipa::path(
    post,
    path = "/api/books/{id}/chapters",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 201, description = "Chapter added"),
        (status = 403, description = "No edit access")
    )
)]
pub async fn create_chapter_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath(book_id): ApiPath<Uuid>,
    ApiJson(draft): ApiJson<ChapterDraft>,
) -> ApiResult<impl IntoResponse> {
    let (mut book, access) = state.load_book(book_id, viewer.0, AccessMethod::Write).await?;
    access.require_edit()?;
    let chapter = book.add_chapter(draft, Utc::now())?.clone();
    persist(&state, &book).await?;
    Ok(response::created(ChapterWithTotals {
        chapter,
        book_word_count: book.word_count,
        book_reading_time: book.reading_time,
        book_progress: book.progress,
    }))
}

/// GET /api/books/{id}/chapters/{chapter_id}
#[utoipa::path(
    get,
    path = "/api/books/{id}/chapters/{chapter_id}",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("chapter_id" = Uuid, Path, description = "Chapter id")
    ),
    responses(
        (status = 200, description = "The chapter"),
        (status = 404, description = "No such chapter")
    )
)]
pub async fn get_chapter_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((book_id, chapter_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<ApiResponse<Chapter>>> {
    let (book, _) = state.load_book(book_id, viewer.0, AccessMethod::Read).await?;
    Ok(response::ok(book.chapter(chapter_id)?.clone()))
}

/// PUT /api/books/{id}/chapters/{chapter_id}
#[utoipa::path(
    put,
    path = "/api/books/{id}/chapters/{chapter_id}",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("chapter_id" = Uuid, Path, description = "Chapter id")
    ),
    responses(
        (status = 200, description = "Chapter updated"),
        (status = 403, description = "No edit access"),
        (status = 404, description = "No such chapter")
    )
)]
pub async fn update_chapter_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((book_id, chapter_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(patch): ApiJson<ChapterPatch>,
) -> ApiResult<Json<ApiResponse<ChapterWithTotals>>> {
    let (mut book, access) = state.load_book(book_id, viewer.0, AccessMethod::Write).await?;
    access.require_edit()?;
    let chapter = book.update_chapter(chapter_id, patch, Utc::now())?.clone();
    persist(&state, &book).await?;
    Ok(response::ok(ChapterWithTotals {
        chapter,
        book_word_count: book.word_count,
        book_reading_time: book.reading_time,
        book_progress: book.progress,
    }))
}

/// DELETE /api/books/{id}/chapters/{chapter_id} - Remove and renumber
#[utoipa::path(
    delete,
    path = "/api/books/{id}/chapters/{chapter_id}",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("chapter_id" = Uuid, Path, description = "Chapter id")
    ),
    responses(
        (status = 200, description = "Chapter removed"),
        (status = 404, description = "No such chapter")
    )
)]
pub async fn delete_chapter_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((book_id, chapter_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let (mut book, access) = state.load_book(book_id, viewer.0, AccessMethod::Write).await?;
    access.require_delete()?;
    book.remove_chapter(chapter_id, Utc::now())?;
    persist(&state, &book).await?;
    Ok(response::message("Chapter deleted"))
}

/// PUT /api/books/{id}/chapters/reorder - Apply a full new order
#[utoipa::path(
    put,
    path = "/api/books/{id}/chapters/reorder",
    params(("id" = Uuid, Path, description = "Book id")),
    request_body = ReorderRequest,
    responses(
        (status = 200, description = "Chapters reordered"),
        (status = 400, description = "Not a permutation of the book's chapters")
    )
)]
pub async fn reorder_chapters_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath(book_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<ReorderRequest>,
) -> ApiResult<Json<ApiResponse<Vec<Chapter>>>> {
    let (mut book, access) = state.load_book(book_id, viewer.0, AccessMethod::Write).await?;
    access.require_edit()?;
    book.reorder_chapters(&req.chapter_ids, Utc::now())?;
    state.db.save_book(&book).await?;
    let chapters = book.ordered_chapters().into_iter().cloned().collect();
    Ok(response::ok(chapters))
}
