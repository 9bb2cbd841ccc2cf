//! services/api/src/web/content.rs
//!
//! Story bible endpoints: characters, settings and plot points.

use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use quillwright_core::book::{CharacterInput, PlotPointInput, SettingInput};
use quillwright_core::domain::{Character, PlotPoint, Setting};
use quillwright_core::{AccessMethod, Book, BookAccess};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::web::extract::{ApiJson, ApiPath};
use crate::web::middleware::Viewer;
use crate::web::response::{self, ApiResponse};
use crate::web::state::AppState;

async fn editable_book(state: &AppState, book_id: Uuid, viewer: Viewer) -> ApiResult<(Book, BookAccess)> {
    let (book, access) = state.load_book(book_id, viewer.0, AccessMethod::Write).await?;
    access.require_edit()?;
    Ok((book, access))
}

//=========================================================================================
// Characters
//=========================================================================================

/// POST /api/books/{id}/characters
#[utoipa::path(
    post,
    path = "/api/books/{id}/characters",
    params(("id" = Uuid, Path, description = "Book id")),
    responses((status = 201, description = "Character added"))
)]
pub async fn create_character_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath(book_id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<CharacterInput>,
) -> ApiResult<impl IntoResponse> {
    let (mut book, _) = editable_book(&state, book_id, viewer).await?;
    let character = book.add_character(input, Utc::now())?.clone();
    state.db.save_book(&book).await?;
    Ok(response::created(character))
}

/// PUT /api/books/{id}/characters/{item_id}
#[utoipa::path(
    put,
    path = "/api/books/{id}/characters/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("item_id" = Uuid, Path, description = "Character id")
    ),
    responses(
        (status = 200, description = "Character updated"),
        (status = 404, description = "No such character")
    )
)]
pub async fn update_character_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((book_id, item_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(input): ApiJson<CharacterInput>,
) -> ApiResult<Json<ApiResponse<Character>>> {
    let (mut book, _) = editable_book(&state, book_id, viewer).await?;
    let character = book.update_character(item_id, input, Utc::now())?.clone();
    state.db.save_book(&book).await?;
    Ok(response::ok(character))
}

/// DELETE /api/books/{id}/characters/{item_id}
#[utoipa::path(
    delete,
    path = "/api/books/{id}/characters/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("item_id" = Uuid, Path, description = "Character id")
    ),
    responses((status = 200, description = "Character removed"))
)]
pub async fn delete_character_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((book_id, item_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let (mut book, _) = editable_book(&state, book_id, viewer).await?;
    book.remove_character(item_id, Utc::now())?;
    state.db.save_book(&book).await?;
    Ok(response::message("Character deleted"))
}

//=========================================================================================
// Settings
//=========================================================================================

/// POST /api/books/{id}/settings
#[utoipa::path(
    post,
    path = "/api/books/{id}/settings",
    params(("id" = Uuid, Path, description = "Book id")),
    responses((status = 201, description = "Setting added"))
)]
pub async fn create_setting_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath(book_id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<SettingInput>,
) -> ApiResult<impl IntoResponse> {
    let (mut book, _) = editable_book(&state, book_id, viewer).await?;
    let setting = book.add_setting(input, Utc::now())?.clone();
    state.db.save_book(&book).await?;
    Ok(response::created(setting))
}

/// PUT /api/books/{id}/settings/{item_id}
#[utoipa::path(
    put,
    path = "/api/books/{id}/settings/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("item_id" = Uuid, Path, description = "Setting id")
    ),
    responses((status = 200, description = "Setting updated"))
)]
pub async fn update_setting_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((book_id, item_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(input): ApiJson<SettingInput>,
) -> ApiResult<Json<ApiResponse<Setting>>> {
    let (mut book, _) = editable_book(&state, book_id, viewer).await?;
    let setting = book.update_setting(item_id, input, Utc::now())?.clone();
    state.db.save_book(&book).await?;
    Ok(response::ok(setting))
}

/// DELETE /api/books/{id}/settings/{item_id}
#[utoipa::path(
    delete,
    path = "/api/books/{id}/settings/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("item_id" = Uuid, Path, description = "Setting id")
    ),
    responses((status = 200, description = "Setting removed"))
)]
pub async fn delete_setting_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((book_id, item_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let (mut book, _) = editable_book(&state, book_id, viewer).await?;
    book.remove_setting(item_id, Utc::now())?;
    state.db.save_book(&book).await?;
    Ok(response::message("Setting deleted"))
}

//=========================================================================================
// Plot points
//=========================================================================================

/// POST /api/books/{id}/plot-points
#[utoipa::path(
    post,
    path = "/api/books/{id}/plot-points",
    params(("id" = Uuid, Path, description = "Book id")),
    responses((status = 201, description = "Plot point appended"))
)]
pub async fn create_plot_point_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath(book_id): ApiPath<Uuid>,
    ApiJson(input): ApiJson<PlotPointInput>,
) -> ApiResult<impl IntoResponse> {
    let (mut book, _) = editable_book(&state, book_id, viewer).await?;
    let point = book.add_plot_point(input, Utc::now())?.clone();
    state.db.save_book(&book).await?;
    Ok(response::created(point))
}

/// PUT /api/books/{id}/plot-points/{item_id}
#[utoipa::path(
    put,
    path = "/api/books/{id}/plot-points/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("item_id" = Uuid, Path, description = "Plot point id")
    ),
    responses((status = 200, description = "Plot point updated"))
)]
pub async fn update_plot_point_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((book_id, item_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(input): ApiJson<PlotPointInput>,
) -> ApiResult<Json<ApiResponse<PlotPoint>>> {
    let (mut book, _) = editable_book(&state, book_id, viewer).await?;
    let point = book.update_plot_point(item_id, input, Utc::now())?.clone();
    state.db.save_book(&book).await?;
    Ok(response::ok(point))
}

/// DELETE /api/books/{id}/plot-points/{item_id}
#[utoipa::path(
    delete,
    path = "/api/books/{id}/plot-points/{item_id}",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("item_id" = Uuid, Path, description = "Plot point id")
    ),
    responses((status = 200, description = "Plot point removed"))
)]
pub async fn delete_plot_point_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath((book_id, item_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let (mut book, _) = editable_book(&state, book_id, viewer).await?;
    book.remove_plot_point(item_id, Utc::now())?;
    state.db.save_book(&book).await?;
    Ok(response::message("Plot point deleted"))
}
