//! services/api/src/web/books.rs
//!
//! Book CRUD, publishing, version history and collaborator management.

use std::sync::Arc;

use axum::{
    extract::State,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use quillwright_core::book::{BookDraft, BookPatch};
use quillwright_core::domain::{BookVersion, Collaborator};
use quillwright_core::{
    AccessMethod, Book, BookStatus, CollaboratorRole, Permissions, PortError, User,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::extract::{ApiJson, ApiPath, ApiQuery};
use crate::web::middleware::{AuthUser, Viewer};
use crate::web::response::{self, ApiResponse};
use crate::web::state::AppState;

//=========================================================================================
// Shared helpers
//=========================================================================================

/// Saves the book and refreshes the author's aggregate statistics.
pub async fn persist(state: &AppState, book: &Book) -> ApiResult<()> {
    state.db.save_book(book).await?;
    refresh_author_stats(state, book.author_id).await
}

/// Recomputes `stats` for `author_id` from the books they authored.
pub async fn refresh_author_stats(state: &AppState, author_id: Uuid) -> ApiResult<()> {
    let books = state.db.list_books_by_author(author_id).await?;
    let mut user = match state.db.get_user_by_id(author_id).await {
        Ok(user) => user,
        Err(PortError::NotFound(_)) => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    let live = books.iter().filter(|b| b.status != BookStatus::Archived);
    user.stats.books_written = 0;
    user.stats.chapters_written = 0;
    user.stats.total_words = 0;
    for book in live {
        user.stats.books_written += 1;
        user.stats.chapters_written += book.chapters.len() as u32;
        user.stats.total_words += book.word_count;
    }
    user.updated_at = Utc::now();
    state.db.update_user(&user).await?;
    Ok(())
}

/// Deletes every file a book references, best-effort.
pub async fn discard_book_files(state: &AppState, book: &Book) {
    if let Some(cover) = &book.cover_image {
        state.discard_file(stored_name(cover)).await;
    }
    for image in &book.images {
        state.discard_file(&image.filename).await;
    }
}

/// The stored file name behind a public upload URL.
pub fn stored_name(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: Option<i64>,
    /// Page size, capped at 50.
    pub limit: Option<i64>,
}

impl PageQuery {
    pub const DEFAULT_LIMIT: i64 = 12;
    pub const MAX_LIMIT: i64 = 50;

    pub fn bounds(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT);
        let page = self.page.unwrap_or(1).max(1);
        (limit, (page - 1).saturating_mul(limit))
    }
}

#[derive(Serialize)]
pub struct BookWithAccess {
    #[serde(flatten)]
    pub book: Book,
    pub access: quillwright_core::BookAccess,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SnapshotRequest {
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddCollaboratorRequest {
    /// Email of a registered user.
    pub email: String,
    #[schema(value_type = String, example = "editor")]
    pub role: CollaboratorRole,
    #[schema(value_type = Option<Object>)]
    pub permissions: Option<Permissions>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCollaboratorRequest {
    #[schema(value_type = Option<String>)]
    pub role: Option<CollaboratorRole>,
    #[schema(value_type = Option<Object>)]
    pub permissions: Option<Permissions>,
}

#[derive(Serialize)]
pub struct CollaboratorView {
    #[serde(flatten)]
    pub collaborator: Collaborator,
    pub name: String,
    pub email: String,
}

//=========================================================================================
// Book CRUD
//=========================================================================================

/// GET /api/books - Books the caller authored or collaborates on
#[utoipa::path(
    get,
    path = "/api/books",
    responses(
        (status = 200, description = "The caller's books"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_books_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<Book>>>> {
    let books = state.db.list_books_for_user(user.id).await?;
    Ok(response::ok(books))
}

/// GET /api/books/public - Published public books, newest first
#[utoipa::path(
    get,
    path = "/api/books/public",
    params(PageQuery),
    responses((status = 200, description = "A page of public books"))
)]
pub async fn list_public_books_handler(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> ApiResult<Json<ApiResponse<Vec<Book>>>> {
    let (limit, offset) = query.bounds();
    let books = state.db.list_public_books(limit, offset).await?;
    Ok(response::ok(books))
}

/// POST /api/books - Create a draft book
#[utoipa::path(
    post,
    path = "/api/books",
    responses(
        (status = 201, description = "Book created"),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn create_book_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(draft): ApiJson<BookDraft>,
) -> ApiResult<impl IntoResponse> {
    let book = Book::new(user.id, draft, Utc::now())?;
    state.db.create_book(&book).await?;
    refresh_author_stats(&state, user.id).await?;
    info!(book_id = %book.id, user_id = %user.id, "Book created");
    Ok(response::created(book))
}

/// GET /api/books/{id} - A single book with the caller's access
#[utoipa::path(
    get,
    path = "/api/books/{id}",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "The book"),
        (status = 403, description = "No access"),
        (status = 404, description = "No such book")
    )
)]
pub async fn get_book_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath(book_id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<BookWithAccess>>> {
    let (book, access) = state.load_book(book_id, viewer.0, AccessMethod::Read).await?;
    Ok(response::ok(BookWithAccess { book, access }))
}

/// PUT /api/books/{id} - Update book metadata
#[utoipa::path(
    put,
    path = "/api/books/{id}",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book updated"),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "No edit access")
    )
)]
pub async fn update_book_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath(book_id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<BookPatch>,
) -> ApiResult<Json<ApiResponse<Book>>> {
    let (mut book, access) = state.load_book(book_id, viewer.0, AccessMethod::Write).await?;
    access.require_edit()?;
    book.apply_patch(patch, Utc::now())?;
    persist(&state, &book).await?;
    Ok(response::ok(book))
}

/// DELETE /api/books/{id} - Delete a book and its files
#[utoipa::path(
    delete,
    path = "/api/books/{id}",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book deleted"),
        (status = 403, description = "Only the author may delete")
    )
)]
pub async fn delete_book_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath(book_id): ApiPath<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let (book, access) = state.load_book(book_id, viewer.0, AccessMethod::Write).await?;
    access.require_author()?;
    state.db.delete_book(book.id).await?;
    discard_book_files(&state, &book).await;
    refresh_author_stats(&state, book.author_id).await?;
    info!(book_id = %book.id, "Book deleted");
    Ok(response::message("Book deleted"))
}

//=========================================================================================
// Publishing
//=========================================================================================

/// POST /api/books/{id}/publish
#[utoipa::path(
    post,
    path = "/api/books/{id}/publish",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book published"),
        (status = 400, description = "No chapter with content"),
        (status = 403, description = "No publish permission")
    )
)]
pub async fn publish_book_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath(book_id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Book>>> {
    let (mut book, access) = state.load_book(book_id, viewer.0, AccessMethod::Write).await?;
    access.require_publish()?;
    book.publish(Utc::now())?;
    persist(&state, &book).await?;
    info!(book_id = %book.id, "Book published");
    Ok(response::ok(book))
}

/// DELETE /api/books/{id}/publish
#[utoipa::path(
    delete,
    path = "/api/books/{id}/publish",
    params(("id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book unpublished"),
        (status = 403, description = "No publish permission")
    )
)]
pub async fn unpublish_book_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath(book_id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Book>>> {
    let (mut book, access) = state.load_book(book_id, viewer.0, AccessMethod::Write).await?;
    access.require_publish()?;
    book.unpublish(Utc::now());
    persist(&state, &book).await?;
    Ok(response::ok(book))
}

//=========================================================================================
// Versions
//=========================================================================================

/// GET /api/books/{id}/versions - Version history, newest first
#[utoipa::path(
    get,
    path = "/api/books/{id}/versions",
    params(("id" = Uuid, Path, description = "Book id")),
    responses((status = 200, description = "Stored versions"))
)]
pub async fn list_versions_handler(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    ApiPath(book_id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<Vec<BookVersion>>>> {
    let (book, access) = state.load_book(book_id, viewer.0, AccessMethod::Read).await?;
    access.require_member()?;
    let mut versions = book.versions;
    versions.reverse();
    Ok(response::ok(versions))
}

/// POST /api/books/{id}/versions - Snapshot the current chapters
#[utoipa::path(
    post,
    path = "/api/books/{id}/versions",
    params(("id" = Uuid, Path, description = "Book id")),
    request_body = SnapshotRequest,
    responses((status = 201, description = "Version stored"))
)]
pub async fn create_version_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(book_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<SnapshotRequest>,
) -> ApiResult<impl IntoResponse> {
    let (mut book, access) = state.load_book(book_id, Some(user.id), AccessMethod::Write).await?;
    access.require_edit()?;
    let version = book.snapshot(user.id, req.note, Utc::now()).clone();
    persist(&state, &book).await?;
    Ok(response::created(version))
}

/// POST /api/books/{id}/versions/{version}/restore
#[utoipa::path(
    post,
    path = "/api/books/{id}/versions/{version}/restore",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("version" = u32, Path, description = "Version number")
    ),
    responses(
        (status = 200, description = "Version restored"),
        (status = 404, description = "No such version")
    )
)]
pub async fn restore_version_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath((book_id, version)): ApiPath<(Uuid, u32)>,
) -> ApiResult<Json<ApiResponse<Book>>> {
    let (mut book, access) = state.load_book(book_id, Some(user.id), AccessMethod::Write).await?;
    access.require_edit()?;
    book.restore_version(version, user.id, Utc::now())?;
    persist(&state, &book).await?;
    info!(book_id = %book.id, version, "Version restored");
    Ok(response::ok(book))
}

//=========================================================================================
// Collaborators
//=========================================================================================

async fn collaborator_view(state: &AppState, collaborator: Collaborator) -> ApiResult<CollaboratorView> {
    let user: User = state.db.get_user_by_id(collaborator.user_id).await?;
    Ok(CollaboratorView {
        collaborator,
        name: user.name,
        email: user.email,
    })
}

/// POST /api/books/{id}/collaborators - Invite a registered user
#[utoipa::path(
    post,
    path = "/api/books/{id}/collaborators",
    params(("id" = Uuid, Path, description = "Book id")),
    request_body = AddCollaboratorRequest,
    responses(
        (status = 201, description = "Collaborator added"),
        (status = 400, description = "Already a collaborator or the author"),
        (status = 403, description = "Only the author manages collaborators"),
        (status = 404, description = "No user with that email")
    )
)]
pub async fn add_collaborator_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(book_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AddCollaboratorRequest>,
) -> ApiResult<impl IntoResponse> {
    let (mut book, access) = state.load_book(book_id, Some(user.id), AccessMethod::Write).await?;
    access.require_author()?;

    let email = req.email.trim().to_lowercase();
    let invitee = match state.db.get_user_by_email(&email).await {
        Ok(creds) if creds.is_active => creds,
        Ok(_) | Err(PortError::NotFound(_)) => {
            return Err(ApiError::NotFound("User not found".to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let collaborator = book
        .add_collaborator(invitee.user_id, req.role, req.permissions, Utc::now())?
        .clone();
    state.db.save_book(&book).await?;

    let view = collaborator_view(&state, collaborator).await?;
    let inviter = state.db.get_user_by_id(user.id).await?;
    state
        .send_mail(quillwright_core::OutgoingEmail {
            to: view.email.clone(),
            subject: format!("You were invited to \"{}\"", book.title),
            text_body: format!(
                "{} added you as a collaborator on \"{}\".\n\n{}/books/{}\n",
                inviter.name,
                book.title,
                state.config.public_url.trim_end_matches('/'),
                book.id
            ),
        })
        .await;

    Ok(response::created(view))
}

/// PUT /api/books/{id}/collaborators/{user_id} - Change role or permissions
#[utoipa::path(
    put,
    path = "/api/books/{id}/collaborators/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("user_id" = Uuid, Path, description = "Collaborator's user id")
    ),
    request_body = UpdateCollaboratorRequest,
    responses(
        (status = 200, description = "Collaborator updated"),
        (status = 404, description = "Not a collaborator")
    )
)]
pub async fn update_collaborator_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath((book_id, collaborator_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<UpdateCollaboratorRequest>,
) -> ApiResult<Json<ApiResponse<CollaboratorView>>> {
    let (mut book, access) = state.load_book(book_id, Some(user.id), AccessMethod::Write).await?;
    access.require_author()?;
    let collaborator = book
        .update_collaborator(collaborator_id, req.role, req.permissions, Utc::now())?
        .clone();
    state.db.save_book(&book).await?;
    Ok(response::ok(collaborator_view(&state, collaborator).await?))
}

/// DELETE /api/books/{id}/collaborators/{user_id}
#[utoipa::path(
    delete,
    path = "/api/books/{id}/collaborators/{user_id}",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("user_id" = Uuid, Path, description = "Collaborator's user id")
    ),
    responses(
        (status = 200, description = "Collaborator removed"),
        (status = 404, description = "Not a collaborator")
    )
)]
pub async fn remove_collaborator_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath((book_id, collaborator_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let (mut book, access) = state.load_book(book_id, Some(user.id), AccessMethod::Write).await?;
    access.require_author()?;
    book.remove_collaborator(collaborator_id, Utc::now())?;
    state.db.save_book(&book).await?;
    Ok(response::message("Collaborator removed"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_bounds_are_clamped() {
        let q = PageQuery { page: None, limit: None };
        assert_eq!(q.bounds(), (12, 0));
        let q = PageQuery { page: Some(3), limit: Some(500) };
        assert_eq!(q.bounds(), (50, 100));
        let q = PageQuery { page: Some(-2), limit: Some(0) };
        assert_eq!(q.bounds(), (1, 0));
    }

    #[test]
    fn huge_page_saturates_offset() {
        let q = PageQuery { page: Some(i64::MAX), limit: Some(50) };
        assert_eq!(q.bounds(), (50, i64::MAX));
        let q = PageQuery { page: Some(i64::MAX), limit: Some(1) };
        assert_eq!(q.bounds(), (1, i64::MAX - 1));
    }

    #[test]
    fn stored_name_takes_last_segment() {
        assert_eq!(stored_name("/uploads/cover-1.jpg"), "cover-1.jpg");
        assert_eq!(stored_name("plain.jpg"), "plain.jpg");
    }
}
