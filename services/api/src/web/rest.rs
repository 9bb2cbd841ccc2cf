//! services/api/src/web/rest.rs
//!
//! The health endpoint and the master OpenAPI document.

use crate::web::state::AppState;
use crate::web::{ai, auth, books, chapters, content, export, images, users};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        auth::change_password_handler,
        auth::forgot_password_handler,
        auth::reset_password_handler,
        users::get_me_handler,
        users::update_me_handler,
        users::update_preferences_handler,
        users::update_settings_handler,
        users::stats_handler,
        users::upload_avatar_handler,
        users::deactivate_handler,
        users::public_profile_handler,
        books::list_books_handler,
        books::list_public_books_handler,
        books::create_book_handler,
        books::get_book_handler,
        books::update_book_handler,
        books::delete_book_handler,
        books::publish_book_handler,
        books::unpublish_book_handler,
        books::list_versions_handler,
        books::create_version_handler,
        books::restore_version_handler,
        books::add_collaborator_handler,
        books::update_collaborator_handler,
        books::remove_collaborator_handler,
        chapters::list_chapters_handler,
        chapters::create_chapter_handler,
        chapters::get_chapter_handler,
        chapters::update_chapter_handler,
        chapters::delete_chapter_handler,
        chapters::reorder_chapters_handler,
        content::create_character_handler,
        content::update_character_handler,
        content::delete_character_handler,
        content::create_setting_handler,
        content::update_setting_handler,
        content::delete_setting_handler,
        content::create_plot_point_handler,
        content::update_plot_point_handler,
        content::delete_plot_point_handler,
        images::upload_cover_handler,
        images::upload_image_handler,
        images::delete_image_handler,
        ai::continue_chapter_handler,
        ai::rewrite_chapter_handler,
        ai::outline_handler,
        ai::character_handler,
        ai::plot_ideas_handler,
        ai::usage_handler,
        export::export_book_handler,
    ),
    components(
        schemas(
            HealthResponse,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::ChangePasswordRequest,
            auth::ForgotPasswordRequest,
            auth::ResetPasswordRequest,
            users::UpdateProfileRequest,
            users::UpdatePreferencesRequest,
            users::UpdateSettingsRequest,
            books::SnapshotRequest,
            books::AddCollaboratorRequest,
            books::UpdateCollaboratorRequest,
            chapters::ReorderRequest,
            ai::InstructionRequest,
            ai::CharacterRequest,
            crate::web::response::Message,
        )
    ),
    tags(
        (name = "Quillwright API", description = "Book authoring with AI assistance and export.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Health
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    version: String,
    database: String,
}

/// Liveness plus database reachability.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service and database are up", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, database) = match state.db.ping().await {
        Ok(()) => (StatusCode::OK, "connected"),
        Err(e) => {
            warn!("Health check database ping failed: {e}");
            (StatusCode::SERVICE_UNAVAILABLE, "unreachable")
        }
    };
    let body = HealthResponse {
        status: if status.is_success() { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
    };
    (status, Json(body))
}
