//! services/api/src/web/users.rs
//!
//! Profile, preferences, settings, statistics, avatar and account
//! deactivation, plus the public author profile.

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use quillwright_core::domain::{AccountSettings, ReadingPreferences, Theme, UserStats};
use quillwright_core::{Book, BookStatus, ImageKind, User, Visibility};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::auth::validate_name;
use crate::web::books::stored_name;
use crate::web::extract::{ApiJson, ApiMultipart, ApiPath};
use crate::web::images::{read_image_upload, store_image};
use crate::web::middleware::AuthUser;
use crate::web::response::{self, ApiResponse};
use crate::web::state::AppState;
use crate::web::token::clear_auth_cookie;

pub const MAX_BIO_LEN: usize = 500;

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePreferencesRequest {
    pub font_size: Option<u8>,
    #[schema(value_type = Option<String>, example = "dark")]
    pub theme: Option<Theme>,
    pub line_spacing: Option<f32>,
    pub default_genre: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSettingsRequest {
    pub email_notifications: Option<bool>,
    pub public_profile: Option<bool>,
    pub autosave_interval_secs: Option<u32>,
}

/// What anyone may see about an author who opted into a public profile.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub name: String,
    pub avatar: Option<String>,
    pub bio: String,
    pub stats: UserStats,
    pub published_books: Vec<PublishedBook>,
    pub member_since: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct PublishedBook {
    pub id: Uuid,
    pub title: String,
    pub genre: String,
    pub cover_image: Option<String>,
    pub word_count: u64,
    pub published_at: Option<DateTime<Utc>>,
}

impl From<&Book> for PublishedBook {
    fn from(book: &Book) -> Self {
        Self {
            id: book.id,
            title: book.title.clone(),
            genre: book.genre.clone(),
            cover_image: book.cover_image.clone(),
            word_count: book.word_count,
            published_at: book.published_at,
        }
    }
}

//=========================================================================================
// Validation
//=========================================================================================

fn apply_preferences(prefs: &mut ReadingPreferences, req: UpdatePreferencesRequest) -> ApiResult<()> {
    if let Some(font_size) = req.font_size {
        if !(10..=32).contains(&font_size) {
            return Err(ApiError::BadRequest("Font size must be between 10 and 32".to_string()));
        }
        prefs.font_size = font_size;
    }
    if let Some(theme) = req.theme {
        prefs.theme = theme;
    }
    if let Some(spacing) = req.line_spacing {
        if !(1.0..=3.0).contains(&spacing) {
            return Err(ApiError::BadRequest("Line spacing must be between 1 and 3".to_string()));
        }
        prefs.line_spacing = spacing;
    }
    if let Some(genre) = req.default_genre {
        let genre = genre.trim();
        prefs.default_genre = (!genre.is_empty()).then(|| genre.to_string());
    }
    Ok(())
}

fn apply_settings(settings: &mut AccountSettings, req: UpdateSettingsRequest) -> ApiResult<()> {
    if let Some(v) = req.email_notifications {
        settings.email_notifications = v;
    }
    if let Some(v) = req.public_profile {
        settings.public_profile = v;
    }
    if let Some(secs) = req.autosave_interval_secs {
        if !(5..=600).contains(&secs) {
            return Err(ApiError::BadRequest(
                "Autosave interval must be between 5 and 600 seconds".to_string(),
            ));
        }
        settings.autosave_interval_secs = secs;
    }
    Ok(())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/users/me
#[utoipa::path(
    get,
    path = "/api/users/me",
    responses((status = 200, description = "The caller's profile"))
)]
pub async fn get_me_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<ApiResponse<User>>> {
    Ok(response::ok(state.db.get_user_by_id(user.id).await?))
}

/// PUT /api/users/me - Update name and bio
#[utoipa::path(
    put,
    path = "/api/users/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated"),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn update_me_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let mut account = state.db.get_user_by_id(user.id).await?;
    if let Some(name) = req.name {
        account.name = validate_name(&name)?;
    }
    if let Some(bio) = req.bio {
        if bio.chars().count() > MAX_BIO_LEN {
            return Err(ApiError::BadRequest(format!(
                "Bio must be at most {MAX_BIO_LEN} characters"
            )));
        }
        account.bio = bio.trim().to_string();
    }
    account.updated_at = Utc::now();
    state.db.update_user(&account).await?;
    Ok(response::ok(account))
}

/// PUT /api/users/me/preferences
#[utoipa::path(
    put,
    path = "/api/users/me/preferences",
    request_body = UpdatePreferencesRequest,
    responses((status = 200, description = "Preferences updated"))
)]
pub async fn update_preferences_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<UpdatePreferencesRequest>,
) -> ApiResult<Json<ApiResponse<ReadingPreferences>>> {
    let mut account = state.db.get_user_by_id(user.id).await?;
    apply_preferences(&mut account.preferences, req)?;
    account.updated_at = Utc::now();
    state.db.update_user(&account).await?;
    Ok(response::ok(account.preferences))
}

/// PUT /api/users/me/settings
#[utoipa::path(
    put,
    path = "/api/users/me/settings",
    request_body = UpdateSettingsRequest,
    responses((status = 200, description = "Settings updated"))
)]
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<UpdateSettingsRequest>,
) -> ApiResult<Json<ApiResponse<AccountSettings>>> {
    let mut account = state.db.get_user_by_id(user.id).await?;
    apply_settings(&mut account.settings, req)?;
    account.updated_at = Utc::now();
    state.db.update_user(&account).await?;
    Ok(response::ok(account.settings))
}

/// GET /api/users/me/stats
#[utoipa::path(
    get,
    path = "/api/users/me/stats",
    responses((status = 200, description = "Writing statistics"))
)]
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<ApiResponse<UserStats>>> {
    crate::web::books::refresh_author_stats(&state, user.id).await?;
    let account = state.db.get_user_by_id(user.id).await?;
    Ok(response::ok(account.stats))
}

/// POST /api/users/me/avatar
#[utoipa::path(
    post,
    path = "/api/users/me/avatar",
    request_body(content_type = "multipart/form-data", description = "Image in the `avatar` field."),
    responses(
        (status = 200, description = "Avatar stored"),
        (status = 400, description = "Missing, oversized or non-image file")
    )
)]
pub async fn upload_avatar_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiMultipart(multipart): ApiMultipart,
) -> ApiResult<Json<ApiResponse<User>>> {
    let mut account = state.db.get_user_by_id(user.id).await?;
    let upload = read_image_upload(multipart, "avatar").await?;
    let stored = store_image(&state, upload.bytes, ImageKind::Avatar).await?;

    let previous = account.avatar.replace(stored.url.clone());
    account.updated_at = Utc::now();
    if let Err(e) = state.db.update_user(&account).await {
        warn!(file = %stored.name, "Profile save failed after upload, discarding file");
        state.discard_file(&stored.name).await;
        return Err(e.into());
    }
    if let Some(previous) = previous {
        state.discard_file(stored_name(&previous)).await;
    }
    Ok(response::ok(account))
}

/// DELETE /api/users/me - Deactivate the account and archive authored books
#[utoipa::path(
    delete,
    path = "/api/users/me",
    responses((status = 200, description = "Account deactivated"))
)]
pub async fn deactivate_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();
    for mut book in state.db.list_books_by_author(user.id).await? {
        if book.status != BookStatus::Archived {
            book.archive(now);
            state.db.save_book(&book).await?;
        }
    }
    state.db.deactivate_user(user.id).await?;
    info!(user_id = %user.id, "Account deactivated");
    Ok((
        [(header::SET_COOKIE, clear_auth_cookie())],
        response::message("Account deactivated"),
    ))
}

/// GET /api/users/{id} - Public author profile
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Public profile"),
        (status = 404, description = "No such user or profile is private")
    )
)]
pub async fn public_profile_handler(
    State(state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> ApiResult<Json<ApiResponse<PublicProfile>>> {
    let not_found = || ApiError::NotFound("User not found".to_string());
    let account = state.db.get_user_by_id(user_id).await.map_err(|_| not_found())?;
    if !account.is_active || !account.settings.public_profile {
        return Err(not_found());
    }

    let published_books = state
        .db
        .list_books_by_author(user_id)
        .await?
        .iter()
        .filter(|b| b.status == BookStatus::Published && b.visibility == Visibility::Public)
        .map(PublishedBook::from)
        .collect();

    Ok(response::ok(PublicProfile {
        id: account.id,
        name: account.name,
        avatar: account.avatar,
        bio: account.bio,
        stats: account.stats,
        published_books,
        member_since: account.created_at,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferences_are_validated() {
        let mut prefs = ReadingPreferences::default();
        let bad = UpdatePreferencesRequest {
            font_size: Some(4),
            theme: None,
            line_spacing: None,
            default_genre: None,
        };
        assert!(apply_preferences(&mut prefs, bad).is_err());
        assert_eq!(prefs, ReadingPreferences::default());

        let good = UpdatePreferencesRequest {
            font_size: Some(18),
            theme: Some(Theme::Sepia),
            line_spacing: Some(2.0),
            default_genre: Some("  ".to_string()),
        };
        apply_preferences(&mut prefs, good).unwrap();
        assert_eq!(prefs.font_size, 18);
        assert_eq!(prefs.theme, Theme::Sepia);
        assert_eq!(prefs.default_genre, None);
    }

    #[test]
    fn settings_bound_autosave_interval() {
        let mut settings = AccountSettings::default();
        let req = UpdateSettingsRequest {
            email_notifications: None,
            public_profile: Some(true),
            autosave_interval_secs: Some(1),
        };
        assert!(apply_settings(&mut settings, req).is_err());

        let req = UpdateSettingsRequest {
            email_notifications: Some(false),
            public_profile: Some(true),
            autosave_interval_secs: Some(60),
        };
        apply_settings(&mut settings, req).unwrap();
        assert!(settings.public_profile);
        assert!(!settings.email_notifications);
        assert_eq!(settings.autosave_interval_secs, 60);
    }
}
