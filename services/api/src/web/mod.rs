pub mod ai;
pub mod auth;
pub mod books;
pub mod chapters;
pub mod content;
pub mod export;
pub mod extract;
pub mod images;
pub mod middleware;
pub mod rate_limit;
pub mod response;
pub mod rest;
pub mod state;
pub mod token;
pub mod users;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::web::middleware::{authenticate, require_auth};
use crate::web::state::AppState;

/// Request bodies above this are rejected before a handler runs. Leaves room
/// for multipart framing around a maximum-size image.
pub const MAX_BODY_BYTES: usize = images::MAX_UPLOAD_BYTES + 1024 * 1024;

/// Builds the application router. Rate limiting is optional so tests can
/// drive the router without peer addresses.
pub fn build_router(state: Arc<AppState>, rate_limited: bool) -> Router {
    // --- Auth: open endpoints, behind the stricter limiter ---
    let mut auth_open = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/forgot-password", post(auth::forgot_password_handler))
        .route("/auth/reset-password", post(auth::reset_password_handler));
    if rate_limited {
        if let Some(limiter) = rate_limit::auth_rate_limiter() {
            auth_open = auth_open.layer(limiter);
        }
    }

    // --- Routes that always need a logged-in user ---
    let protected = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/auth/password", put(auth::change_password_handler))
        .route(
            "/users/me",
            get(users::get_me_handler)
                .put(users::update_me_handler)
                .delete(users::deactivate_handler),
        )
        .route("/users/me/preferences", put(users::update_preferences_handler))
        .route("/users/me/settings", put(users::update_settings_handler))
        .route("/users/me/stats", get(users::stats_handler))
        .route("/users/me/avatar", post(users::upload_avatar_handler))
        .route(
            "/ai/books/{id}/chapters/{chapter_id}/continue",
            post(ai::continue_chapter_handler),
        )
        .route(
            "/ai/books/{id}/chapters/{chapter_id}/rewrite",
            post(ai::rewrite_chapter_handler),
        )
        .route("/ai/books/{id}/outline", post(ai::outline_handler))
        .route("/ai/books/{id}/characters", post(ai::character_handler))
        .route("/ai/books/{id}/plot-ideas", post(ai::plot_ideas_handler))
        .route("/ai/usage", get(ai::usage_handler))
        .route_layer(axum_middleware::from_fn(require_auth));

    // --- Book routes: public readers allowed where the access check says so ---
    let books = Router::new()
        .route(
            "/books",
            get(books::list_books_handler).post(books::create_book_handler),
        )
        .route("/books/public", get(books::list_public_books_handler))
        .route(
            "/books/{id}",
            get(books::get_book_handler)
                .put(books::update_book_handler)
                .delete(books::delete_book_handler),
        )
        .route(
            "/books/{id}/publish",
            post(books::publish_book_handler).delete(books::unpublish_book_handler),
        )
        .route("/books/{id}/cover", post(images::upload_cover_handler))
        .route(
            "/books/{id}/chapters",
            get(chapters::list_chapters_handler).post(chapters::create_chapter_handler),
        )
        .route(
            "/books/{id}/chapters/reorder",
            put(chapters::reorder_chapters_handler),
        )
        .route(
            "/books/{id}/chapters/{chapter_id}",
            get(chapters::get_chapter_handler)
                .put(chapters::update_chapter_handler)
                .delete(chapters::delete_chapter_handler),
        )
        .route("/books/{id}/characters", post(content::create_character_handler))
        .route(
            "/books/{id}/characters/{item_id}",
            put(content::update_character_handler).delete(content::delete_character_handler),
        )
        .route("/books/{id}/settings", post(content::create_setting_handler))
        .route(
            "/books/{id}/settings/{item_id}",
            put(content::update_setting_handler).delete(content::delete_setting_handler),
        )
        .route("/books/{id}/plot-points", post(content::create_plot_point_handler))
        .route(
            "/books/{id}/plot-points/{item_id}",
            put(content::update_plot_point_handler).delete(content::delete_plot_point_handler),
        )
        .route("/books/{id}/images", post(images::upload_image_handler))
        .route(
            "/books/{id}/images/{image_id}",
            axum::routing::delete(images::delete_image_handler),
        )
        .route(
            "/books/{id}/versions",
            get(books::list_versions_handler).post(books::create_version_handler),
        )
        .route(
            "/books/{id}/versions/{version}/restore",
            post(books::restore_version_handler),
        )
        .route(
            "/books/{id}/collaborators",
            post(books::add_collaborator_handler),
        )
        .route(
            "/books/{id}/collaborators/{user_id}",
            put(books::update_collaborator_handler).delete(books::remove_collaborator_handler),
        )
        .route(
            "/export/books/{id}/{format}",
            get(export::export_book_handler),
        )
        .route("/users/{id}", get(users::public_profile_handler))
        .route("/health", get(rest::health_handler));

    let mut api = Router::new()
        .merge(auth_open)
        .merge(protected)
        .merge(books)
        .layer(axum_middleware::from_fn_with_state(state.clone(), authenticate));
    if rate_limited {
        if let Some(limiter) = rate_limit::api_rate_limiter(state.config.rate_limit_per_minute) {
            api = api.layer(limiter);
        }
    }

    Router::new()
        .nest("/api", api)
        .nest_service("/uploads", ServeDir::new(&state.config.upload_dir))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
