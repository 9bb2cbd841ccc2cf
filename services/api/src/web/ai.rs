//! services/api/src/web/ai.rs
//!
//! AI writing assistance. Each call checks access to the book, charges the
//! caller's daily quota, then asks the model and applies the result.

use std::sync::Arc;

use axum::{
    extract::State,
    Json,
};
use chrono::{Local, NaiveDate, Utc};
use quillwright_core::book::{ChapterPatch, CharacterInput, PlotPointInput};
use quillwright_core::domain::{Character, PlotPoint};
use quillwright_core::prompt::{build_prompt, GenerationKind};
use quillwright_core::quota::UsageReport;
use quillwright_core::text::to_html_paragraphs;
use quillwright_core::{AccessMethod, Book, Chapter};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::books::persist;
use crate::web::extract::{ApiJson, ApiPath};
use crate::web::middleware::AuthUser;
use crate::web::response::{self, ApiResponse};
use crate::web::state::AppState;

const MAX_PLOT_IDEAS: usize = 10;

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct InstructionRequest {
    /// Free-form direction for the model.
    #[serde(default)]
    pub instruction: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CharacterRequest {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub instruction: String,
}

/// What the model produced, what it changed, and the caller's remaining quota.
#[derive(Debug, Serialize)]
pub struct Generated<T> {
    pub generated: String,
    pub result: T,
    pub remaining: u32,
}

//=========================================================================================
// Shared pipeline
//=========================================================================================

/// The server's local calendar date; quotas reset when it changes.
fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Loads the book with edit access and charges one call to the caller's quota.
/// When `chapter_id` is given the chapter must exist before anything is charged.
///
/// The usage counter is saved before the model is called, so a failed call
/// still counts.
async fn prepare(
    state: &AppState,
    user: AuthUser,
    book_id: Uuid,
    chapter_id: Option<Uuid>,
) -> ApiResult<(Book, u32)> {
    let (book, access) = state.load_book(book_id, Some(user.id), AccessMethod::Write).await?;
    access.require_edit()?;
    if let Some(chapter_id) = chapter_id {
        book.chapter(chapter_id)?;
    }
    state.text_generator()?;

    let mut account = state.db.get_user_by_id(user.id).await?;
    let limit = state.config.ai_limits.for_user(account.is_premium);
    let remaining = account.ai_usage.consume(today(), limit)?;
    account.updated_at = Utc::now();
    state.db.update_user(&account).await?;
    Ok((book, remaining))
}

/// Runs the prompt and rejects blank output.
async fn generate(
    state: &AppState,
    kind: GenerationKind,
    book: &Book,
    chapter: Option<&Chapter>,
    instruction: &str,
) -> ApiResult<String> {
    let generator = state.text_generator()?;
    let prompt = build_prompt(kind, book, chapter, instruction);
    let text = generator.generate(&prompt).await?;
    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::EmptyGeneration);
    }
    info!(book_id = %book.id, ?kind, chars = text.len(), "Generated text");
    Ok(text.to_string())
}

/// Splits model output into plot points, one per non-empty line.
///
/// List markers are dropped and `Title: description` lines are split.
pub fn parse_plot_ideas(text: &str) -> Vec<PlotPointInput> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| {
                    c.is_ascii_digit() || matches!(c, '-' | '*' | '.' | ')' | '\u{2022}')
                })
                .trim()
                .trim_matches('*')
                .trim()
        })
        .filter(|line| !line.is_empty())
        .take(MAX_PLOT_IDEAS)
        .map(|line| match line.split_once(": ") {
            Some((title, description)) if !title.trim().is_empty() => PlotPointInput {
                title: title.trim().trim_matches('*').trim().to_string(),
                description: description.trim().to_string(),
            },
            _ => PlotPointInput {
                title: line.to_string(),
                description: String::new(),
            },
        })
        .collect()
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/ai/books/{id}/chapters/{chapter_id}/continue
#[utoipa::path(
    post,
    path = "/api/ai/books/{id}/chapters/{chapter_id}/continue",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("chapter_id" = Uuid, Path, description = "Chapter id")
    ),
    request_body = InstructionRequest,
    responses(
        (status = 200, description = "Text appended to the chapter"),
        (status = 403, description = "No edit access"),
        (status = 429, description = "Daily AI limit reached"),
        (status = 500, description = "Model failure or empty response")
    )
)]
pub async fn continue_chapter_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath((book_id, chapter_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<InstructionRequest>,
) -> ApiResult<Json<ApiResponse<Generated<Chapter>>>> {
    let (mut book, remaining) = prepare(&state, user, book_id, Some(chapter_id)).await?;
    let chapter = book.chapter(chapter_id)?.clone();
    let text = generate(
        &state,
        GenerationKind::ContinueChapter,
        &book,
        Some(&chapter),
        &req.instruction,
    )
    .await?;

    let updated = book.append_to_chapter(chapter_id, &text, Utc::now())?.clone();
    persist(&state, &book).await?;
    Ok(response::ok(Generated {
        generated: text,
        result: updated,
        remaining,
    }))
}

/// POST /api/ai/books/{id}/chapters/{chapter_id}/rewrite
#[utoipa::path(
    post,
    path = "/api/ai/books/{id}/chapters/{chapter_id}/rewrite",
    params(
        ("id" = Uuid, Path, description = "Book id"),
        ("chapter_id" = Uuid, Path, description = "Chapter id")
    ),
    request_body = InstructionRequest,
    responses(
        (status = 200, description = "Chapter replaced; the previous text is kept as a version"),
        (status = 429, description = "Daily AI limit reached")
    )
)]
pub async fn rewrite_chapter_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath((book_id, chapter_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(req): ApiJson<InstructionRequest>,
) -> ApiResult<Json<ApiResponse<Generated<Chapter>>>> {
    let (mut book, remaining) = prepare(&state, user, book_id, Some(chapter_id)).await?;
    let chapter = book.chapter(chapter_id)?.clone();
    let text = generate(
        &state,
        GenerationKind::RewriteChapter,
        &book,
        Some(&chapter),
        &req.instruction,
    )
    .await?;

    let now = Utc::now();
    book.snapshot(user.id, format!("Before AI rewrite of \"{}\"", chapter.title), now);
    let patch = ChapterPatch {
        content: Some(to_html_paragraphs(&text)),
        ..ChapterPatch::default()
    };
    let updated = book.update_chapter(chapter_id, patch, now)?.clone();
    persist(&state, &book).await?;
    Ok(response::ok(Generated {
        generated: text,
        result: updated,
        remaining,
    }))
}

/// POST /api/ai/books/{id}/outline
#[utoipa::path(
    post,
    path = "/api/ai/books/{id}/outline",
    params(("id" = Uuid, Path, description = "Book id")),
    request_body = InstructionRequest,
    responses(
        (status = 200, description = "Outline stored on the book"),
        (status = 429, description = "Daily AI limit reached")
    )
)]
pub async fn outline_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(book_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<InstructionRequest>,
) -> ApiResult<Json<ApiResponse<Generated<String>>>> {
    let (mut book, remaining) = prepare(&state, user, book_id, None).await?;
    let text = generate(&state, GenerationKind::Outline, &book, None, &req.instruction).await?;

    book.outline = text.clone();
    book.updated_at = Utc::now();
    state.db.save_book(&book).await?;
    Ok(response::ok(Generated {
        generated: text.clone(),
        result: text,
        remaining,
    }))
}

/// POST /api/ai/books/{id}/characters
#[utoipa::path(
    post,
    path = "/api/ai/books/{id}/characters",
    params(("id" = Uuid, Path, description = "Book id")),
    request_body = CharacterRequest,
    responses(
        (status = 200, description = "Character created with a generated profile"),
        (status = 400, description = "Missing name"),
        (status = 429, description = "Daily AI limit reached")
    )
)]
pub async fn character_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(book_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<CharacterRequest>,
) -> ApiResult<Json<ApiResponse<Generated<Character>>>> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Character name is required".to_string()));
    }
    let (mut book, remaining) = prepare(&state, user, book_id, None).await?;
    let instruction = format!(
        "Character name: {}\nRole: {}\n{}",
        req.name.trim(),
        if req.role.trim().is_empty() { "unspecified" } else { req.role.trim() },
        req.instruction
    );
    let text = generate(&state, GenerationKind::CharacterProfile, &book, None, &instruction).await?;

    let character = book
        .add_character(
            CharacterInput {
                name: req.name,
                role: req.role,
                description: text.clone(),
                traits: Vec::new(),
            },
            Utc::now(),
        )?
        .clone();
    state.db.save_book(&book).await?;
    Ok(response::ok(Generated {
        generated: text,
        result: character,
        remaining,
    }))
}

/// POST /api/ai/books/{id}/plot-ideas
#[utoipa::path(
    post,
    path = "/api/ai/books/{id}/plot-ideas",
    params(("id" = Uuid, Path, description = "Book id")),
    request_body = InstructionRequest,
    responses(
        (status = 200, description = "Plot points appended"),
        (status = 429, description = "Daily AI limit reached")
    )
)]
pub async fn plot_ideas_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(book_id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<InstructionRequest>,
) -> ApiResult<Json<ApiResponse<Generated<Vec<PlotPoint>>>>> {
    let (mut book, remaining) = prepare(&state, user, book_id, None).await?;
    let text = generate(&state, GenerationKind::PlotIdeas, &book, None, &req.instruction).await?;

    let ideas = parse_plot_ideas(&text);
    if ideas.is_empty() {
        return Err(ApiError::EmptyGeneration);
    }
    let now = Utc::now();
    let mut added = Vec::with_capacity(ideas.len());
    for idea in ideas {
        added.push(book.add_plot_point(idea, now)?.clone());
    }
    state.db.save_book(&book).await?;
    Ok(response::ok(Generated {
        generated: text,
        result: added,
        remaining,
    }))
}

/// GET /api/ai/usage - Today's usage against the caller's limit
#[utoipa::path(
    get,
    path = "/api/ai/usage",
    responses(
        (status = 200, description = "Usage report"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn usage_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<ApiResponse<UsageReport>>> {
    let account = state.db.get_user_by_id(user.id).await?;
    let limit = state.config.ai_limits.for_user(account.is_premium);
    Ok(response::ok(account.ai_usage.report(today(), limit)))
}
