//! crates/quillwright_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! core independent of the database, the LLM vendor, SMTP and the file system.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Book, NewUser, User, UserCredentials};
use crate::export::ExportDocument;
use crate::prompt::Prompt;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, new_user: NewUser) -> PortResult<User>;

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_credentials_by_id(&self, user_id: Uuid) -> PortResult<UserCredentials>;

    /// Saves the mutable profile fields, preferences, settings, stats and AI usage.
    async fn update_user(&self, user: &User) -> PortResult<()>;

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()>;

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> PortResult<()>;

    /// Soft delete: sets `is_active = false`.
    async fn deactivate_user(&self, user_id: Uuid) -> PortResult<()>;

    // --- Password Reset ---
    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the user owning an unexpired token, and clears the token.
    async fn take_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> PortResult<Uuid>;

    // --- Book Management ---
    async fn create_book(&self, book: &Book) -> PortResult<()>;

    /// `Ok(None)` when the book does not exist.
    async fn find_book(&self, book_id: Uuid) -> PortResult<Option<Book>>;

    /// Whole-document save, last writer wins.
    async fn save_book(&self, book: &Book) -> PortResult<()>;

    async fn delete_book(&self, book_id: Uuid) -> PortResult<()>;

    /// Books the user authored or collaborates on, most recently updated first.
    async fn list_books_for_user(&self, user_id: Uuid) -> PortResult<Vec<Book>>;

    /// Published public books, newest first.
    async fn list_public_books(&self, limit: i64, offset: i64) -> PortResult<Vec<Book>>;

    async fn list_books_by_author(&self, author_id: Uuid) -> PortResult<Vec<Book>>;

    async fn ping(&self) -> PortResult<()>;
}

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Runs the prompt and returns the model's text. May be empty.
    async fn generate(&self, prompt: &Prompt) -> PortResult<String>;
}

/// A single transactional email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
}

#[async_trait]
pub trait MailService: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> PortResult<()>;
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Writes `bytes` under `name` and returns the public URL path.
    async fn save(&self, name: &str, bytes: &[u8]) -> PortResult<String>;

    async fn delete(&self, name: &str) -> PortResult<()>;
}

/// What an uploaded image is used for; decides the bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Cover,
    Illustration,
    Avatar,
}

impl ImageKind {
    pub fn max_dimensions(self) -> (u32, u32) {
        match self {
            Self::Cover => (1600, 2560),
            Self::Illustration => (1920, 1920),
            Self::Avatar => (400, 400),
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            Self::Cover => "cover",
            Self::Illustration => "image",
            Self::Avatar => "avatar",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

pub trait ImageProcessor: Send + Sync {
    /// Decodes, downscales to fit `kind` and re-encodes the upload.
    fn process(&self, bytes: &[u8], kind: ImageKind) -> PortResult<ProcessedImage>;
}

pub trait DocumentRenderer: Send + Sync {
    fn render(&self, document: &ExportDocument) -> PortResult<Vec<u8>>;
}

/// Renders the plain-text export.
pub struct TextRenderer;

impl DocumentRenderer for TextRenderer {
    fn render(&self, document: &ExportDocument) -> PortResult<Vec<u8>> {
        Ok(crate::export::render_text(document).into_bytes())
    }
}
