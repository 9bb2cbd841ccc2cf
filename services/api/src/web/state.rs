//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the book loading helper every
//! book-scoped handler goes through.

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use quillwright_core::{
    authorize, AccessMethod, Book, BookAccess, DatabaseService, DocumentRenderer, ExportFormat,
    FileStore, ImageProcessor, MailService, OutgoingEmail, TextGenerationService,
};
use quillwright_core::ports::TextRenderer;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    /// Absent when no API key is configured; AI routes then fail with 500.
    pub llm: Option<Arc<dyn TextGenerationService>>,
    /// Absent when SMTP is not configured; mail is logged and skipped.
    pub mailer: Option<Arc<dyn MailService>>,
    pub files: Arc<dyn FileStore>,
    pub images: Arc<dyn ImageProcessor>,
    pub pdf_renderer: Arc<dyn DocumentRenderer>,
    pub docx_renderer: Arc<dyn DocumentRenderer>,
}

impl AppState {
    /// Loads a book and resolves the requester's access to it.
    pub async fn load_book(
        &self,
        book_id: Uuid,
        requester: Option<Uuid>,
        method: AccessMethod,
    ) -> ApiResult<(Book, BookAccess)> {
        let book = self.db.find_book(book_id).await?;
        let access = authorize(book.as_ref(), requester, method)?;
        let book = book.ok_or(ApiError::NotFound("Book not found".to_string()))?;
        Ok((book, access))
    }

    pub fn renderer(&self, format: ExportFormat) -> Arc<dyn DocumentRenderer> {
        match format {
            ExportFormat::Pdf => self.pdf_renderer.clone(),
            ExportFormat::Docx => self.docx_renderer.clone(),
            ExportFormat::Txt => Arc::new(TextRenderer),
        }
    }

    pub fn text_generator(&self) -> ApiResult<Arc<dyn TextGenerationService>> {
        self.llm
            .clone()
            .ok_or_else(|| ApiError::Internal("AI generation is not configured".to_string()))
    }

    /// Sends mail best-effort. Failures are logged and never reach the client.
    pub async fn send_mail(&self, email: OutgoingEmail) {
        let Some(mailer) = &self.mailer else {
            info!(to = %email.to, subject = %email.subject, "Mail disabled, skipping");
            return;
        };
        if let Err(e) = mailer.send(email).await {
            warn!("Failed to send mail: {e}");
        }
    }

    /// Deletes a stored file best-effort.
    pub async fn discard_file(&self, name: &str) {
        if let Err(e) = self.files.delete(name).await {
            warn!(file = name, "Failed to delete file: {e}");
        }
    }
}
