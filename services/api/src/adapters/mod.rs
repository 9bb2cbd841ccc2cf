pub mod db;
pub mod docx;
pub mod files;
pub mod images;
pub mod llm;
pub mod mailer;
pub mod pdf;

pub use db::DbAdapter;
pub use docx::DocxRenderer;
pub use files::LocalFileStore;
pub use images::ImageResizer;
pub use llm::OpenAiTextAdapter;
pub use mailer::SmtpMailer;
pub use pdf::PdfRenderer;
