pub mod access;
pub mod book;
pub mod domain;
pub mod export;
pub mod ports;
pub mod prompt;
pub mod quota;
pub mod text;

pub use access::{authorize, AccessDenied, AccessMethod, AccessRole, BookAccess};
pub use book::{BookError, BookResult};
pub use domain::{
    AiUsage, Book, BookStatus, Chapter, ChapterStatus, Collaborator, CollaboratorRole, NewUser,
    Permissions, User, UserCredentials, Visibility,
};
pub use export::{ExportDocument, ExportError, ExportFormat, ExportOptions};
pub use ports::{
    DatabaseService, DocumentRenderer, FileStore, ImageKind, ImageProcessor, MailService,
    OutgoingEmail, PortError, PortResult, TextGenerationService,
};
pub use quota::{DailyLimits, QuotaExceeded};
