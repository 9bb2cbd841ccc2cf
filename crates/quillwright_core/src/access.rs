//! crates/quillwright_core/src/access.rs
//!
//! The book access predicate used by every book, chapter, image, version,
//! AI and export route.

use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Book, CollaboratorRole, Permissions, Visibility};

/// Whether a request only reads the book. Only reads are open to the public.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMethod {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "role", rename_all = "snake_case")]
pub enum AccessRole {
    Author,
    Collaborator(CollaboratorRole),
    Reader,
}

/// The outcome of a successful access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BookAccess {
    pub role: AccessRole,
    pub permissions: Permissions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("Book not found")]
    NotFound,
    #[error("You do not have permission to access this book")]
    Forbidden,
}

/// Resolves the requester's role on `book`, first match wins:
/// missing book, author, collaborator, public read, denied.
pub fn authorize(
    book: Option<&Book>,
    requester: Option<Uuid>,
    method: AccessMethod,
) -> Result<BookAccess, AccessDenied> {
    let book = book.ok_or(AccessDenied::NotFound)?;

    if let Some(user_id) = requester {
        if book.author_id == user_id {
            return Ok(BookAccess {
                role: AccessRole::Author,
                permissions: Permissions::ALL,
            });
        }
        if let Some(collaborator) = book.collaborator(user_id) {
            return Ok(BookAccess {
                role: AccessRole::Collaborator(collaborator.role),
                permissions: collaborator.permissions,
            });
        }
    }

    if book.visibility == Visibility::Public && method == AccessMethod::Read {
        return Ok(BookAccess {
            role: AccessRole::Reader,
            permissions: Permissions::default(),
        });
    }

    Err(AccessDenied::Forbidden)
}

impl BookAccess {
    pub fn is_author(&self) -> bool {
        self.role == AccessRole::Author
    }

    pub fn require_author(&self) -> Result<(), AccessDenied> {
        if self.is_author() {
            Ok(())
        } else {
            Err(AccessDenied::Forbidden)
        }
    }

    /// Authors and collaborators of any role; public readers are refused.
    pub fn require_member(&self) -> Result<(), AccessDenied> {
        if self.role == AccessRole::Reader {
            Err(AccessDenied::Forbidden)
        } else {
            Ok(())
        }
    }

    pub fn require_edit(&self) -> Result<(), AccessDenied> {
        if self.permissions.can_edit {
            Ok(())
        } else {
            Err(AccessDenied::Forbidden)
        }
    }

    pub fn require_delete(&self) -> Result<(), AccessDenied> {
        if self.permissions.can_delete {
            Ok(())
        } else {
            Err(AccessDenied::Forbidden)
        }
    }

    pub fn require_publish(&self) -> Result<(), AccessDenied> {
        if self.permissions.can_publish {
            Ok(())
        } else {
            Err(AccessDenied::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::BookDraft;
    use chrono::Utc;

    fn book(visibility: Visibility) -> Book {
        Book::new(
            Uuid::new_v4(),
            BookDraft {
                title: "Test".to_string(),
                subtitle: String::new(),
                description: String::new(),
                genre: String::new(),
                tags: vec![],
                target_word_count: None,
                visibility,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn missing_book_is_not_found_even_for_anonymous() {
        assert_eq!(
            authorize(None, None, AccessMethod::Read),
            Err(AccessDenied::NotFound)
        );
    }

    #[test]
    fn author_gets_everything() {
        let b = book(Visibility::Private);
        let access = authorize(Some(&b), Some(b.author_id), AccessMethod::Write).unwrap();
        assert!(access.is_author());
        assert!(access.require_edit().is_ok());
        assert!(access.require_delete().is_ok());
        assert!(access.require_publish().is_ok());
    }

    #[test]
    fn collaborator_gets_stored_flags() {
        let mut b = book(Visibility::Private);
        let reviewer = Uuid::new_v4();
        let editor = Uuid::new_v4();
        b.add_collaborator(reviewer, CollaboratorRole::Reviewer, None, Utc::now())
            .unwrap();
        b.add_collaborator(editor, CollaboratorRole::Editor, None, Utc::now())
            .unwrap();

        let access = authorize(Some(&b), Some(reviewer), AccessMethod::Write).unwrap();
        assert_eq!(access.role, AccessRole::Collaborator(CollaboratorRole::Reviewer));
        assert_eq!(access.require_edit(), Err(AccessDenied::Forbidden));
        assert_eq!(access.require_author(), Err(AccessDenied::Forbidden));
        assert!(access.require_member().is_ok());

        let access = authorize(Some(&b), Some(editor), AccessMethod::Write).unwrap();
        assert!(access.require_edit().is_ok());
        assert_eq!(access.require_delete(), Err(AccessDenied::Forbidden));
    }

    #[test]
    fn public_book_is_readable_but_not_writable() {
        let b = book(Visibility::Public);
        let stranger = Some(Uuid::new_v4());

        let access = authorize(Some(&b), stranger, AccessMethod::Read).unwrap();
        assert_eq!(access.role, AccessRole::Reader);
        assert_eq!(access.require_edit(), Err(AccessDenied::Forbidden));

        assert!(authorize(Some(&b), None, AccessMethod::Read).is_ok());
        assert_eq!(
            authorize(Some(&b), stranger, AccessMethod::Write),
            Err(AccessDenied::Forbidden)
        );
    }

    #[test]
    fn private_and_unlisted_books_are_closed() {
        for visibility in [Visibility::Private, Visibility::Unlisted] {
            let b = book(visibility);
            assert_eq!(
                authorize(Some(&b), Some(Uuid::new_v4()), AccessMethod::Read),
                Err(AccessDenied::Forbidden)
            );
        }
    }
}
