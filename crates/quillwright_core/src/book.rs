//! crates/quillwright_core/src/book.rs
//!
//! Mutations on the `Book` aggregate. Every method that touches chapters
//! leaves the derived fields (`word_count`, `reading_time`, `progress`) and
//! the dense chapter ordering consistent before returning.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::{
    Book, BookImage, BookStatus, BookVersion, Chapter, ChapterStatus, Character, Collaborator,
    CollaboratorRole, Permissions, PlotPoint, Setting, Visibility,
};
use crate::text;

/// Errors raised by book mutations. All of them are client errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BookError {
    #[error("Chapter not found")]
    ChapterNotFound,
    #[error("Character not found")]
    CharacterNotFound,
    #[error("Setting not found")]
    SettingNotFound,
    #[error("Plot point not found")]
    PlotPointNotFound,
    #[error("Image not found")]
    ImageNotFound,
    #[error("Version {0} not found")]
    VersionNotFound(u32),
    #[error("Collaborator not found")]
    CollaboratorNotFound,
    #[error("User is already a collaborator on this book")]
    DuplicateCollaborator,
    #[error("The author cannot be added as a collaborator")]
    AuthorAsCollaborator,
    #[error("Chapter order must list every chapter exactly once")]
    InvalidChapterOrder,
    #[error("Cannot publish a book without any written chapters")]
    NothingToPublish,
    #[error("{0}")]
    Validation(String),
}

impl BookError {
    /// True for lookups of a nested item that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ChapterNotFound
                | Self::CharacterNotFound
                | Self::SettingNotFound
                | Self::PlotPointNotFound
                | Self::ImageNotFound
                | Self::VersionNotFound(_)
                | Self::CollaboratorNotFound
        )
    }
}

pub type BookResult<T> = Result<T, BookError>;

pub const MAX_TITLE_LEN: usize = 200;

//=========================================================================================
// Request payloads
//=========================================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookDraft {
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub target_word_count: Option<u64>,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookPatch {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub tags: Option<Vec<String>>,
    pub outline: Option<String>,
    pub target_word_count: Option<u64>,
    pub status: Option<BookStatus>,
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChapterDraft {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChapterPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub notes: Option<String>,
    pub status: Option<ChapterStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CharacterInput {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub traits: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlotPointInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

fn validate_title(title: &str) -> BookResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(BookError::Validation("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(BookError::Validation(format!(
            "Title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(title.to_string())
}

fn require_name(value: &str, what: &str) -> BookResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BookError::Validation(format!("{what} is required")));
    }
    Ok(value.to_string())
}

//=========================================================================================
// Book aggregate
//=========================================================================================

impl Book {
    /// Builds a fresh draft owned by `author_id`.
    pub fn new(author_id: Uuid, draft: BookDraft, now: DateTime<Utc>) -> BookResult<Self> {
        let mut book = Self {
            id: Uuid::new_v4(),
            title: validate_title(&draft.title)?,
            subtitle: draft.subtitle,
            description: draft.description,
            genre: draft.genre,
            tags: draft.tags,
            author_id,
            collaborators: Vec::new(),
            cover_image: None,
            chapters: Vec::new(),
            characters: Vec::new(),
            settings: Vec::new(),
            plot_points: Vec::new(),
            outline: String::new(),
            images: Vec::new(),
            versions: Vec::new(),
            current_version: 0,
            status: BookStatus::Draft,
            visibility: draft.visibility,
            target_word_count: draft.target_word_count,
            word_count: 0,
            reading_time: 0,
            progress: 0,
            published_at: None,
            created_at: now,
            updated_at: now,
        };
        book.recompute_stats();
        Ok(book)
    }

    /// Recomputes the derived fields from the chapters. Called before every save.
    pub fn recompute_stats(&mut self) {
        for chapter in &mut self.chapters {
            chapter.word_count = text::count_words(&chapter.content);
        }
        self.word_count = self.chapters.iter().map(|c| c.word_count).sum();
        self.reading_time = text::reading_time_minutes(self.word_count);
        self.progress = match self.target_word_count {
            Some(target) if target > 0 => (self.word_count * 100 / target).min(100) as u8,
            _ if self.chapters.is_empty() => 0,
            _ => {
                let done = self
                    .chapters
                    .iter()
                    .filter(|c| c.status == ChapterStatus::Completed)
                    .count();
                (done * 100 / self.chapters.len()) as u8
            }
        };
    }

    /// Rewrites `order` as 1..N following the current vector order.
    fn renumber_chapters(&mut self) {
        for (i, chapter) in self.chapters.iter_mut().enumerate() {
            chapter.order = i as u32 + 1;
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.recompute_stats();
        self.updated_at = now;
    }

    pub fn apply_patch(&mut self, patch: BookPatch, now: DateTime<Utc>) -> BookResult<()> {
        if let Some(title) = patch.title {
            self.title = validate_title(&title)?;
        }
        if let Some(subtitle) = patch.subtitle {
            self.subtitle = subtitle;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(genre) = patch.genre {
            self.genre = genre;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(outline) = patch.outline {
            self.outline = outline;
        }
        if patch.target_word_count.is_some() {
            self.target_word_count = patch.target_word_count.filter(|t| *t > 0);
        }
        if let Some(status) = patch.status {
            if status == BookStatus::Published {
                return Err(BookError::Validation(
                    "Use the publish endpoint to publish a book".to_string(),
                ));
            }
            self.status = status;
        }
        if let Some(visibility) = patch.visibility {
            self.visibility = visibility;
        }
        self.touch(now);
        Ok(())
    }

    //-------------------------------------------------------------------------------------
    // Chapters
    //-------------------------------------------------------------------------------------

    pub fn chapter(&self, chapter_id: Uuid) -> BookResult<&Chapter> {
        self.chapters
            .iter()
            .find(|c| c.id == chapter_id)
            .ok_or(BookError::ChapterNotFound)
    }

    fn chapter_mut(&mut self, chapter_id: Uuid) -> BookResult<&mut Chapter> {
        self.chapters
            .iter_mut()
            .find(|c| c.id == chapter_id)
            .ok_or(BookError::ChapterNotFound)
    }

    /// Appends a chapter at position N+1.
    pub fn add_chapter(&mut self, draft: ChapterDraft, now: DateTime<Utc>) -> BookResult<&Chapter> {
        let chapter = Chapter {
            id: Uuid::new_v4(),
            title: validate_title(&draft.title)?,
            content: draft.content,
            order: self.chapters.len() as u32 + 1,
            word_count: 0,
            status: ChapterStatus::Draft,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        };
        let id = chapter.id;
        self.chapters.push(chapter);
        if self.status == BookStatus::Draft {
            self.status = BookStatus::InProgress;
        }
        self.touch(now);
        self.chapter(id)
    }

    pub fn update_chapter(
        &mut self,
        chapter_id: Uuid,
        patch: ChapterPatch,
        now: DateTime<Utc>,
    ) -> BookResult<&Chapter> {
        let title = patch.title.as_deref().map(validate_title).transpose()?;
        let chapter = self.chapter_mut(chapter_id)?;
        if let Some(title) = title {
            chapter.title = title;
        }
        if let Some(content) = patch.content {
            chapter.content = content;
        }
        if let Some(notes) = patch.notes {
            chapter.notes = notes;
        }
        if let Some(status) = patch.status {
            chapter.status = status;
        }
        chapter.updated_at = now;
        self.touch(now);
        self.chapter(chapter_id)
    }

    /// Appends generated text to a chapter as new paragraphs.
    pub fn append_to_chapter(
        &mut self,
        chapter_id: Uuid,
        addition: &str,
        now: DateTime<Utc>,
    ) -> BookResult<&Chapter> {
        let chapter = self.chapter_mut(chapter_id)?;
        chapter.content.push_str(&text::to_html_paragraphs(addition));
        if chapter.status == ChapterStatus::Draft {
            chapter.status = ChapterStatus::InProgress;
        }
        chapter.updated_at = now;
        self.touch(now);
        self.chapter(chapter_id)
    }

    /// Removes a chapter and closes the gap in `order`.
    pub fn remove_chapter(&mut self, chapter_id: Uuid, now: DateTime<Utc>) -> BookResult<Chapter> {
        let idx = self
            .chapters
            .iter()
            .position(|c| c.id == chapter_id)
            .ok_or(BookError::ChapterNotFound)?;
        let removed = self.chapters.remove(idx);
        self.chapters.sort_by_key(|c| c.order);
        self.renumber_chapters();
        self.touch(now);
        Ok(removed)
    }

    /// Reorders chapters to match `ids` exactly; `ids` must be a permutation
    /// of the current chapter ids.
    pub fn reorder_chapters(&mut self, ids: &[Uuid], now: DateTime<Utc>) -> BookResult<()> {
        let unique: HashSet<Uuid> = ids.iter().copied().collect();
        if ids.len() != self.chapters.len() || unique.len() != ids.len() {
            return Err(BookError::InvalidChapterOrder);
        }
        let mut reordered = Vec::with_capacity(ids.len());
        for id in ids {
            let chapter = self
                .chapters
                .iter()
                .find(|c| c.id == *id)
                .ok_or(BookError::InvalidChapterOrder)?;
            reordered.push(chapter.clone());
        }
        self.chapters = reordered;
        self.renumber_chapters();
        self.touch(now);
        Ok(())
    }

    /// Chapters in reading order.
    pub fn ordered_chapters(&self) -> Vec<&Chapter> {
        let mut chapters: Vec<&Chapter> = self.chapters.iter().collect();
        chapters.sort_by_key(|c| c.order);
        chapters
    }

    /// True when at least one chapter has text after stripping markup.
    pub fn has_written_chapters(&self) -> bool {
        self.chapters
            .iter()
            .any(|c| !text::strip_html(&c.content).trim().is_empty())
    }

    //-------------------------------------------------------------------------------------
    // Characters, settings, plot points
    //-------------------------------------------------------------------------------------

    pub fn add_character(&mut self, input: CharacterInput, now: DateTime<Utc>) -> BookResult<&Character> {
        let character = Character {
            id: Uuid::new_v4(),
            name: require_name(&input.name, "Character name")?,
            role: input.role,
            description: input.description,
            traits: input.traits,
        };
        self.characters.push(character);
        self.touch(now);
        self.characters.last().ok_or(BookError::CharacterNotFound)
    }

    pub fn update_character(
        &mut self,
        id: Uuid,
        input: CharacterInput,
        now: DateTime<Utc>,
    ) -> BookResult<&Character> {
        let name = require_name(&input.name, "Character name")?;
        let character = self
            .characters
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(BookError::CharacterNotFound)?;
        character.name = name;
        character.role = input.role;
        character.description = input.description;
        character.traits = input.traits;
        self.touch(now);
        self.characters
            .iter()
            .find(|c| c.id == id)
            .ok_or(BookError::CharacterNotFound)
    }

    pub fn remove_character(&mut self, id: Uuid, now: DateTime<Utc>) -> BookResult<()> {
        let before = self.characters.len();
        self.characters.retain(|c| c.id != id);
        if self.characters.len() == before {
            return Err(BookError::CharacterNotFound);
        }
        self.touch(now);
        Ok(())
    }

    pub fn add_setting(&mut self, input: SettingInput, now: DateTime<Utc>) -> BookResult<&Setting> {
        let setting = Setting {
            id: Uuid::new_v4(),
            name: require_name(&input.name, "Setting name")?,
            description: input.description,
        };
        self.settings.push(setting);
        self.touch(now);
        self.settings.last().ok_or(BookError::SettingNotFound)
    }

    pub fn update_setting(
        &mut self,
        id: Uuid,
        input: SettingInput,
        now: DateTime<Utc>,
    ) -> BookResult<&Setting> {
        let name = require_name(&input.name, "Setting name")?;
        let setting = self
            .settings
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(BookError::SettingNotFound)?;
        setting.name = name;
        setting.description = input.description;
        self.touch(now);
        self.settings
            .iter()
            .find(|s| s.id == id)
            .ok_or(BookError::SettingNotFound)
    }

    pub fn remove_setting(&mut self, id: Uuid, now: DateTime<Utc>) -> BookResult<()> {
        let before = self.settings.len();
        self.settings.retain(|s| s.id != id);
        if self.settings.len() == before {
            return Err(BookError::SettingNotFound);
        }
        self.touch(now);
        Ok(())
    }

    pub fn add_plot_point(&mut self, input: PlotPointInput, now: DateTime<Utc>) -> BookResult<&PlotPoint> {
        let point = PlotPoint {
            id: Uuid::new_v4(),
            title: require_name(&input.title, "Plot point title")?,
            description: input.description,
            order: self.plot_points.len() as u32 + 1,
        };
        self.plot_points.push(point);
        self.touch(now);
        self.plot_points.last().ok_or(BookError::PlotPointNotFound)
    }

    pub fn update_plot_point(
        &mut self,
        id: Uuid,
        input: PlotPointInput,
        now: DateTime<Utc>,
    ) -> BookResult<&PlotPoint> {
        let title = require_name(&input.title, "Plot point title")?;
        let point = self
            .plot_points
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(BookError::PlotPointNotFound)?;
        point.title = title;
        point.description = input.description;
        self.touch(now);
        self.plot_points
            .iter()
            .find(|p| p.id == id)
            .ok_or(BookError::PlotPointNotFound)
    }

    pub fn remove_plot_point(&mut self, id: Uuid, now: DateTime<Utc>) -> BookResult<()> {
        let before = self.plot_points.len();
        self.plot_points.retain(|p| p.id != id);
        if self.plot_points.len() == before {
            return Err(BookError::PlotPointNotFound);
        }
        for (i, point) in self.plot_points.iter_mut().enumerate() {
            point.order = i as u32 + 1;
        }
        self.touch(now);
        Ok(())
    }

    //-------------------------------------------------------------------------------------
    // Images
    //-------------------------------------------------------------------------------------

    pub fn add_image(&mut self, url: String, filename: String, caption: String, now: DateTime<Utc>) -> &BookImage {
        self.images.push(BookImage {
            id: Uuid::new_v4(),
            url,
            filename,
            caption,
            uploaded_at: now,
        });
        self.updated_at = now;
        &self.images[self.images.len() - 1]
    }

    pub fn remove_image(&mut self, id: Uuid, now: DateTime<Utc>) -> BookResult<BookImage> {
        let idx = self
            .images
            .iter()
            .position(|i| i.id == id)
            .ok_or(BookError::ImageNotFound)?;
        self.updated_at = now;
        Ok(self.images.remove(idx))
    }

    /// Replaces the cover URL, returning the previous one if any.
    pub fn set_cover(&mut self, url: String, now: DateTime<Utc>) -> Option<String> {
        self.updated_at = now;
        self.cover_image.replace(url)
    }

    //-------------------------------------------------------------------------------------
    // Versions
    //-------------------------------------------------------------------------------------

    /// Stores a snapshot of the current title and chapters.
    pub fn snapshot(&mut self, created_by: Uuid, note: String, now: DateTime<Utc>) -> &BookVersion {
        self.current_version += 1;
        self.versions.push(BookVersion {
            version: self.current_version,
            title: self.title.clone(),
            chapters: self.chapters.clone(),
            word_count: self.word_count,
            note,
            created_by,
            created_at: now,
        });
        self.updated_at = now;
        &self.versions[self.versions.len() - 1]
    }

    /// Restores a stored version. The current state is snapshotted first so
    /// the restore itself can be undone.
    pub fn restore_version(&mut self, version: u32, restored_by: Uuid, now: DateTime<Utc>) -> BookResult<()> {
        let stored = self
            .versions
            .iter()
            .find(|v| v.version == version)
            .cloned()
            .ok_or(BookError::VersionNotFound(version))?;
        self.snapshot(restored_by, format!("Before restoring version {version}"), now);
        self.title = stored.title;
        self.chapters = stored.chapters;
        self.chapters.sort_by_key(|c| c.order);
        self.renumber_chapters();
        self.touch(now);
        Ok(())
    }

    //-------------------------------------------------------------------------------------
    // Collaborators
    //-------------------------------------------------------------------------------------

    pub fn collaborator(&self, user_id: Uuid) -> Option<&Collaborator> {
        self.collaborators.iter().find(|c| c.user_id == user_id)
    }

    pub fn add_collaborator(
        &mut self,
        user_id: Uuid,
        role: CollaboratorRole,
        permissions: Option<Permissions>,
        now: DateTime<Utc>,
    ) -> BookResult<&Collaborator> {
        if user_id == self.author_id {
            return Err(BookError::AuthorAsCollaborator);
        }
        if self.collaborator(user_id).is_some() {
            return Err(BookError::DuplicateCollaborator);
        }
        self.collaborators.push(Collaborator {
            user_id,
            role,
            permissions: permissions.unwrap_or_else(|| role.default_permissions()),
            added_at: now,
        });
        self.updated_at = now;
        self.collaborator(user_id).ok_or(BookError::CollaboratorNotFound)
    }

    pub fn update_collaborator(
        &mut self,
        user_id: Uuid,
        role: Option<CollaboratorRole>,
        permissions: Option<Permissions>,
        now: DateTime<Utc>,
    ) -> BookResult<&Collaborator> {
        let collaborator = self
            .collaborators
            .iter_mut()
            .find(|c| c.user_id == user_id)
            .ok_or(BookError::CollaboratorNotFound)?;
        if let Some(role) = role {
            collaborator.role = role;
        }
        if let Some(permissions) = permissions {
            collaborator.permissions = permissions;
        }
        self.updated_at = now;
        self.collaborator(user_id).ok_or(BookError::CollaboratorNotFound)
    }

    pub fn remove_collaborator(&mut self, user_id: Uuid, now: DateTime<Utc>) -> BookResult<()> {
        let before = self.collaborators.len();
        self.collaborators.retain(|c| c.user_id != user_id);
        if self.collaborators.len() == before {
            return Err(BookError::CollaboratorNotFound);
        }
        self.updated_at = now;
        Ok(())
    }

    //-------------------------------------------------------------------------------------
    // Lifecycle
    //-------------------------------------------------------------------------------------

    pub fn publish(&mut self, now: DateTime<Utc>) -> BookResult<()> {
        if !self.has_written_chapters() {
            return Err(BookError::NothingToPublish);
        }
        self.status = BookStatus::Published;
        self.visibility = Visibility::Public;
        self.published_at = Some(now);
        self.touch(now);
        Ok(())
    }

    pub fn unpublish(&mut self, now: DateTime<Utc>) {
        self.status = BookStatus::Completed;
        self.visibility = Visibility::Private;
        self.published_at = None;
        self.touch(now);
    }

    pub fn archive(&mut self, now: DateTime<Utc>) {
        self.status = BookStatus::Archived;
        self.visibility = Visibility::Private;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> BookDraft {
        BookDraft {
            title: title.to_string(),
            subtitle: String::new(),
            description: String::new(),
            genre: "fantasy".to_string(),
            tags: vec![],
            target_word_count: None,
            visibility: Visibility::Private,
        }
    }

    fn chapter(title: &str, content: &str) -> ChapterDraft {
        ChapterDraft {
            title: title.to_string(),
            content: content.to_string(),
            notes: String::new(),
        }
    }

    fn book_with(contents: &[&str]) -> Book {
        let now = Utc::now();
        let mut book = Book::new(Uuid::new_v4(), draft("Saga"), now).unwrap();
        for (i, c) in contents.iter().enumerate() {
            book.add_chapter(chapter(&format!("Ch {}", i + 1), c), now).unwrap();
        }
        book
    }

    fn orders(book: &Book) -> Vec<u32> {
        book.chapters.iter().map(|c| c.order).collect()
    }

    fn assert_word_sum(book: &Book) {
        let sum: u64 = book.chapters.iter().map(|c| c.word_count).sum();
        assert_eq!(book.word_count, sum);
    }

    #[test]
    fn new_book_rejects_blank_title() {
        let err = Book::new(Uuid::new_v4(), draft("   "), Utc::now()).unwrap_err();
        assert!(matches!(err, BookError::Validation(_)));
    }

    #[test]
    fn word_count_tracks_every_chapter_mutation() {
        let now = Utc::now();
        let mut book = book_with(&["<p>one two three</p>", "four five"]);
        assert_eq!(book.word_count, 5);
        assert_word_sum(&book);

        let first = book.chapters[0].id;
        book.update_chapter(
            first,
            ChapterPatch {
                content: Some("just one".to_string()),
                ..Default::default()
            },
            now,
        )
        .unwrap();
        assert_eq!(book.word_count, 4);
        assert_word_sum(&book);

        book.append_to_chapter(first, "more words here\n\nand here", now).unwrap();
        assert_eq!(book.word_count, 9);
        assert_word_sum(&book);

        book.remove_chapter(first, now).unwrap();
        assert_eq!(book.word_count, 2);
        assert_word_sum(&book);
        assert_eq!(book.reading_time, 1);
    }

    #[test]
    fn add_chapter_moves_draft_to_in_progress() {
        let book = book_with(&["a"]);
        assert_eq!(book.status, BookStatus::InProgress);
    }

    #[test]
    fn remove_keeps_order_dense() {
        let now = Utc::now();
        let mut book = book_with(&["a", "b", "c", "d"]);
        let second = book.chapters[1].id;
        book.remove_chapter(second, now).unwrap();
        assert_eq!(orders(&book), vec![1, 2, 3]);
        let titles: Vec<_> = book.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Ch 1", "Ch 3", "Ch 4"]);
    }

    #[test]
    fn reorder_matches_request() {
        let now = Utc::now();
        let mut book = book_with(&["a", "b", "c"]);
        let ids: Vec<Uuid> = book.chapters.iter().map(|c| c.id).collect();
        let wanted = vec![ids[2], ids[0], ids[1]];
        book.reorder_chapters(&wanted, now).unwrap();

        let got: Vec<Uuid> = book.ordered_chapters().iter().map(|c| c.id).collect();
        assert_eq!(got, wanted);
        assert_eq!(orders(&book), vec![1, 2, 3]);
    }

    #[test]
    fn reorder_rejects_non_permutations() {
        let now = Utc::now();
        let mut book = book_with(&["a", "b", "c"]);
        let ids: Vec<Uuid> = book.chapters.iter().map(|c| c.id).collect();
        let before = book.chapters.clone();

        let missing = vec![ids[0], ids[1]];
        assert_eq!(book.reorder_chapters(&missing, now), Err(BookError::InvalidChapterOrder));
        let duplicated = vec![ids[0], ids[0], ids[1]];
        assert_eq!(book.reorder_chapters(&duplicated, now), Err(BookError::InvalidChapterOrder));
        let foreign = vec![ids[0], ids[1], Uuid::new_v4()];
        assert_eq!(book.reorder_chapters(&foreign, now), Err(BookError::InvalidChapterOrder));

        assert_eq!(book.chapters, before);
    }

    #[test]
    fn progress_uses_target_then_completed_chapters() {
        let now = Utc::now();
        let mut book = book_with(&["one two", "three four"]);
        assert_eq!(book.progress, 0);

        let first = book.chapters[0].id;
        book.update_chapter(
            first,
            ChapterPatch {
                status: Some(ChapterStatus::Completed),
                ..Default::default()
            },
            now,
        )
        .unwrap();
        assert_eq!(book.progress, 50);

        book.apply_patch(
            BookPatch {
                target_word_count: Some(2),
                ..Default::default()
            },
            now,
        )
        .unwrap();
        assert_eq!(book.progress, 100);
    }

    #[test]
    fn restore_snapshots_current_state_first() {
        let now = Utc::now();
        let user = Uuid::new_v4();
        let mut book = book_with(&["original text"]);
        book.snapshot(user, "first".to_string(), now);
        assert_eq!(book.current_version, 1);

        let first = book.chapters[0].id;
        book.update_chapter(
            first,
            ChapterPatch {
                content: Some("changed completely now".to_string()),
                ..Default::default()
            },
            now,
        )
        .unwrap();

        book.restore_version(1, user, now).unwrap();
        assert_eq!(book.current_version, 2);
        assert_eq!(book.chapters[0].content, "original text");
        assert_eq!(book.word_count, 2);
        assert_eq!(book.versions[1].chapters[0].content, "changed completely now");

        assert_eq!(book.restore_version(9, user, now), Err(BookError::VersionNotFound(9)));
    }

    #[test]
    fn collaborators_are_unique_and_exclude_author() {
        let now = Utc::now();
        let mut book = book_with(&[]);
        let author = book.author_id;
        let editor = Uuid::new_v4();

        assert_eq!(
            book.add_collaborator(author, CollaboratorRole::Editor, None, now).unwrap_err(),
            BookError::AuthorAsCollaborator
        );
        let added = book.add_collaborator(editor, CollaboratorRole::Editor, None, now).unwrap();
        assert!(added.permissions.can_edit);
        assert!(!added.permissions.can_delete);
        assert_eq!(
            book.add_collaborator(editor, CollaboratorRole::Reviewer, None, now).unwrap_err(),
            BookError::DuplicateCollaborator
        );
        book.remove_collaborator(editor, now).unwrap();
        assert!(book.collaborators.is_empty());
    }

    #[test]
    fn publish_requires_written_chapters() {
        let now = Utc::now();
        let mut empty = book_with(&["<p> </p>"]);
        assert_eq!(empty.publish(now), Err(BookError::NothingToPublish));

        let mut book = book_with(&["words"]);
        book.publish(now).unwrap();
        assert_eq!(book.status, BookStatus::Published);
        assert_eq!(book.visibility, Visibility::Public);
        assert!(book.published_at.is_some());

        book.unpublish(now);
        assert_eq!(book.visibility, Visibility::Private);
    }

    #[test]
    fn removing_plot_point_renumbers() {
        let now = Utc::now();
        let mut book = book_with(&[]);
        for t in ["a", "b", "c"] {
            book.add_plot_point(
                PlotPointInput {
                    title: t.to_string(),
                    description: String::new(),
                },
                now,
            )
            .unwrap();
        }
        let middle = book.plot_points[1].id;
        book.remove_plot_point(middle, now).unwrap();
        let orders: Vec<u32> = book.plot_points.iter().map(|p| p.order).collect();
        assert_eq!(orders, vec![1, 2]);
    }
}
