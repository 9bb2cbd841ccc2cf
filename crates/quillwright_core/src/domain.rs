//! crates/quillwright_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! These structs are independent of any database; they derive serde so the
//! book aggregate can be stored and returned as a single document.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Users
//=========================================================================================

/// A registered account. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub bio: String,
    pub is_premium: bool,
    pub is_active: bool,
    pub preferences: ReadingPreferences,
    pub settings: AccountSettings,
    pub stats: UserStats,
    pub ai_usage: AiUsage,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Only used internally for login and password changes - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
}

/// Input for creating a user; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub hashed_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingPreferences {
    pub font_size: u8,
    pub theme: Theme,
    pub line_spacing: f32,
    pub default_genre: Option<String>,
}

impl Default for ReadingPreferences {
    fn default() -> Self {
        Self {
            font_size: 16,
            theme: Theme::Light,
            line_spacing: 1.5,
            default_genre: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Sepia,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
    pub email_notifications: bool,
    pub public_profile: bool,
    pub autosave_interval_secs: u32,
}

impl Default for AccountSettings {
    fn default() -> Self {
        Self {
            email_notifications: true,
            public_profile: false,
            autosave_interval_secs: 30,
        }
    }
}

/// Aggregate counters over the books a user authored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserStats {
    pub books_written: u32,
    pub chapters_written: u32,
    pub total_words: u64,
}

/// Daily AI call counter. See `quota` for the reset rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiUsage {
    pub date: Option<NaiveDate>,
    pub count: u32,
}

//=========================================================================================
// Books
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    #[default]
    Draft,
    InProgress,
    Completed,
    Published,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl BookStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Unlisted => "unlisted",
            Self::Public => "public",
        }
    }
}

/// The top-level authored work. Chapters and the other nested collections
/// live inside the aggregate and are saved together with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author_id: Uuid,
    #[serde(default)]
    pub collaborators: Vec<Collaborator>,
    pub cover_image: Option<String>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub settings: Vec<Setting>,
    #[serde(default)]
    pub plot_points: Vec<PlotPoint>,
    #[serde(default)]
    pub outline: String,
    #[serde(default)]
    pub images: Vec<BookImage>,
    #[serde(default)]
    pub versions: Vec<BookVersion>,
    #[serde(default)]
    pub current_version: u32,
    #[serde(default)]
    pub status: BookStatus,
    #[serde(default)]
    pub visibility: Visibility,
    pub target_word_count: Option<u64>,
    #[serde(default)]
    pub word_count: u64,
    /// Estimated minutes to read.
    #[serde(default)]
    pub reading_time: u32,
    /// Percentage in 0..=100.
    #[serde(default)]
    pub progress: u8,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterStatus {
    #[default]
    Draft,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub order: u32,
    #[serde(default)]
    pub word_count: u64,
    #[serde(default)]
    pub status: ChapterStatus,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub traits: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookImage {
    pub id: Uuid,
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub caption: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A point-in-time copy of the book's title and chapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookVersion {
    pub version: u32,
    pub title: String,
    pub chapters: Vec<Chapter>,
    pub word_count: u64,
    #[serde(default)]
    pub note: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Collaboration
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorRole {
    CoAuthor,
    Editor,
    Reviewer,
}

impl CollaboratorRole {
    /// The flags a collaborator gets when none are given explicitly.
    pub fn default_permissions(self) -> Permissions {
        match self {
            Self::CoAuthor => Permissions {
                can_edit: true,
                can_delete: false,
                can_publish: true,
            },
            Self::Editor => Permissions {
                can_edit: true,
                can_delete: false,
                can_publish: false,
            },
            Self::Reviewer => Permissions::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub can_publish: bool,
}

impl Permissions {
    pub const ALL: Self = Self {
        can_edit: true,
        can_delete: true,
        can_publish: true,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collaborator {
    pub user_id: Uuid,
    pub role: CollaboratorRole,
    pub permissions: Permissions,
    pub added_at: DateTime<Utc>,
}
