//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! A book is stored as one JSONB document next to the few columns that are
//! queried on (author, status, visibility).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use quillwright_core::domain::{AccountSettings, AiUsage, ReadingPreferences, UserStats};
use quillwright_core::ports::{DatabaseService, PortError, PortResult};
use quillwright_core::{Book, BookStatus, NewUser, User, UserCredentials, Visibility};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

const USER_COLUMNS: &str = "id, name, email, avatar, bio, is_premium, is_active, preferences, \
     settings, stats, ai_usage_date, ai_usage_count, last_login, created_at, updated_at";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        other => unexpected(other),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    avatar: Option<String>,
    bio: String,
    is_premium: bool,
    is_active: bool,
    preferences: Json<ReadingPreferences>,
    settings: Json<AccountSettings>,
    stats: Json<UserStats>,
    ai_usage_date: Option<NaiveDate>,
    ai_usage_count: i32,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            avatar: self.avatar,
            bio: self.bio,
            is_premium: self.is_premium,
            is_active: self.is_active,
            preferences: self.preferences.0,
            settings: self.settings.0,
            stats: self.stats.0,
            ai_usage: AiUsage {
                date: self.ai_usage_date,
                count: self.ai_usage_count.max(0) as u32,
            },
            last_login: self.last_login,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    password_hash: String,
    is_active: bool,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            email: self.email,
            hashed_password: self.password_hash,
            is_active: self.is_active,
        }
    }
}

#[derive(FromRow)]
struct BookRecord {
    document: Json<Book>,
}
impl BookRecord {
    fn to_domain(self) -> Book {
        self.document.0
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- User Management ---
    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, preferences, settings, stats) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new_user.name)
            .bind(&new_user.email)
            .bind(&new_user.hashed_password)
            .bind(Json(ReadingPreferences::default()))
            .bind(Json(AccountSettings::default()))
            .bind(Json(UserStats::default()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                    PortError::Conflict("User already exists".to_string())
                }
                other => unexpected(other),
            })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found_or_unexpected(format!("User {user_id} not found")))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, password_hash, is_active FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("User not found".to_string()))?;
        Ok(record.to_domain())
    }

    async fn get_credentials_by_id(&self, user_id: Uuid) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, password_hash, is_active FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("User {user_id} not found")))?;
        Ok(record.to_domain())
    }

    async fn update_user(&self, user: &User) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE users SET name = $2, avatar = $3, bio = $4, is_premium = $5, \
             preferences = $6, settings = $7, stats = $8, ai_usage_date = $9, \
             ai_usage_count = $10, updated_at = $11 WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.avatar)
        .bind(&user.bio)
        .bind(user.is_premium)
        .bind(Json(&user.preferences))
        .bind(Json(&user.settings))
        .bind(Json(&user.stats))
        .bind(user.ai_usage.date)
        .bind(user.ai_usage.count as i32)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user.id)));
        }
        Ok(())
    }

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(hashed_password)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn deactivate_user(&self, user_id: Uuid) -> PortResult<()> {
        sqlx::query("UPDATE users SET is_active = FALSE, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Password Reset ---
    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("UPDATE users SET reset_token_hash = $2, reset_token_expires = $3 WHERE id = $1")
            .bind(user_id)
            .bind(token_hash)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn take_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> PortResult<Uuid> {
        let user_id: Uuid = sqlx::query_scalar(
            "UPDATE users SET reset_token_hash = NULL, reset_token_expires = NULL \
             WHERE reset_token_hash = $1 AND reset_token_expires > $2 AND is_active \
             RETURNING id",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected("Reset token not found".to_string()))?;
        Ok(user_id)
    }

    // --- Book Management ---
    async fn create_book(&self, book: &Book) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO books (id, author_id, title, status, visibility, document, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(book.id)
        .bind(book.author_id)
        .bind(&book.title)
        .bind(book.status.as_str())
        .bind(book.visibility.as_str())
        .bind(Json(book))
        .bind(book.created_at)
        .bind(book.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn find_book(&self, book_id: Uuid) -> PortResult<Option<Book>> {
        let record = sqlx::query_as::<_, BookRecord>("SELECT document FROM books WHERE id = $1")
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.map(BookRecord::to_domain))
    }

    async fn save_book(&self, book: &Book) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE books SET title = $2, status = $3, visibility = $4, document = $5, \
             published_at = $6, updated_at = $7 WHERE id = $1",
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(book.status.as_str())
        .bind(book.visibility.as_str())
        .bind(Json(book))
        .bind(book.published_at)
        .bind(book.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Book {} not found", book.id)));
        }
        Ok(())
    }

    async fn delete_book(&self, book_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(book_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_books_for_user(&self, user_id: Uuid) -> PortResult<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(
            "SELECT document FROM books \
             WHERE author_id = $1 \
                OR document->'collaborators' @> jsonb_build_array(jsonb_build_object('user_id', $1::text)) \
             ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(BookRecord::to_domain).collect())
    }

    async fn list_public_books(&self, limit: i64, offset: i64) -> PortResult<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(
            "SELECT document FROM books \
             WHERE status = $1 AND visibility = $2 \
             ORDER BY published_at DESC NULLS LAST \
             LIMIT $3 OFFSET $4",
        )
        .bind(BookStatus::Published.as_str())
        .bind(Visibility::Public.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(BookRecord::to_domain).collect())
    }

    async fn list_books_by_author(&self, author_id: Uuid) -> PortResult<Vec<Book>> {
        let records = sqlx::query_as::<_, BookRecord>(
            "SELECT document FROM books WHERE author_id = $1 ORDER BY updated_at DESC",
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(BookRecord::to_domain).collect())
    }

    async fn ping(&self) -> PortResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
