//! Shared harness for the API integration tests: in-memory fakes for every
//! port and a router driven through `tower::ServiceExt::oneshot`.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use api_lib::adapters::{DocxRenderer, PdfRenderer};
use api_lib::config::Config;
use api_lib::web::{build_router, state::AppState};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use chrono::{DateTime, Utc};
use quillwright_core::domain::{AccountSettings, ReadingPreferences, UserStats};
use quillwright_core::ports::ProcessedImage;
use quillwright_core::prompt::Prompt;
use quillwright_core::{
    AiUsage, Book, BookStatus, DatabaseService, FileStore, ImageKind, ImageProcessor,
    MailService, NewUser, OutgoingEmail, PortError, PortResult, TextGenerationService, User,
    UserCredentials, Visibility,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

//=========================================================================================
// Fakes
//=========================================================================================

#[derive(Default)]
pub struct InMemoryDb {
    users: Mutex<HashMap<Uuid, (User, String)>>,
    reset_tokens: Mutex<HashMap<String, (Uuid, DateTime<Utc>)>>,
    books: Mutex<HashMap<Uuid, Book>>,
    fail_writes: AtomicBool,
}

impl InMemoryDb {
    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn user(&self, id: Uuid) -> User {
        self.users.lock().unwrap()[&id].0.clone()
    }

    pub fn set_ai_usage(&self, id: Uuid, usage: AiUsage) {
        self.users.lock().unwrap().get_mut(&id).unwrap().0.ai_usage = usage;
    }

    pub fn book(&self, id: Uuid) -> Book {
        self.books.lock().unwrap()[&id].clone()
    }

    /// Makes every later book save and profile update fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    fn check_writable(&self) -> PortResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("database is read-only".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseService for InMemoryDb {
    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|(u, _)| u.email == new_user.email) {
            return Err(PortError::Conflict("User already exists".to_string()));
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            avatar: None,
            bio: String::new(),
            is_premium: false,
            is_active: true,
            preferences: ReadingPreferences::default(),
            settings: AccountSettings::default(),
            stats: UserStats::default(),
            ai_usage: AiUsage::default(),
            last_login: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, (user.clone(), new_user.hashed_password));
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> PortResult<User> {
        self.users
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {user_id} not found")))
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|(u, _)| u.email == email)
            .map(|(u, hash)| UserCredentials {
                user_id: u.id,
                email: u.email.clone(),
                hashed_password: hash.clone(),
                is_active: u.is_active,
            })
            .ok_or_else(|| PortError::NotFound(format!("User {email} not found")))
    }

    async fn get_credentials_by_id(&self, user_id: Uuid) -> PortResult<UserCredentials> {
        self.users
            .lock()
            .unwrap()
            .get(&user_id)
            .map(|(u, hash)| UserCredentials {
                user_id: u.id,
                email: u.email.clone(),
                hashed_password: hash.clone(),
                is_active: u.is_active,
            })
            .ok_or_else(|| PortError::NotFound(format!("User {user_id} not found")))
    }

    async fn update_user(&self, user: &User) -> PortResult<()> {
        self.check_writable()?;
        let mut users = self.users.lock().unwrap();
        let entry = users
            .get_mut(&user.id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user.id)))?;
        entry.0 = user.clone();
        Ok(())
    }

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()> {
        let mut users = self.users.lock().unwrap();
        let entry = users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {user_id} not found")))?;
        entry.1 = hashed_password.to_string();
        Ok(())
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> PortResult<()> {
        if let Some(entry) = self.users.lock().unwrap().get_mut(&user_id) {
            entry.0.last_login = Some(at);
        }
        Ok(())
    }

    async fn deactivate_user(&self, user_id: Uuid) -> PortResult<()> {
        if let Some(entry) = self.users.lock().unwrap().get_mut(&user_id) {
            entry.0.is_active = false;
        }
        Ok(())
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.reset_tokens
            .lock()
            .unwrap()
            .insert(token_hash.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn take_reset_token(&self, token_hash: &str, now: DateTime<Utc>) -> PortResult<Uuid> {
        match self.reset_tokens.lock().unwrap().remove(token_hash) {
            Some((user_id, expires_at)) if expires_at > now => Ok(user_id),
            _ => Err(PortError::NotFound("Reset token not found".to_string())),
        }
    }

    async fn create_book(&self, book: &Book) -> PortResult<()> {
        self.books.lock().unwrap().insert(book.id, book.clone());
        Ok(())
    }

    async fn find_book(&self, book_id: Uuid) -> PortResult<Option<Book>> {
        Ok(self.books.lock().unwrap().get(&book_id).cloned())
    }

    async fn save_book(&self, book: &Book) -> PortResult<()> {
        self.check_writable()?;
        self.books.lock().unwrap().insert(book.id, book.clone());
        Ok(())
    }

    async fn delete_book(&self, book_id: Uuid) -> PortResult<()> {
        self.books
            .lock()
            .unwrap()
            .remove(&book_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("Book {book_id} not found")))
    }

    async fn list_books_for_user(&self, user_id: Uuid) -> PortResult<Vec<Book>> {
        let mut books: Vec<Book> = self
            .books
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.author_id == user_id || b.collaborator(user_id).is_some())
            .cloned()
            .collect();
        books.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(books)
    }

    async fn list_public_books(&self, limit: i64, offset: i64) -> PortResult<Vec<Book>> {
        let mut books: Vec<Book> = self
            .books
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.status == BookStatus::Published && b.visibility == Visibility::Public)
            .cloned()
            .collect();
        books.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(books
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn list_books_by_author(&self, author_id: Uuid) -> PortResult<Vec<Book>> {
        Ok(self
            .books
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.author_id == author_id)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> PortResult<()> {
        Ok(())
    }
}

/// Answers every prompt with a fixed text and counts the calls.
pub struct FakeLlm {
    response: Mutex<String>,
    calls: AtomicUsize,
}

impl FakeLlm {
    pub fn new(response: &str) -> Self {
        Self {
            response: Mutex::new(response.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn respond_with(&self, response: &str) {
        *self.response.lock().unwrap() = response.to_string();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerationService for FakeLlm {
    async fn generate(&self, _prompt: &Prompt) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.lock().unwrap().clone())
    }
}

#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait]
impl MailService for FakeMailer {
    async fn send(&self, email: OutgoingEmail) -> PortResult<()> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFileStore {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryFileStore {
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn save(&self, name: &str, bytes: &[u8]) -> PortResult<String> {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), bytes.to_vec());
        Ok(format!("/uploads/{name}"))
    }

    async fn delete(&self, name: &str) -> PortResult<()> {
        self.files
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("File {name} not found")))
    }
}

/// Stores uploads unchanged.
pub struct PassthroughImages;

impl ImageProcessor for PassthroughImages {
    fn process(&self, bytes: &[u8], _kind: ImageKind) -> PortResult<ProcessedImage> {
        Ok(ProcessedImage {
            bytes: bytes.to_vec(),
            extension: "jpg",
        })
    }
}

//=========================================================================================
// Test application
//=========================================================================================

pub struct TestApp {
    pub router: Router,
    pub db: Arc<InMemoryDb>,
    pub llm: Arc<FakeLlm>,
    pub mailer: Arc<FakeMailer>,
    pub files: Arc<MemoryFileStore>,
}

pub fn test_config() -> Config {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("DATABASE_URL", "postgres://unused"),
        ("JWT_SECRET", "integration-test-secret-0123456789abcdef"),
        ("UPLOAD_DIR", "./target/test-uploads"),
    ]);
    Config::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap()
}

impl TestApp {
    pub fn new() -> Self {
        let db = Arc::new(InMemoryDb::default());
        let llm = Arc::new(FakeLlm::new("The tide came in slowly."));
        let mailer = Arc::new(FakeMailer::default());
        let files = Arc::new(MemoryFileStore::default());
        let state = Arc::new(AppState {
            db: db.clone(),
            config: Arc::new(test_config()),
            llm: Some(llm.clone()),
            mailer: Some(mailer.clone()),
            files: files.clone(),
            images: Arc::new(PassthroughImages),
            pdf_renderer: Arc::new(PdfRenderer),
            docx_renderer: Arc::new(DocxRenderer),
        });
        Self {
            router: build_router(state, false),
            db,
            llm,
            mailer,
            files,
        }
    }

    /// Sends a request and returns the raw response.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };
        self.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    /// Sends a request and parses the JSON body.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let response = self.send(method, uri, token, body).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    /// Posts a multipart form with one file part plus plain text fields.
    pub async fn upload(
        &self,
        uri: &str,
        token: &str,
        field: &str,
        content_type: &str,
        bytes: &[u8],
        text_fields: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        const BOUNDARY: &str = "quillwright-test-boundary";
        let mut body = Vec::new();
        for (name, value) in text_fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    /// Registers an account and returns its id and token.
    pub async fn register(&self, name: &str, email: &str) -> (Uuid, String) {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/auth/register",
                None,
                Some(serde_json::json!({
                    "name": name,
                    "email": email,
                    "password": "secret123",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        let id = body["data"]["user"]["id"].as_str().unwrap().parse().unwrap();
        let token = body["data"]["token"].as_str().unwrap().to_string();
        (id, token)
    }

    /// Creates a book and returns its id.
    pub async fn create_book(&self, token: &str, title: &str, visibility: &str) -> Uuid {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/books",
                Some(token),
                Some(serde_json::json!({ "title": title, "visibility": visibility })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create book failed: {body}");
        body["data"]["id"].as_str().unwrap().parse().unwrap()
    }

    /// Adds a chapter and returns its id.
    pub async fn add_chapter(&self, token: &str, book_id: Uuid, title: &str, content: &str) -> Uuid {
        let (status, body) = self
            .call(
                Method::POST,
                &format!("/api/books/{book_id}/chapters"),
                Some(token),
                Some(serde_json::json!({ "title": title, "content": content })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "add chapter failed: {body}");
        body["data"]["chapter"]["id"].as_str().unwrap().parse().unwrap()
    }
}
