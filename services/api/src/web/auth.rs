//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: register, login, logout, current user, password
//! change and password reset by mail.

use std::sync::{Arc, OnceLock};

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use quillwright_core::{NewUser, OutgoingEmail, PortError, User};
use regex::Regex;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::extract::ApiJson;
use crate::web::middleware::AuthUser;
use crate::web::response::{self, ApiResponse};
use crate::web::state::AppState;
use crate::web::token::{auth_cookie, clear_auth_cookie, issue_token};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_NAME_LEN: usize = 50;
const RESET_TOKEN_MINUTES: i64 = 60;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthPayload {
    pub user: User,
    pub token: String,
}

//=========================================================================================
// Validation and hashing helpers
//=========================================================================================

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

/// Normalizes and validates an email address.
pub fn normalize_email(email: &str) -> ApiResult<String> {
    let email = email.trim().to_lowercase();
    let well_formed = email_regex().is_some_and(|re| re.is_match(&email));
    if email.len() > 254 || !well_formed {
        return Err(ApiError::BadRequest("Please provide a valid email".to_string()));
    }
    Ok(email)
}

pub fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> ApiResult<String> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "Name is required and must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })
}

pub fn verify_password(password: &str, hashed: &str) -> ApiResult<bool> {
    let parsed_hash = PasswordHash::new(hashed).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn session_response(
    state: &AppState,
    status: StatusCode,
    user: User,
) -> ApiResult<impl IntoResponse> {
    let days = state.config.jwt_expires_days;
    let token = issue_token(user.id, state.config.jwt_secret.expose_secret(), days)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let cookie = auth_cookie(&token, days);
    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        response::ok(AuthPayload { user, token }),
    ))
}

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Invalid email or password".to_string())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/register - Create a new user account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created and logged in"),
        (status = 400, description = "Invalid input or email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    // 1. Validate input
    let name = validate_name(&req.name)?;
    let email = normalize_email(&req.email)?;
    validate_password(&req.password)?;

    // 2. Refuse duplicates before doing the expensive hash
    match state.db.get_user_by_email(&email).await {
        Ok(_) => return Err(ApiError::BadRequest("User already exists".to_string())),
        Err(PortError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    // 3. Hash the password and create the user
    let hashed_password = hash_password(&req.password)?;
    let user = state
        .db
        .create_user(NewUser {
            name,
            email,
            hashed_password,
        })
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => ApiError::BadRequest("User already exists".to_string()),
            other => other.into(),
        })?;
    info!(user_id = %user.id, "User registered");

    state
        .send_mail(OutgoingEmail {
            to: user.email.clone(),
            subject: "Welcome to Quillwright".to_string(),
            text_body: format!(
                "Hi {},\n\nYour account is ready. Start your first book at {}.\n",
                user.name, state.config.public_url
            ),
        })
        .await;

    // 4. Issue the token and cookie
    session_response(&state, StatusCode::CREATED, user)
}

/// POST /api/auth/login - Login with an existing account
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();

    // 1. Get user by email
    let creds = state.db.get_user_by_email(&email).await.map_err(|e| match e {
        PortError::NotFound(_) => invalid_credentials(),
        other => other.into(),
    })?;

    // 2. Verify password
    if !verify_password(&req.password, &creds.hashed_password)? {
        return Err(invalid_credentials());
    }
    if !creds.is_active {
        return Err(ApiError::Unauthorized("Account has been deactivated".to_string()));
    }

    // 3. Record the login and issue the token
    let now = Utc::now();
    state.db.record_login(creds.user_id, now).await?;
    let user = state.db.get_user_by_id(creds.user_id).await?;

    session_response(&state, StatusCode::OK, user)
}

/// POST /api/auth/logout - Clear the auth cookie
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Logout successful"))
)]
pub async fn logout_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, clear_auth_cookie())],
        response::message("Logged out"),
    )
}

/// GET /api/auth/me - The current user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResult<Json<ApiResponse<User>>> {
    let user = state.db.get_user_by_id(user.id).await?;
    Ok(response::ok(user))
}

/// PUT /api/auth/password - Change password
#[utoipa::path(
    put,
    path = "/api/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "New password too short"),
        (status = 401, description = "Current password is wrong")
    )
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_password(&req.new_password)?;
    let creds = state.db.get_credentials_by_id(user.id).await?;
    if !verify_password(&req.current_password, &creds.hashed_password)? {
        return Err(ApiError::Unauthorized("Current password is incorrect".to_string()));
    }
    let hashed = hash_password(&req.new_password)?;
    state.db.update_password(user.id, &hashed).await?;
    Ok(response::message("Password updated"))
}

/// POST /api/auth/forgot-password - Mail a reset link
///
/// Always answers the same way so the endpoint does not reveal which accounts exist.
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses((status = 200, description = "Reset mail sent if the account exists"))
)]
pub async fn forgot_password_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    let reply = "If an account exists for that email, a reset link has been sent";

    let creds = match state.db.get_user_by_email(&email).await {
        Ok(creds) if creds.is_active => creds,
        Ok(_) | Err(PortError::NotFound(_)) => return Ok(response::message(reply)),
        Err(e) => return Err(e.into()),
    };

    let token = Uuid::new_v4().simple().to_string();
    let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_MINUTES);
    state
        .db
        .set_reset_token(creds.user_id, &hash_reset_token(&token), expires_at)
        .await?;

    state
        .send_mail(OutgoingEmail {
            to: creds.email,
            subject: "Reset your Quillwright password".to_string(),
            text_body: format!(
                "Use the link below to choose a new password. It expires in {RESET_TOKEN_MINUTES} minutes.\n\n{}/reset-password/{}\n",
                state.config.public_url.trim_end_matches('/'),
                token
            ),
        })
        .await;

    Ok(response::message(reply))
}

/// POST /api/auth/reset-password - Set a new password with a mailed token
#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset"),
        (status = 400, description = "Invalid or expired token")
    )
)]
pub async fn reset_password_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_password(&req.password)?;
    let user_id = state
        .db
        .take_reset_token(&hash_reset_token(req.token.trim()), Utc::now())
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => {
                ApiError::BadRequest("Invalid or expired reset token".to_string())
            }
            other => other.into(),
        })?;
    let hashed = hash_password(&req.password)?;
    state.db.update_password(user_id, &hashed).await?;
    Ok(response::message("Password has been reset"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ann@Example.COM ").unwrap(), "ann@example.com");
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("a@b").is_err());
        assert!(normalize_email("a b@c.d").is_err());
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn password_hash_round_trip() {
        let hashed = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hashed).unwrap());
        assert!(!verify_password("wrong horse", &hashed).unwrap());
    }

    #[test]
    fn reset_tokens_are_hashed() {
        let hashed = hash_reset_token("abc");
        assert_eq!(hashed.len(), 64);
        assert_ne!(hashed, "abc");
    }
}
