//! services/api/src/web/token.rs
//!
//! JWT issuing and verification, plus the auth cookie format.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the cookie carrying the JWT.
pub const AUTH_COOKIE: &str = "token";

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token encoding failed: {0}")]
    Encode(String),
    #[error("Invalid or expired token")]
    Invalid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
}

/// Signs an HS256 token for `user_id` valid for `expires_days`.
pub fn issue_token(user_id: Uuid, secret: &str, expires_days: i64) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        iat: now.timestamp() as usize,
        exp: (now + Duration::days(expires_days)).timestamp() as usize,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Encode(e.to_string()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| TokenError::Invalid)
}

pub fn auth_cookie(token: &str, expires_days: i64) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        AUTH_COOKIE,
        token,
        Duration::days(expires_days).num_seconds()
    )
}

pub fn clear_auth_cookie() -> String {
    format!("{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0", AUTH_COOKIE)
}

/// Extracts the token from `Authorization: Bearer` or the auth cookie, in that order.
pub fn token_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    use axum::http::header;

    if let Some(bearer) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        let bearer = bearer.trim();
        if !bearer.is_empty() {
            return Some(bearer.to_string());
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| {
            c.trim()
                .strip_prefix(AUTH_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue};

    const SECRET: &str = "test-secret-that-is-long-enough-000";

    #[test]
    fn token_round_trip() {
        let user = Uuid::new_v4();
        let token = issue_token(user, SECRET, 7).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(Uuid::new_v4(), SECRET, 7).unwrap();
        assert!(verify_token(&token, "another-secret-that-is-long-enough").is_err());
        assert!(verify_token("garbage", SECRET).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = issue_token(Uuid::new_v4(), SECRET, -1).unwrap();
        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=from-cookie"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-cookie"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn similar_cookie_names_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("tokenizer=x; token="));
        assert_eq!(token_from_headers(&headers), None);
    }
}
