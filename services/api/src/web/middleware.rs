//! services/api/src/web/middleware.rs
//!
//! Authentication middleware and extractors.
//!
//! `authenticate` runs on every API request and records who is calling, if
//! anyone. `require_auth` guards whole route groups; handlers on mixed routes
//! take the `AuthUser` extractor instead.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;
use crate::web::token::{token_from_headers, verify_token};

/// The caller, if a valid token for an active account was presented.
#[derive(Debug, Clone, Copy, Default)]
pub struct Viewer(pub Option<Uuid>);

/// An authenticated caller. Rejects with 401 when there is none.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Resolves the token (bearer header or cookie) and inserts a `Viewer`.
///
/// Invalid tokens and deactivated accounts are treated as anonymous.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut viewer = Viewer(None);

    if let Some(token) = token_from_headers(req.headers()) {
        match verify_token(&token, state.config.jwt_secret.expose_secret()) {
            Ok(claims) => match state.db.get_user_by_id(claims.sub).await {
                Ok(user) if user.is_active => viewer = Viewer(Some(user.id)),
                Ok(_) => debug!(user_id = %claims.sub, "Token for deactivated user"),
                Err(e) => debug!("Token user lookup failed: {e}"),
            },
            Err(e) => debug!("Rejected token: {e}"),
        }
    }

    req.extensions_mut().insert(viewer);
    next.run(req).await
}

/// Rejects the request with 401 unless `authenticate` found a user.
pub async fn require_auth(mut req: Request, next: Next) -> Response {
    let viewer = req.extensions().get::<Viewer>().copied().unwrap_or_default();
    match viewer.0 {
        Some(id) => {
            req.extensions_mut().insert(AuthUser { id });
            next.run(req).await
        }
        None => ApiError::Unauthorized("Not authorized, please log in".to_string()).into_response(),
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(*user);
        }
        parts
            .extensions
            .get::<Viewer>()
            .and_then(|v| v.0)
            .map(|id| AuthUser { id })
            .ok_or_else(|| ApiError::Unauthorized("Not authorized, please log in".to_string()))
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().copied().unwrap_or_default())
    }
}
