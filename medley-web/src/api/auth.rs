//! Session authentication
//!
//! Bearer-token sessions backed by the sessions table. The `CurrentUser`
//! extractor resolves the token on every user-scoped route and rejects the
//! request with 401 when the session is absent or expired.

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts},
    routing::post,
    Json, Router,
};
use chrono::{Duration, Utc};
use medley_common::db::models::Session;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::db;
use crate::{ApiError, ApiResult, AppState};

/// Session lifetime
const SESSION_TTL_DAYS: i64 = 30;

/// Length of generated session tokens
const TOKEN_LENGTH: usize = 48;

/// The authenticated caller, resolved from the Authorization header
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        match db::users::load_session_user(&state.db, token).await? {
            Some(user_id) => Ok(CurrentUser(user_id)),
            None => Err(ApiError::Unauthorized(
                "Session expired or unknown".to_string(),
            )),
        }
    }
}

/// SHA-256 password hash as lowercase hex
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn new_session_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
    pub user_id: Uuid,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = db::users::load_user_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown email or wrong password".to_string()))?;

    if user.password_hash != hash_password(&payload.password) {
        return Err(ApiError::Unauthorized(
            "Unknown email or wrong password".to_string(),
        ));
    }

    let session = Session {
        token: new_session_token(),
        user_id: user.guid,
        expires_at: Utc::now() + Duration::days(SESSION_TTL_DAYS),
        created_at: Utc::now(),
    };
    db::users::save_session(&state.db, &session).await?;

    info!(user_id = %user.guid, "User logged in");

    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.expires_at.to_rfc3339(),
        user_id: user.guid,
    }))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, parts: axum::http::HeaderMap) -> ApiResult<()> {
    let token = parts
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

    db::users::delete_session(&state.db, token).await?;
    Ok(())
}

/// Build auth routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_is_stable_hex() {
        let hash = hash_password("correct horse battery staple");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_password("correct horse battery staple"));
        assert_ne!(hash, hash_password("Tr0ub4dor&3"));
    }

    #[test]
    fn test_new_session_tokens_are_unique() {
        let a = new_session_token();
        let b = new_session_token();
        assert_eq!(a.len(), TOKEN_LENGTH);
        assert_ne!(a, b);
    }
}
