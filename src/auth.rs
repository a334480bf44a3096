// =============================================================================
// AUTH MODULE
// =============================================================================
// Session-based authentication: Argon2id password hashing, opaque bearer
// tokens stored in Redis with a TTL, and the two request guards used across
// the API. `AdminUser` is the single require-admin check; every back-office
// route takes it instead of re-checking roles inline.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::AppState;

/// Sessions live for seven days; re-login refreshes.
const SESSION_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

// -----------------------------------------------------------------------------
// PASSWORD HASHING
// -----------------------------------------------------------------------------

/// Hash a password with Argon2id, producing a PHC string for storage.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

    Ok(hash.to_string())
}

/// Verify a password against a stored PHC string.
pub fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::Internal(format!("stored password hash is invalid: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

// -----------------------------------------------------------------------------
// SESSIONS (Redis)
// -----------------------------------------------------------------------------

fn session_key(token: &str) -> String {
    format!("session:{token}")
}

/// Mint a session for the user and return the opaque token.
pub async fn create_session(
    redis: &mut redis::aio::ConnectionManager,
    user_id: Uuid,
) -> AppResult<String> {
    let token = Uuid::new_v4().simple().to_string();

    redis::cmd("SETEX")
        .arg(session_key(&token))
        .arg(SESSION_TTL_SECONDS)
        .arg(user_id.to_string())
        .query_async::<_, ()>(redis)
        .await?;

    Ok(token)
}

/// Resolve a token to the user id it was minted for, if still live.
pub async fn get_session(
    redis: &mut redis::aio::ConnectionManager,
    token: &str,
) -> AppResult<Option<Uuid>> {
    let stored: Option<String> = redis::cmd("GET")
        .arg(session_key(token))
        .query_async(redis)
        .await?;

    Ok(stored.and_then(|s| Uuid::parse_str(&s).ok()))
}

pub async fn destroy_session(
    redis: &mut redis::aio::ConnectionManager,
    token: &str,
) -> AppResult<()> {
    redis::cmd("DEL")
        .arg(session_key(token))
        .query_async::<_, ()>(redis)
        .await?;

    Ok(())
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
}

// -----------------------------------------------------------------------------
// REQUEST GUARDS
// -----------------------------------------------------------------------------

/// Any logged-in user. Rejects with 401 when the token is missing, expired,
/// or points at a deleted account.
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        let user_id = get_session(&mut state.redis.clone(), &token)
            .await?
            .ok_or_else(|| AppError::Unauthorized("session expired or invalid".to_string()))?;

        let user = state
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("session user no longer exists".to_string()))?;

        Ok(AuthUser { user, token })
    }
}

/// A logged-in ADMIN. 401 for everyone else, logged-in or not.
pub struct AdminUser(pub User);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser { user, .. } = AuthUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(AppError::Unauthorized("admin access required".to_string()));
        }

        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip_verifies() {
        let hash = hash_password("chicken-fan-42").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("chicken-fan-42", &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn garbage_stored_hash_is_an_internal_error() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(AppError::Internal(_))
        ));
    }
}
