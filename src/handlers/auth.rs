// =============================================================================
// AUTH HANDLERS
// =============================================================================

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::auth::{self, AuthUser};
use crate::error::{AppError, AppResult};
use crate::models::{roles, LoginRequest, LoginResponse, RegisterRequest, User};
use crate::AppState;

/// Register a new buyer account. The business flag requests the wholesale
/// tier; back-office accounts are never created through this endpoint.
///
/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<LoginResponse>)> {
    let email = request.email.trim().to_lowercase();
    if !email.contains('@') || email.len() > 255 {
        return Err(AppError::BadRequest("invalid email address".to_string()));
    }
    if request.password.len() < 8 {
        return Err(AppError::BadRequest(
            "password must be at least 8 characters".to_string(),
        ));
    }
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }

    let role = if request.business {
        roles::WHOLESALE
    } else {
        roles::CUSTOMER
    };

    let password_hash = auth::hash_password(&request.password)?;
    let user = state
        .db
        .create_user(&email, &password_hash, name, role)
        .await?;

    let token = auth::create_session(&mut state.redis.clone(), user.id).await?;

    tracing::info!(user_id = %user.id, role = role, "User registered");

    Ok((StatusCode::CREATED, Json(LoginResponse { token, user })))
}

/// Exchange credentials for a session token.
///
/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let email = request.email.trim().to_lowercase();

    // Same message for unknown email and wrong password.
    let invalid = || AppError::Unauthorized("invalid email or password".to_string());

    let user = state
        .db
        .get_user_by_email(&email)
        .await?
        .ok_or_else(invalid)?;

    if !auth::verify_password(&request.password, &user.password_hash)? {
        return Err(invalid());
    }

    let token = auth::create_session(&mut state.redis.clone(), user.id).await?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(LoginResponse { token, user }))
}

/// Invalidate the caller's session.
///
/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    auth::destroy_session(&mut state.redis.clone(), &auth_user.token).await?;

    Ok(Json(serde_json::json!({ "status": "logged_out" })))
}

/// The caller's own account.
///
/// GET /api/v1/auth/me
pub async fn me(auth_user: AuthUser) -> Json<User> {
    Json(auth_user.user)
}
