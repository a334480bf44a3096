// =============================================================================
// REVIEW HANDLERS
// =============================================================================

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::{CreateReviewRequest, Review, ReviewDetail};
use crate::AppState;

/// Reviews for a product, newest first.
///
/// GET /api/v1/products/{id}/reviews
pub async fn list_product_reviews(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Vec<ReviewDetail>>> {
    let reviews = state.db.list_reviews(product_id).await?;

    Ok(Json(reviews))
}

/// Leave a review. One per user per product; reviewing again replaces the
/// earlier rating and comment.
///
/// POST /api/v1/products/{id}/reviews
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(request): Json<CreateReviewRequest>,
) -> AppResult<(StatusCode, Json<Review>)> {
    if !(1..=5).contains(&request.rating) {
        return Err(AppError::BadRequest(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    let review = state
        .db
        .upsert_review(
            auth_user.user.id,
            product_id,
            request.rating,
            request.comment.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(review)))
}

/// Delete a review. Owners delete their own; admins may delete any.
///
/// DELETE /api/v1/reviews/{id}
pub async fn delete_review(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(review_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    state.db.delete_review(&auth_user.user, review_id).await?;

    Ok(Json(serde_json::json!({ "status": "deleted" })))
}
