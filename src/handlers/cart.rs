// =============================================================================
// CART HANDLERS
// =============================================================================
// All cart routes require a session; the cart is scoped to the caller.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::{AddCartItemRequest, CartItem, CartItemDetail, CartResponse, UpdateCartItemRequest};
use crate::AppState;

/// The caller's cart, priced at their tier.
///
/// GET /api/v1/cart
pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<CartResponse>> {
    let lines = state.db.list_cart(auth_user.user.id).await?;

    let mut total_cents: i64 = 0;
    let items: Vec<CartItemDetail> = lines
        .into_iter()
        .map(|(item, product)| {
            let unit_price_cents = product.price_for(&auth_user.user);
            let line_total_cents = unit_price_cents * i64::from(item.quantity);
            total_cents += line_total_cents;
            CartItemDetail {
                item,
                product,
                unit_price_cents,
                line_total_cents,
            }
        })
        .collect();

    Ok(Json(CartResponse { items, total_cents }))
}

/// Add a product to the cart (accumulates on repeat adds).
///
/// POST /api/v1/cart/items
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Json(request): Json<AddCartItemRequest>,
) -> AppResult<(StatusCode, Json<CartItem>)> {
    if request.quantity <= 0 {
        return Err(AppError::BadRequest("quantity must be positive".to_string()));
    }

    let item = state
        .db
        .add_cart_item(auth_user.user.id, request.product_id, request.quantity)
        .await?;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Set a cart line's quantity.
///
/// PATCH /api/v1/cart/items/{id}
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(request): Json<UpdateCartItemRequest>,
) -> AppResult<Json<CartItem>> {
    if request.quantity <= 0 {
        return Err(AppError::BadRequest("quantity must be positive".to_string()));
    }

    let item = state
        .db
        .update_cart_item(auth_user.user.id, item_id, request.quantity)
        .await?;

    Ok(Json(item))
}

/// Remove a single cart line.
///
/// DELETE /api/v1/cart/items/{id}
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    state.db.remove_cart_item(auth_user.user.id, item_id).await?;

    Ok(Json(serde_json::json!({ "status": "removed" })))
}

/// Empty the cart.
///
/// DELETE /api/v1/cart
pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<serde_json::Value>> {
    state.db.clear_cart(auth_user.user.id).await?;

    Ok(Json(serde_json::json!({ "status": "cleared" })))
}
