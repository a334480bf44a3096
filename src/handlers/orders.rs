// =============================================================================
// ORDER HANDLERS
// =============================================================================
// Checkout and order reads for buyers, plus the admin-only status transition
// that drives the order lifecycle and stock reconciliation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::auth::{AdminUser, AuthUser};
use crate::error::{AppError, AppResult};
use crate::handlers::products::invalidate_product_cache;
use crate::metrics;
use crate::models::{Order, OrderDetail, OrderStatus, UpdateOrderStatusRequest};
use crate::AppState;

/// Checkout: turn the caller's cart into a PENDING order.
///
/// POST /api/v1/orders
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<(StatusCode, Json<OrderDetail>)> {
    let start = Instant::now();

    let detail = state.db.create_order_from_cart(&auth_user.user).await?;

    let duration = start.elapsed().as_secs_f64();
    metrics::record_http_request("POST", "/api/v1/orders", 201, duration);
    metrics::record_db_query("insert", duration);
    metrics::record_order_created(&auth_user.user.role);

    tracing::info!(
        order_id = %detail.order.id,
        user_id = %auth_user.user.id,
        total_cents = detail.order.total_cents,
        items = detail.items.len(),
        "Order created"
    );

    Ok((StatusCode::CREATED, Json(detail)))
}

/// The caller's order history, newest first.
///
/// GET /api/v1/orders
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> AppResult<Json<Vec<Order>>> {
    let orders = state.db.list_orders(&auth_user.user).await?;

    Ok(Json(orders))
}

/// One order with items and product snapshots. Owners only; admins may
/// read any order.
///
/// GET /api/v1/orders/{id}
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<OrderDetail>> {
    let detail = state.db.get_order(&auth_user.user, order_id).await?;

    Ok(Json(detail))
}

/// Transition an order to a new status, reconciling stock atomically.
/// Entering DELIVERED decrements each item's product stock (floored at
/// zero); cancelling a DELIVERED order restores it. Admin only.
///
/// PATCH /api/v1/orders/{id}/status
pub async fn update_order_status(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<OrderDetail>> {
    let start = Instant::now();

    // Parsed here, before anything is touched: a bad value is a 400 with no
    // side effects.
    let target = OrderStatus::parse(&request.status).ok_or_else(|| {
        AppError::BadRequest(format!("unrecognized order status: {}", request.status))
    })?;

    let (previous_status, detail) = state.db.transition_order_status(order_id, target).await?;

    let duration = start.elapsed().as_secs_f64();
    metrics::record_http_request("PATCH", "/api/v1/orders/:id/status", 200, duration);
    metrics::record_db_query("update", duration);
    metrics::record_status_transition(&previous_status, target.as_str());

    for item in &detail.items {
        if let Some(product) = &item.product {
            metrics::set_stock_level(&product.name, product.stock_count);
            invalidate_product_cache(&state, product.id).await;
        }
    }

    tracing::info!(
        order_id = %order_id,
        admin_id = %admin.id,
        from = %previous_status,
        to = %target,
        "Order status transitioned"
    );

    Ok(Json(detail))
}
