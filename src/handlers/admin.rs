// =============================================================================
// ADMIN HANDLERS
// =============================================================================
// Back-office catalog management, order oversight, and reporting. Every
// route takes the AdminUser guard; a non-admin session is a 401 before any
// work happens.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::error::{AppError, AppResult};
use crate::handlers::products::invalidate_product_cache;
use crate::metrics;
use crate::models::{Order, OrderStatus, Product, ProductPayload, RestockRequest, SummaryReport};
use crate::AppState;

fn validate_product_payload(payload: &ProductPayload) -> AppResult<()> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("product name is required".to_string()));
    }
    if payload.category.trim().is_empty() {
        return Err(AppError::BadRequest("category is required".to_string()));
    }
    if payload.price_cents < 0 || payload.wholesale_price_cents < 0 {
        return Err(AppError::BadRequest("prices must not be negative".to_string()));
    }
    if payload.stock_count < 0 {
        return Err(AppError::BadRequest(
            "stock_count must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Add a product to the catalog.
///
/// POST /api/v1/products
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<ProductPayload>,
) -> AppResult<(StatusCode, Json<Product>)> {
    validate_product_payload(&payload)?;

    let product = state.db.create_product(&payload).await?;

    metrics::set_stock_level(&product.name, product.stock_count);
    tracing::info!(product_id = %product.id, admin_id = %admin.id, "Product created");

    Ok((StatusCode::CREATED, Json(product)))
}

/// Replace a product's fields. Supplying `in_stock` overrides the derived
/// value, forcing the product in or out of stock.
///
/// PUT /api/v1/products/{id}
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProductPayload>,
) -> AppResult<Json<Product>> {
    validate_product_payload(&payload)?;

    let product = state.db.update_product(id, &payload).await?;

    invalidate_product_cache(&state, id).await;
    metrics::set_stock_level(&product.name, product.stock_count);
    tracing::info!(product_id = %id, admin_id = %admin.id, "Product updated");

    Ok(Json(product))
}

/// Remove a product from the catalog. Existing order items keep their
/// snapshots; carts and reviews referencing it are cascaded away.
///
/// DELETE /api/v1/products/{id}
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<serde_json::Value>> {
    state.db.delete_product(id).await?;

    invalidate_product_cache(&state, id).await;
    tracing::info!(product_id = %id, admin_id = %admin.id, "Product deleted");

    Ok(Json(serde_json::json!({ "status": "deleted" })))
}

/// Receive stock: add units to a product and put it back in stock.
///
/// POST /api/v1/products/{id}/restock
pub async fn restock_product(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<RestockRequest>,
) -> AppResult<Json<Product>> {
    if request.quantity <= 0 {
        return Err(AppError::BadRequest("quantity must be positive".to_string()));
    }

    let product = state.db.restock_product(id, request.quantity).await?;

    invalidate_product_cache(&state, id).await;
    metrics::set_stock_level(&product.name, product.stock_count);
    tracing::info!(
        product_id = %id,
        admin_id = %admin.id,
        quantity = request.quantity,
        new_stock = product.stock_count,
        "Product restocked"
    );

    Ok(Json(product))
}

#[derive(Debug, Deserialize)]
pub struct OrderListParams {
    pub status: Option<String>,
}

/// Every order in the system, optionally filtered by status.
///
/// GET /api/v1/admin/orders?status=PENDING
pub async fn list_all_orders(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
    Query(params): Query<OrderListParams>,
) -> AppResult<Json<Vec<Order>>> {
    let status = match params.status.as_deref() {
        Some(raw) => Some(OrderStatus::parse(raw).ok_or_else(|| {
            AppError::BadRequest(format!("unrecognized order status: {raw}"))
        })?),
        None => None,
    };

    let orders = state.db.list_all_orders(status).await?;

    Ok(Json(orders))
}

/// Back-office summary: delivered revenue, order counts by status, user and
/// review totals, and the low-stock list.
///
/// GET /api/v1/admin/reports/summary
pub async fn summary_report(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> AppResult<Json<SummaryReport>> {
    let report = state.db.summary_report().await?;

    metrics::set_low_stock_count(report.low_stock.len() as i64);

    Ok(Json(report))
}
