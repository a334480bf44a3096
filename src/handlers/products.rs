// =============================================================================
// CATALOG HANDLERS
// =============================================================================
// Public product listing and detail. Detail reads go through a Redis cache
// with a short TTL; every write path (admin mutations, stock reconciliation)
// deletes the cached entry.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{Product, ProductListResponse};
use crate::AppState;

/// Cache TTL for product detail reads.
const PRODUCT_CACHE_TTL_SECONDS: u64 = 300;

pub fn product_cache_key(id: Uuid) -> String {
    format!("product:{id}")
}

/// Delete a product's cache entry after a write. Best-effort: a cache miss
/// on the next read just goes to the database.
pub async fn invalidate_product_cache(state: &AppState, id: Uuid) {
    let _: Result<(), _> = redis::cmd("DEL")
        .arg(product_cache_key(id))
        .query_async(&mut state.redis.clone())
        .await;
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_page")]
    pub page: i32,

    #[serde(default = "default_per_page")]
    pub per_page: i32,

    pub category: Option<String>,

    /// Case-insensitive name filter
    pub search: Option<String>,
}

fn default_page() -> i32 {
    1
}
fn default_per_page() -> i32 {
    20
}

/// List catalog products with pagination and optional filters.
///
/// GET /api/v1/products?page=1&per_page=20&category=wings&search=honey
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<ProductListResponse>> {
    let start = Instant::now();

    let page = params.page.max(1);
    let per_page = params.per_page.clamp(1, 100);

    let (products, total) = state
        .db
        .list_products(
            page,
            per_page,
            params.category.as_deref(),
            params.search.as_deref(),
        )
        .await?;

    let duration = start.elapsed().as_secs_f64();
    metrics::record_http_request("GET", "/api/v1/products", 200, duration);
    metrics::record_db_query("select", duration);

    for product in &products {
        metrics::set_stock_level(&product.name, product.stock_count);
    }

    Ok(Json(ProductListResponse {
        products,
        total,
        page,
        per_page,
    }))
}

/// Get a single product, read-through cached.
///
/// GET /api/v1/products/{id}
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let start = Instant::now();

    let cache_key = product_cache_key(id);
    let cached: Option<String> = redis::cmd("GET")
        .arg(&cache_key)
        .query_async(&mut state.redis.clone())
        .await
        .ok();

    if let Some(cached_json) = cached {
        if let Ok(product) = serde_json::from_str::<Product>(&cached_json) {
            let duration = start.elapsed().as_secs_f64();
            metrics::record_http_request("GET", "/api/v1/products/:id", 200, duration);
            metrics::record_redis_operation("get", duration);
            return Ok(Json(product));
        }
    }

    let product = state
        .db
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product not found: {id}")))?;

    let product_json = serde_json::to_string(&product).unwrap_or_default();
    let _: Result<(), _> = redis::cmd("SETEX")
        .arg(&cache_key)
        .arg(PRODUCT_CACHE_TTL_SECONDS)
        .arg(&product_json)
        .query_async(&mut state.redis.clone())
        .await;

    let duration = start.elapsed().as_secs_f64();
    metrics::record_http_request("GET", "/api/v1/products/:id", 200, duration);
    metrics::record_db_query("select", duration);

    Ok(Json(product))
}
