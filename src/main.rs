// =============================================================================
// STOREFRONT SERVICE - Main Entry Point
// =============================================================================
// API backend for the marinated-chicken storefront:
// - catalog, cart, checkout, and order history for retail and wholesale buyers
// - admin back office: catalog management, order lifecycle, reports
// - order status transitions reconcile product stock atomically
// - Prometheus metrics and JSON structured logs

mod auth; // Sessions, password hashing, request guards (auth.rs)
mod config; // Configuration loading (config.rs)
mod db; // Database operations (db.rs)
mod error; // Error types (error.rs)
mod handlers; // HTTP request handlers (handlers/)
mod lifecycle; // Order status state machine (lifecycle.rs)
mod metrics; // Prometheus metrics setup (metrics.rs)
mod models; // Data structures (models.rs)

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;
use crate::metrics::setup_metrics;

/// Shared state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,

    /// Redis connection: sessions + product read cache
    pub redis: redis::aio::ConnectionManager,

    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // RUST_LOG controls levels, e.g. RUST_LOG=info,storefront_service=debug
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,storefront_service=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Storefront Service...");

    let config = Config::from_env()?;
    info!(port = config.port, "Configuration loaded");

    let metrics_handle = setup_metrics()?;
    info!("Prometheus metrics initialized");

    let db = Database::connect(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    db.run_migrations().await?;
    info!("Database migrations completed");

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let password_hash = auth::hash_password(password)
            .map_err(|e| anyhow::anyhow!("failed to hash admin password: {e}"))?;
        db.ensure_admin(email, &password_hash, "Store Admin").await?;
        info!(email = %email, "Bootstrap admin ensured");
    }

    let redis_client = redis::Client::open(config.redis_url.as_str())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;
    info!("Connected to Redis");

    let state = Arc::new(AppState {
        db,
        redis: redis_conn,
        metrics_handle,
    });

    let app = Router::new()
        // ----- Health & Metrics -----
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        // ----- Auth -----
        .route("/api/v1/auth/register", post(handlers::auth::register))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route("/api/v1/auth/me", get(handlers::auth::me))
        // ----- Catalog -----
        // Reads are public; mutations carry the admin guard.
        .route(
            "/api/v1/products",
            get(handlers::products::list_products).post(handlers::admin::create_product),
        )
        .route(
            "/api/v1/products/:id",
            get(handlers::products::get_product)
                .put(handlers::admin::update_product)
                .delete(handlers::admin::delete_product),
        )
        .route(
            "/api/v1/products/:id/restock",
            post(handlers::admin::restock_product),
        )
        // ----- Reviews -----
        .route(
            "/api/v1/products/:id/reviews",
            get(handlers::reviews::list_product_reviews).post(handlers::reviews::create_review),
        )
        .route(
            "/api/v1/reviews/:id",
            axum::routing::delete(handlers::reviews::delete_review),
        )
        // ----- Cart -----
        .route(
            "/api/v1/cart",
            get(handlers::cart::get_cart).delete(handlers::cart::clear_cart),
        )
        .route("/api/v1/cart/items", post(handlers::cart::add_item))
        .route(
            "/api/v1/cart/items/:id",
            patch(handlers::cart::update_item).delete(handlers::cart::remove_item),
        )
        // ----- Orders -----
        .route(
            "/api/v1/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route("/api/v1/orders/:id", get(handlers::orders::get_order))
        .route(
            "/api/v1/orders/:id/status",
            patch(handlers::orders::update_order_status),
        )
        // ----- Back office -----
        .route("/api/v1/admin/orders", get(handlers::admin::list_all_orders))
        .route(
            "/api/v1/admin/reports/summary",
            get(handlers::admin::summary_report),
        )
        // ----- Middleware -----
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(address = %addr, "Storefront Service is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
