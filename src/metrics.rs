// =============================================================================
// METRICS MODULE
// =============================================================================
// Prometheus metrics, exposed at /metrics in text exposition format.

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

// -----------------------------------------------------------------------------
// METRIC NAMES
// -----------------------------------------------------------------------------

/// HTTP request counter. Labels: method, endpoint, status
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// HTTP request duration histogram. Labels: method, endpoint
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Database query duration histogram. Labels: operation
pub const DB_QUERY_DURATION_SECONDS: &str = "db_query_duration_seconds";

/// Redis operation duration histogram. Labels: operation
pub const REDIS_OPERATION_DURATION_SECONDS: &str = "redis_operation_duration_seconds";

/// Checkout counter. Labels: tier (buyer role at checkout)
pub const ORDERS_CREATED_TOTAL: &str = "storefront_orders_created_total";

/// Order lifecycle transition counter. Labels: from, to
pub const ORDER_STATUS_TRANSITIONS_TOTAL: &str = "storefront_order_status_transitions_total";

/// Per-product stock gauge. Labels: product
pub const PRODUCT_STOCK_LEVEL: &str = "storefront_product_stock_level";

/// Count of products at or below the low-stock threshold
pub const LOW_STOCK_PRODUCTS: &str = "storefront_low_stock_products";

// -----------------------------------------------------------------------------
// SETUP
// -----------------------------------------------------------------------------

/// Install the Prometheus recorder and return the render handle.
pub fn setup_metrics() -> Result<PrometheusHandle> {
    let latency_buckets = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(DB_QUERY_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(REDIS_OPERATION_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .install_recorder()?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request latency in seconds"
    );
    describe_histogram!(
        DB_QUERY_DURATION_SECONDS,
        "Database query latency in seconds"
    );
    describe_histogram!(
        REDIS_OPERATION_DURATION_SECONDS,
        "Redis operation latency in seconds"
    );
    describe_counter!(ORDERS_CREATED_TOTAL, "Orders created at checkout");
    describe_counter!(
        ORDER_STATUS_TRANSITIONS_TOTAL,
        "Order status transitions applied by the back office"
    );
    describe_gauge!(PRODUCT_STOCK_LEVEL, "Current stock count per product");
    describe_gauge!(
        LOW_STOCK_PRODUCTS,
        "Number of products at or below the low-stock threshold"
    );

    Ok(handle)
}

// -----------------------------------------------------------------------------
// HELPERS
// -----------------------------------------------------------------------------

pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .record(duration_secs);
}

pub fn record_db_query(operation: &str, duration_secs: f64) {
    histogram!(
        DB_QUERY_DURATION_SECONDS,
        "operation" => operation.to_string()
    )
    .record(duration_secs);
}

pub fn record_redis_operation(operation: &str, duration_secs: f64) {
    histogram!(
        REDIS_OPERATION_DURATION_SECONDS,
        "operation" => operation.to_string()
    )
    .record(duration_secs);
}

pub fn record_order_created(tier: &str) {
    counter!(
        ORDERS_CREATED_TOTAL,
        "tier" => tier.to_string()
    )
    .increment(1);
}

pub fn record_status_transition(from: &str, to: &str) {
    counter!(
        ORDER_STATUS_TRANSITIONS_TOTAL,
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

pub fn set_stock_level(product: &str, level: i32) {
    gauge!(
        PRODUCT_STOCK_LEVEL,
        "product" => product.to_string()
    )
    .set(level as f64);
}

pub fn set_low_stock_count(count: i64) {
    gauge!(LOW_STOCK_PRODUCTS).set(count as f64);
}
