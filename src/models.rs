// =============================================================================
// MODELS MODULE
// =============================================================================
// Data structures shared across the service: database rows, the order status
// state machine, and API request/response shapes. Rows and API types are kept
// separate so the HTTP surface can evolve without touching the schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// =============================================================================
// ROLES
// =============================================================================
// Buyer tiers plus the back-office role. Stored as TEXT on the users table.

pub mod roles {
    pub const CUSTOMER: &str = "CUSTOMER";
    pub const WHOLESALE: &str = "WHOLESALE";
    pub const ADMIN: &str = "ADMIN";
}

// =============================================================================
// ORDER STATUS
// =============================================================================

/// Fulfillment stage of an order.
///
/// Stored as TEXT on the orders table; incoming values are parsed with
/// [`OrderStatus::parse`] so an unrecognized string is rejected as a 400
/// before anything is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Parse one of the six recognized values. Anything else is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "CONFIRMED" => Some(Self::Confirmed),
            "PROCESSING" => Some(Self::Processing),
            "SHIPPED" => Some(Self::Shipped),
            "DELIVERED" => Some(Self::Delivered),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Processing => "PROCESSING",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment states. Mutated by the payment collaborator, never by this
/// service; orders are created with `PENDING`.
pub mod payment_status {
    pub const PENDING: &str = "PENDING";
    pub const PAID: &str = "PAID";
    pub const REFUNDED: &str = "REFUNDED";
}

// =============================================================================
// USERS
// =============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,

    pub email: String,

    /// Argon2id PHC string. Never serialized into responses.
    #[serde(skip_serializing)]
    pub password_hash: String,

    pub name: String,

    /// One of [`roles`].
    pub role: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == roles::ADMIN
    }

    pub fn is_wholesale(&self) -> bool {
        self.role == roles::WHOLESALE
    }
}

// =============================================================================
// PRODUCTS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,

    pub name: String,

    pub description: Option<String>,

    /// Catalog grouping, e.g. "wings", "thighs", "whole"
    pub category: String,

    /// Retail price in cents
    pub price_cents: i64,

    /// Business-tier price in cents
    pub wholesale_price_cents: i64,

    /// Units on hand. Decremented only by delivery transitions, incremented
    /// only by cancellation-of-delivered transitions or explicit restocking.
    /// Never negative (DB CHECK + floor in the lifecycle planner).
    pub stock_count: i32,

    /// Normally derived from stock_count, but an explicit admin edit may
    /// force it either way.
    pub in_stock: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Price charged to this user: wholesale tier gets the wholesale price.
    pub fn price_for(&self, user: &User) -> i64 {
        if user.is_wholesale() {
            self.wholesale_price_cents
        } else {
            self.price_cents
        }
    }
}

// =============================================================================
// CART
// =============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cart line joined with its product and priced for the caller's tier.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemDetail {
    #[serde(flatten)]
    pub item: CartItem,
    pub product: Product,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartResponse {
    pub items: Vec<CartItemDetail>,
    pub total_cents: i64,
}

// =============================================================================
// ORDERS
// =============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,

    /// One of the six [`OrderStatus`] values, as stored.
    pub status: String,

    /// One of [`payment_status`].
    pub payment_status: String,

    pub total_cents: i64,

    // Transition timestamps. Each is stamped once, on first entry to the
    // corresponding status, and never overwritten.
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Line of an order. Created atomically with the order at checkout;
/// `price_cents` is the tier-effective price snapshot and never changes.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemDetail {
    #[serde(flatten)]
    pub item: OrderItem,
    /// Current product snapshot; None if the product was since deleted.
    pub product: Option<Product>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItemDetail>,
}

// =============================================================================
// REVIEWS
// =============================================================================

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    /// 1..=5
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review row joined with the author's display name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub author_name: String,
    pub rating: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// API REQUEST BODIES
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,

    /// Request the business (wholesale) buyer tier.
    #[serde(default)]
    pub business: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

/// Body for POST and PUT on products. `in_stock` omitted means "derive from
/// stock_count"; present means an explicit admin override.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductPayload {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price_cents: i64,
    pub wholesale_price_cents: i64,
    pub stock_count: i32,
    pub in_stock: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestockRequest {
    pub quantity: i32,
}

/// Body for PATCH /api/v1/orders/{id}/status. The status arrives as a raw
/// string and is parsed explicitly so a bad value is a 400, not a 422.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: i32,
    pub comment: Option<String>,
}

// =============================================================================
// API RESPONSES
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
    pub total: i64,
    pub page: i32,
    pub per_page: i32,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LowStockProduct {
    pub id: Uuid,
    pub name: String,
    pub stock_count: i32,
}

/// Back-office summary report.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    /// Revenue of delivered orders, in cents
    pub revenue_cents: i64,
    pub orders_by_status: Vec<StatusCount>,
    pub total_users: i64,
    pub total_products: i64,
    pub total_reviews: i64,
    pub low_stock: Vec<LowStockProduct>,
}

// =============================================================================
// HEALTH CHECK RESPONSES
// =============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub database: bool,
    pub redis: bool,
}

// =============================================================================
// ERROR RESPONSES
// =============================================================================

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_parses_the_six_recognized_values() {
        for (text, status) in [
            ("PENDING", OrderStatus::Pending),
            ("CONFIRMED", OrderStatus::Confirmed),
            ("PROCESSING", OrderStatus::Processing),
            ("SHIPPED", OrderStatus::Shipped),
            ("DELIVERED", OrderStatus::Delivered),
            ("CANCELLED", OrderStatus::Cancelled),
        ] {
            assert_eq!(OrderStatus::parse(text), Some(status));
            assert_eq!(status.as_str(), text);
        }
    }

    #[test]
    fn order_status_rejects_unrecognized_values() {
        assert_eq!(OrderStatus::parse("SHIPPEDX"), None);
        assert_eq!(OrderStatus::parse("shipped"), None);
        assert_eq!(OrderStatus::parse(""), None);
    }

    fn user_with_role(role: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: "buyer@example.com".to_string(),
            password_hash: String::new(),
            name: "Buyer".to_string(),
            role: role.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn wholesale_tier_gets_wholesale_price() {
        let product = Product {
            id: Uuid::new_v4(),
            name: "Honey Soy Wings 1kg".to_string(),
            description: None,
            category: "wings".to_string(),
            price_cents: 1_499,
            wholesale_price_cents: 1_099,
            stock_count: 10,
            in_stock: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(product.price_for(&user_with_role(roles::CUSTOMER)), 1_499);
        assert_eq!(product.price_for(&user_with_role(roles::WHOLESALE)), 1_099);
        assert_eq!(product.price_for(&user_with_role(roles::ADMIN)), 1_499);
    }
}
