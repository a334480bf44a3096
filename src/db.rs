// =============================================================================
// DATABASE MODULE
// =============================================================================
// All PostgreSQL access, wrapped in a `Database` struct over a SQLx pool.
// Startup paths (connect, migrate, seed) return anyhow::Result with context;
// request paths return AppResult so handlers surface precise status codes.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::lifecycle::{plan_transition, StockLine};
use crate::models::{
    payment_status, CartItem, LowStockProduct, Order, OrderDetail, OrderItem, OrderItemDetail,
    OrderStatus, Product, ProductPayload, Review, ReviewDetail, StatusCount, SummaryReport, User,
};

/// Products at or below this count show up in the back-office low-stock list.
pub const LOW_STOCK_THRESHOLD: i32 = 10;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    // -------------------------------------------------------------------------
    // CONNECTION
    // -------------------------------------------------------------------------

    /// Create a new database connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(2)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .idle_timeout(std::time::Duration::from_secs(300))
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self { pool })
    }

    // -------------------------------------------------------------------------
    // MIGRATIONS
    // -------------------------------------------------------------------------

    /// Create the schema if it doesn't exist and seed the catalog.
    /// Idempotent, safe to run on every startup.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                email VARCHAR(255) UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                name VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'CUSTOMER',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                CONSTRAINT valid_role CHECK (role IN ('CUSTOMER', 'WHOLESALE', 'ADMIN'))
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create users table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                name VARCHAR(255) NOT NULL,
                description TEXT,
                category VARCHAR(50) NOT NULL,
                price_cents BIGINT NOT NULL,
                wholesale_price_cents BIGINT NOT NULL,
                stock_count INTEGER NOT NULL DEFAULT 0,
                in_stock BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                CONSTRAINT positive_stock CHECK (stock_count >= 0),
                CONSTRAINT positive_prices
                    CHECK (price_cents >= 0 AND wholesale_price_cents >= 0)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create products table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cart_items (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
                quantity INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                CONSTRAINT positive_quantity CHECK (quantity > 0),
                CONSTRAINT one_line_per_product UNIQUE (user_id, product_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create cart_items table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL REFERENCES users(id),
                status VARCHAR(20) NOT NULL DEFAULT 'PENDING',
                payment_status VARCHAR(20) NOT NULL DEFAULT 'PENDING',
                total_cents BIGINT NOT NULL,
                confirmed_at TIMESTAMPTZ,
                shipped_at TIMESTAMPTZ,
                delivered_at TIMESTAMPTZ,
                cancelled_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create orders table")?;

        // product_id carries no foreign key: order items are historical
        // snapshots and must survive catalog deletions.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS order_items (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                order_id UUID NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
                product_id UUID NOT NULL,
                quantity INTEGER NOT NULL,
                price_cents BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                CONSTRAINT positive_quantity CHECK (quantity > 0)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create order_items table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reviews (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                product_id UUID NOT NULL REFERENCES products(id) ON DELETE CASCADE,
                rating INTEGER NOT NULL,
                comment TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

                CONSTRAINT valid_rating CHECK (rating BETWEEN 1 AND 5),
                CONSTRAINT one_review_per_product UNIQUE (user_id, product_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create reviews table")?;

        for statement in [
            "CREATE INDEX IF NOT EXISTS idx_products_category ON products(category)",
            "CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id)",
            "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)",
            "CREATE INDEX IF NOT EXISTS idx_order_items_order ON order_items(order_id)",
            "CREATE INDEX IF NOT EXISTS idx_reviews_product ON reviews(product_id)",
        ] {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to create index")?;
        }

        self.seed_products().await?;

        Ok(())
    }

    /// Seed the catalog with the standard marinated range if it's empty.
    async fn seed_products(&self) -> Result<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        if count > 0 {
            return Ok(());
        }

        let sample_products: &[(&str, &str, &str, i64, i64, i32)] = &[
            (
                "Honey Soy Wings 1kg",
                "Wings in honey soy marinade, ready for the grill",
                "wings",
                1_499,
                1_099,
                40,
            ),
            (
                "Peri Peri Wings 1kg",
                "Hot peri peri marinade, 24h soak",
                "wings",
                1_499,
                1_099,
                35,
            ),
            (
                "Lemon Herb Thighs 1kg",
                "Boneless thighs, lemon and rosemary",
                "thighs",
                1_699,
                1_249,
                30,
            ),
            (
                "Smoky BBQ Thighs 1kg",
                "Bone-in thighs in hickory BBQ marinade",
                "thighs",
                1_599,
                1_199,
                25,
            ),
            (
                "Garlic Butter Breast Fillets 1kg",
                "Skinless fillets, garlic butter marinade",
                "breast",
                1_899,
                1_399,
                30,
            ),
            (
                "Tandoori Breast Strips 500g",
                "Strips in yoghurt tandoori marinade",
                "breast",
                1_099,
                799,
                20,
            ),
            (
                "Whole Chicken Portuguese Style 1.4kg",
                "Butterflied whole bird, Portuguese marinade",
                "whole",
                2_499,
                1_899,
                15,
            ),
            (
                "Whole Chicken Lemon Pepper 1.4kg",
                "Butterflied whole bird, lemon pepper rub",
                "whole",
                2_499,
                1_899,
                12,
            ),
            (
                "Satay Skewers 10 pack",
                "Thigh skewers in peanut satay marinade",
                "skewers",
                1_299,
                949,
                50,
            ),
            (
                "Teriyaki Drumsticks 1kg",
                "Drumsticks in sticky teriyaki glaze",
                "drumsticks",
                1_199,
                899,
                45,
            ),
        ];

        for &(name, description, category, price, wholesale, stock) in sample_products {
            sqlx::query(
                r#"
                INSERT INTO products
                    (name, description, category, price_cents, wholesale_price_cents,
                     stock_count, in_stock)
                VALUES ($1, $2, $3, $4, $5, $6, $6 > 0)
                "#,
            )
            .bind(name)
            .bind(description)
            .bind(category)
            .bind(price)
            .bind(wholesale)
            .bind(stock)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Upsert the bootstrap admin account from config.
    pub async fn ensure_admin(&self, email: &str, password_hash: &str, name: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, name, role)
            VALUES ($1, $2, $3, 'ADMIN')
            ON CONFLICT (email) DO UPDATE
                SET password_hash = EXCLUDED.password_hash,
                    role = 'ADMIN',
                    updated_at = NOW()
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .execute(&self.pool)
        .await
        .context("Failed to upsert admin user")?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // USERS
    // -------------------------------------------------------------------------

    pub async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: &str,
        role: &str,
    ) -> AppResult<User> {
        let existing: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        if existing.is_some() {
            return Err(AppError::Conflict(format!(
                "email already registered: {email}"
            )));
        }

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    // -------------------------------------------------------------------------
    // PRODUCTS
    // -------------------------------------------------------------------------

    /// List catalog products with pagination and optional category/name
    /// filters. Returns (products, total matching count).
    pub async fn list_products(
        &self,
        page: i32,
        per_page: i32,
        category: Option<&str>,
        search: Option<&str>,
    ) -> AppResult<(Vec<Product>, i64)> {
        let offset = (page - 1) * per_page;

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')
            ORDER BY name ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(category)
        .bind(search)
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM products
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')
            "#,
        )
        .bind(category)
        .bind(search)
        .fetch_one(&self.pool)
        .await?;

        Ok((products, total))
    }

    pub async fn get_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    pub async fn create_product(&self, payload: &ProductPayload) -> AppResult<Product> {
        let in_stock = payload.in_stock.unwrap_or(payload.stock_count > 0);

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products
                (name, description, category, price_cents, wholesale_price_cents,
                 stock_count, in_stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&payload.name)
        .bind(&payload.description)
        .bind(&payload.category)
        .bind(payload.price_cents)
        .bind(payload.wholesale_price_cents)
        .bind(payload.stock_count)
        .bind(in_stock)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    /// Full update. `in_stock` in the payload overrides the derived value,
    /// which is how an admin forces a product in or out of stock.
    pub async fn update_product(&self, id: Uuid, payload: &ProductPayload) -> AppResult<Product> {
        let in_stock = payload.in_stock.unwrap_or(payload.stock_count > 0);

        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = $2,
                description = $3,
                category = $4,
                price_cents = $5,
                wholesale_price_cents = $6,
                stock_count = $7,
                in_stock = $8,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&payload.name)
        .bind(&payload.description)
        .bind(&payload.category)
        .bind(payload.price_cents)
        .bind(payload.wholesale_price_cents)
        .bind(payload.stock_count)
        .bind(in_stock)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product not found: {id}")))?;

        Ok(product)
    }

    pub async fn delete_product(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("product not found: {id}")));
        }

        Ok(())
    }

    /// Explicit restock: the only stock increment outside the lifecycle.
    pub async fn restock_product(&self, id: Uuid, quantity: i32) -> AppResult<Product> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET stock_count = stock_count + $2,
                in_stock = TRUE,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product not found: {id}")))?;

        Ok(product)
    }

    pub async fn get_low_stock_products(&self) -> AppResult<Vec<LowStockProduct>> {
        let products = sqlx::query_as::<_, LowStockProduct>(
            r#"
            SELECT id, name, stock_count FROM products
            WHERE stock_count <= $1
            ORDER BY stock_count ASC, name ASC
            "#,
        )
        .bind(LOW_STOCK_THRESHOLD)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    // -------------------------------------------------------------------------
    // CART
    // -------------------------------------------------------------------------

    /// Cart lines with their products, oldest first.
    pub async fn list_cart(&self, user_id: Uuid) -> AppResult<Vec<(CartItem, Product)>> {
        let items = sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if items.is_empty() {
            return Ok(Vec::new());
        }

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let products = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
            .bind(&product_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            // Cart rows cascade on product deletion, so the product is there.
            if let Some(product) = products.iter().find(|p| p.id == item.product_id) {
                lines.push((item, product.clone()));
            }
        }

        Ok(lines)
    }

    /// Add a product to the cart; a second add of the same product
    /// accumulates quantity on the existing line.
    pub async fn add_cart_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> AppResult<CartItem> {
        let product = self
            .get_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product not found: {product_id}")))?;

        if !product.in_stock {
            return Err(AppError::BadRequest(format!(
                "product is out of stock: {}",
                product.name
            )));
        }

        let item = sqlx::query_as::<_, CartItem>(
            r#"
            INSERT INTO cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id) DO UPDATE
                SET quantity = cart_items.quantity + EXCLUDED.quantity,
                    updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await?;

        Ok(item)
    }

    pub async fn update_cart_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> AppResult<CartItem> {
        let item = sqlx::query_as::<_, CartItem>(
            r#"
            UPDATE cart_items
            SET quantity = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(item_id)
        .bind(user_id)
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("cart item not found: {item_id}")))?;

        Ok(item)
    }

    pub async fn remove_cart_item(&self, user_id: Uuid, item_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(item_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("cart item not found: {item_id}")));
        }

        Ok(())
    }

    pub async fn clear_cart(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // -------------------------------------------------------------------------
    // ORDERS
    // -------------------------------------------------------------------------

    /// Checkout: turn the caller's cart into an order in one transaction.
    /// Prices are snapshotted at the caller's tier, the order starts
    /// PENDING/PENDING, and the cart is cleared. Nothing happens to stock
    /// here; stock moves when the order is delivered.
    pub async fn create_order_from_cart(&self, user: &User) -> AppResult<OrderDetail> {
        let mut tx = self.pool.begin().await?;

        let cart_items = sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user.id)
        .fetch_all(&mut *tx)
        .await?;

        if cart_items.is_empty() {
            return Err(AppError::BadRequest("cart is empty".to_string()));
        }

        let product_ids: Vec<Uuid> = cart_items.iter().map(|i| i.product_id).collect();
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = ANY($1) ORDER BY id",
        )
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await?;

        let mut total_cents: i64 = 0;
        let mut lines: Vec<(CartItem, Product, i64)> = Vec::with_capacity(cart_items.len());
        for item in cart_items {
            let product = products
                .iter()
                .find(|p| p.id == item.product_id)
                .cloned()
                .ok_or_else(|| {
                    AppError::BadRequest("a cart item's product no longer exists".to_string())
                })?;

            if !product.in_stock {
                return Err(AppError::BadRequest(format!(
                    "product is out of stock: {}",
                    product.name
                )));
            }

            let unit_price = product.price_for(user);
            total_cents += unit_price * i64::from(item.quantity);
            lines.push((item, product, unit_price));
        }

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (user_id, total_cents, status, payment_status)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user.id)
        .bind(total_cents)
        .bind(OrderStatus::Pending.as_str())
        .bind(payment_status::PENDING)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for (cart_item, product, unit_price) in lines {
            let order_item = sqlx::query_as::<_, OrderItem>(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, price_cents)
                VALUES ($1, $2, $3, $4)
                RETURNING *
                "#,
            )
            .bind(order.id)
            .bind(cart_item.product_id)
            .bind(cart_item.quantity)
            .bind(unit_price)
            .fetch_one(&mut *tx)
            .await?;

            items.push(OrderItemDetail {
                item: order_item,
                product: Some(product),
            });
        }

        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(OrderDetail { order, items })
    }

    /// The caller's orders, newest first. Admins see everyone's.
    pub async fn list_orders(&self, user: &User) -> AppResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Back-office listing of every order, optionally filtered by status.
    pub async fn list_all_orders(&self, status: Option<OrderStatus>) -> AppResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT * FROM orders
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Fetch one order with items and product snapshots, scoped to the
    /// caller: owners see their own orders, admins see any.
    pub async fn get_order(&self, user: &User, order_id: Uuid) -> AppResult<OrderDetail> {
        let order = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE id = $1 AND (user_id = $2 OR $3::bool)",
        )
        .bind(order_id)
        .bind(user.id)
        .bind(user.is_admin())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order not found: {order_id}")))?;

        let items = self.order_items_with_products(order_id).await?;

        Ok(OrderDetail { order, items })
    }

    async fn order_items_with_products(&self, order_id: Uuid) -> AppResult<Vec<OrderItemDetail>> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        if items.is_empty() {
            return Ok(Vec::new());
        }

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();
        let products = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
            .bind(&product_ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(items
            .into_iter()
            .map(|item| {
                let product = products.iter().find(|p| p.id == item.product_id).cloned();
                OrderItemDetail { item, product }
            })
            .collect())
    }

    // -------------------------------------------------------------------------
    // ORDER LIFECYCLE
    // -------------------------------------------------------------------------

    /// Apply a status transition to an order, atomically reconciling stock.
    ///
    /// The order row and every touched product row are locked FOR UPDATE in
    /// the same transaction, so the previous-status check that gates the
    /// stock moves can never act on a stale read: two concurrent deliveries
    /// of the same order serialize, and the second sees DELIVERED and
    /// changes nothing. Any failure rolls the whole transaction back,
    /// leaving both status and stock untouched.
    ///
    /// Returns the previous status alongside the updated order detail.
    pub async fn transition_order_status(
        &self,
        order_id: Uuid,
        target: OrderStatus,
    ) -> AppResult<(String, OrderDetail)> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order not found: {order_id}")))?;

        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at ASC",
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;

        let product_ids: Vec<Uuid> = items.iter().map(|i| i.product_id).collect();

        // Deterministic lock order (by id) keeps concurrent transitions that
        // share products from deadlocking.
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await?;

        // Items whose product was deleted from the catalog have no stock to
        // reconcile and drop out of the plan.
        let lines: Vec<StockLine> = items
            .iter()
            .filter_map(|item| {
                products.iter().find(|p| p.id == item.product_id).map(|p| StockLine {
                    product_id: p.id,
                    quantity: item.quantity,
                    stock_count: p.stock_count,
                })
            })
            .collect();

        let plan = plan_transition(&order, &lines, target, Utc::now())?;

        if plan.touches_stock() {
            tracing::debug!(
                order_id = %order_id,
                products = plan.stock_updates.len(),
                "Reconciling stock for transition"
            );
        }

        for update in &plan.stock_updates {
            sqlx::query(
                r#"
                UPDATE products
                SET stock_count = $2, in_stock = $3, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(update.product_id)
            .bind(update.new_stock)
            .bind(update.in_stock)
            .execute(&mut *tx)
            .await?;
        }

        let updated_order = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = $2,
                confirmed_at = $3,
                shipped_at = $4,
                delivered_at = $5,
                cancelled_at = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(order_id)
        .bind(target.as_str())
        .bind(plan.confirmed_at.or(order.confirmed_at))
        .bind(plan.shipped_at.or(order.shipped_at))
        .bind(plan.delivered_at.or(order.delivered_at))
        .bind(plan.cancelled_at.or(order.cancelled_at))
        .fetch_one(&mut *tx)
        .await?;

        // Fresh product snapshots for the response, read inside the
        // transaction so they reflect the reconciliation just applied.
        let products_after = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = ANY($1)",
        )
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let detail = OrderDetail {
            order: updated_order,
            items: items
                .into_iter()
                .map(|item| {
                    let product = products_after
                        .iter()
                        .find(|p| p.id == item.product_id)
                        .cloned();
                    OrderItemDetail { item, product }
                })
                .collect(),
        };

        Ok((order.status, detail))
    }

    // -------------------------------------------------------------------------
    // REVIEWS
    // -------------------------------------------------------------------------

    pub async fn list_reviews(&self, product_id: Uuid) -> AppResult<Vec<ReviewDetail>> {
        let reviews = sqlx::query_as::<_, ReviewDetail>(
            r#"
            SELECT r.id, r.user_id, r.product_id, u.name AS author_name,
                   r.rating, r.comment, r.created_at, r.updated_at
            FROM reviews r
            JOIN users u ON u.id = r.user_id
            WHERE r.product_id = $1
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    /// One review per user per product; re-reviewing updates in place.
    pub async fn upsert_review(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        rating: i32,
        comment: Option<&str>,
    ) -> AppResult<Review> {
        let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        if exists.is_none() {
            return Err(AppError::NotFound(format!("product not found: {product_id}")));
        }

        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (user_id, product_id, rating, comment)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id) DO UPDATE
                SET rating = EXCLUDED.rating,
                    comment = EXCLUDED.comment,
                    updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(rating)
        .bind(comment)
        .fetch_one(&self.pool)
        .await?;

        Ok(review)
    }

    /// Delete a review; owners delete their own, admins any.
    pub async fn delete_review(&self, user: &User, review_id: Uuid) -> AppResult<()> {
        let result =
            sqlx::query("DELETE FROM reviews WHERE id = $1 AND (user_id = $2 OR $3::bool)")
            .bind(review_id)
            .bind(user.id)
            .bind(user.is_admin())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("review not found: {review_id}")));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // REPORTS
    // -------------------------------------------------------------------------

    pub async fn summary_report(&self) -> AppResult<SummaryReport> {
        let revenue_cents: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_cents), 0)::BIGINT FROM orders WHERE status = 'DELIVERED'",
        )
        .fetch_one(&self.pool)
        .await?;

        let orders_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let total_products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        let total_reviews: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews")
            .fetch_one(&self.pool)
            .await?;

        let low_stock = self.get_low_stock_products().await?;

        Ok(SummaryReport {
            revenue_cents,
            orders_by_status,
            total_users,
            total_products,
            total_reviews,
            low_stock,
        })
    }

    // -------------------------------------------------------------------------
    // HEALTH CHECK
    // -------------------------------------------------------------------------

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}
