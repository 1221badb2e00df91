//! Shared helpers for async handler tests.

use std::sync::Arc;

use crate::config::Config;
use crate::{db, AppState, DbPool};

pub async fn test_state() -> Arc<AppState> {
    let pool = db::init_test().await;
    Arc::new(AppState::new(Config::default(), pool))
}

pub async fn seed_user(pool: &DbPool, full_name: &str, email: &str, role: &str) -> i64 {
    sqlx::query("INSERT INTO users (full_name, email, password_hash, role) VALUES (?, ?, 'x', ?)")
        .bind(full_name)
        .bind(email)
        .bind(role)
        .execute(pool)
        .await
        .expect("failed to seed user")
        .last_insert_rowid()
}

pub async fn seed_product(pool: &DbPool, name: &str, price: f64, stock: i64) -> i64 {
    sqlx::query("INSERT INTO products (name, category, price, stock) VALUES (?, 'main', ?, ?)")
        .bind(name)
        .bind(price)
        .bind(stock)
        .execute(pool)
        .await
        .expect("failed to seed product")
        .last_insert_rowid()
}

/// Insert an order directly with an explicit status and timestamp,
/// bypassing the placement flow.
pub async fn seed_order(
    pool: &DbPool,
    user_id: i64,
    status: &str,
    total_price: f64,
    created_at: &str,
) -> i64 {
    sqlx::query(
        "INSERT INTO orders (user_id, source, status, total_price, created_at) \
         VALUES (?, 'lokal', ?, ?, ?)",
    )
    .bind(user_id)
    .bind(status)
    .bind(total_price)
    .bind(created_at)
    .execute(pool)
    .await
    .expect("failed to seed order")
    .last_insert_rowid()
}

pub async fn seed_order_line(
    pool: &DbPool,
    order_id: i64,
    product_id: i64,
    quantity: i64,
    unit_price: f64,
) {
    sqlx::query(
        "INSERT INTO order_details (order_id, product_id, quantity, unit_price) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(order_id)
    .bind(product_id)
    .bind(quantity)
    .bind(unit_price)
    .execute(pool)
    .await
    .expect("failed to seed order line");
}
