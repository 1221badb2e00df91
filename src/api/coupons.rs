//! Receipt ("coupon") endpoints.
//!
//! Generating a coupon snapshots the order's lines and total into an
//! immutable record. Re-requesting returns the existing snapshot, so
//! reprinting a receipt never creates a second one or drifts from the
//! first.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{Coupon, CouponLine, CouponResponse, Order, OrderStatus};
use crate::utils::round_money;
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;

/// Issue (or re-fetch) the receipt for an order
///
/// POST /api/coupons/:orderId
pub async fn generate_coupon(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(order_id): Path<i64>,
) -> Result<(StatusCode, Json<CouponResponse>), ApiError> {
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = ?")
        .bind(order_id)
        .fetch_optional(&state.db)
        .await?;
    let order = order.ok_or_else(|| ApiError::not_found("Order not found"))?;

    // Idempotent: a second request returns the first snapshot.
    let existing: Option<Coupon> = sqlx::query_as("SELECT * FROM coupons WHERE order_id = ?")
        .bind(order_id)
        .fetch_optional(&state.db)
        .await?;
    if let Some(coupon) = existing {
        return Ok((StatusCode::OK, Json(CouponResponse::from_row(coupon))));
    }

    let lines: Vec<(String, i64, f64)> = sqlx::query_as(
        r#"
        SELECT p.name, d.quantity, d.unit_price
        FROM order_details d
        JOIN products p ON p.id = d.product_id
        WHERE d.order_id = ?
        ORDER BY d.id ASC
        "#,
    )
    .bind(order_id)
    .fetch_all(&state.db)
    .await?;

    let details: Vec<CouponLine> = lines
        .into_iter()
        .map(|(product_name, quantity, unit_price)| CouponLine {
            product_name,
            quantity,
            unit_price,
            line_total: round_money(unit_price * quantity as f64),
        })
        .collect();

    let details_json = serde_json::to_string(&details).map_err(|e| {
        tracing::error!("Failed to serialize coupon details: {}", e);
        ApiError::internal("Failed to serialize coupon details")
    })?;

    let result = sqlx::query(
        "INSERT INTO coupons (order_id, total_price, details) VALUES (?, ?, ?)",
    )
    .bind(order_id)
    .bind(order.total_price)
    .bind(&details_json)
    .execute(&state.db)
    .await?;

    // Issuing the receipt closes out the order.
    sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
        .bind(OrderStatus::Completed.as_str())
        .bind(order_id)
        .execute(&state.db)
        .await?;

    let coupon: Coupon = sqlx::query_as("SELECT * FROM coupons WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&state.db)
        .await?;

    tracing::info!(order_id, coupon_id = coupon.id, "Coupon issued");

    Ok((StatusCode::CREATED, Json(CouponResponse::from_row(coupon))))
}

/// GET /api/coupons/:orderId
pub async fn get_coupon(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(order_id): Path<i64>,
) -> Result<Json<CouponResponse>, ApiError> {
    let coupon: Option<Coupon> = sqlx::query_as("SELECT * FROM coupons WHERE order_id = ?")
        .bind(order_id)
        .fetch_optional(&state.db)
        .await?;

    coupon
        .map(|c| Json(CouponResponse::from_row(c)))
        .ok_or_else(|| ApiError::not_found("Coupon not found"))
}
