//! Order placement and lifecycle endpoints.
//!
//! Placement runs inside a single transaction: line inserts and stock
//! decrements either all land or none do. The stock decrement is a
//! conditional UPDATE (`stock >= quantity`), so two concurrent orders
//! cannot both take the last units.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::FromRow;
use std::sync::Arc;

use crate::db::{
    sources, CreateOrderRequest, CreateOrderResponse, CustomerInfo, Order, OrderLineResponse,
    OrderListQuery, OrderResponse, OrderStatus, ProductSnapshot, UpdateOrderStatusRequest, User,
};
use crate::utils::round_money;
use crate::AppState;

use super::auth::AuthUser;
use super::error::ApiError;

/// Order line joined with its product for response building.
#[derive(Debug, FromRow)]
struct LineRow {
    id: i64,
    product_id: i64,
    quantity: i64,
    unit_price: f64,
    product_name: Option<String>,
    product_price: Option<f64>,
    product_category: Option<String>,
}

/// Place an order
///
/// POST /api/orders
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), ApiError> {
    if req.items.is_empty() {
        return Err(ApiError::validation_field(
            "items",
            "At least one item is required",
        ));
    }
    if req.items.iter().any(|item| item.quantity < 1) {
        return Err(ApiError::validation_field(
            "items",
            "Item quantity must be at least 1",
        ));
    }

    let source = req.source.as_deref().unwrap_or(sources::LOKAL);
    if source != sources::LOKAL && source != sources::ONLINE {
        return Err(ApiError::validation_field(
            "source",
            format!("Source must be '{}' or '{}'", sources::LOKAL, sources::ONLINE),
        ));
    }

    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(auth.id)
        .fetch_optional(&state.db)
        .await?;
    let customer_name = user
        .as_ref()
        .map(|u| u.full_name.clone())
        .unwrap_or_else(|| "Guest".to_string());

    // Customer contact travels with online orders only.
    let metadata = if source == sources::ONLINE {
        let info = CustomerInfo {
            customer_name: req
                .customer_name
                .clone()
                .unwrap_or_else(|| customer_name.clone()),
            customer_phone: req.customer_phone.clone().unwrap_or_else(|| "N/A".to_string()),
            delivery_address: req
                .delivery_address
                .clone()
                .unwrap_or_else(|| "N/A".to_string()),
            notes: req.notes.clone().unwrap_or_default(),
        };
        Some(serde_json::to_string(&info).map_err(|e| {
            tracing::error!("Failed to serialize order metadata: {}", e);
            ApiError::internal("Failed to serialize order metadata")
        })?)
    } else {
        None
    };

    // Everything from here to the total update is one transaction;
    // dropping `tx` on any error rolls back lines and stock decrements.
    let mut tx = state.db.begin().await?;

    let order_result = sqlx::query(
        "INSERT INTO orders (user_id, table_number, source, status, total_price, metadata) \
         VALUES (?, ?, ?, 'pending', 0, ?)",
    )
    .bind(auth.id)
    .bind(&req.table_number)
    .bind(source)
    .bind(&metadata)
    .execute(&mut *tx)
    .await?;
    let order_id = order_result.last_insert_rowid();

    let mut total = 0.0;
    for item in &req.items {
        let product: Option<(String, f64, i64)> =
            sqlx::query_as("SELECT name, price, stock FROM products WHERE id = ?")
                .bind(item.product_id)
                .fetch_optional(&mut *tx)
                .await?;

        // Unknown products are skipped rather than failing the order.
        let Some((name, price, stock)) = product else {
            tracing::warn!(product_id = item.product_id, "Skipping unknown product in order");
            continue;
        };

        let decremented = sqlx::query(
            "UPDATE products SET stock = stock - ? WHERE id = ? AND stock >= ?",
        )
        .bind(item.quantity)
        .bind(item.product_id)
        .bind(item.quantity)
        .execute(&mut *tx)
        .await?;

        if decremented.rows_affected() == 0 {
            return Err(ApiError::insufficient_stock(&name, stock));
        }

        sqlx::query(
            "INSERT INTO order_details (order_id, product_id, quantity, unit_price) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(order_id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(price)
        .execute(&mut *tx)
        .await?;

        total += price * item.quantity as f64;
    }

    let total = round_money(total);
    sqlx::query("UPDATE orders SET total_price = ? WHERE id = ?")
        .bind(total)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(order_id, total, source, "Order created");

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order_id,
            total_price: total,
            customer_name,
            user_id: auth.id,
            source: source.to_string(),
            message: "Order created successfully".to_string(),
        }),
    ))
}

async fn build_order_response(
    pool: &crate::DbPool,
    order: Order,
) -> Result<OrderResponse, ApiError> {
    let lines: Vec<LineRow> = sqlx::query_as(
        r#"
        SELECT d.id, d.product_id, d.quantity, d.unit_price,
               p.name AS product_name, p.price AS product_price, p.category AS product_category
        FROM order_details d
        LEFT JOIN products p ON p.id = d.product_id
        WHERE d.order_id = ?
        ORDER BY d.id ASC
        "#,
    )
    .bind(order.id)
    .fetch_all(pool)
    .await?;

    let staff_name: Option<(String,)> = sqlx::query_as("SELECT full_name FROM users WHERE id = ?")
        .bind(order.user_id)
        .fetch_optional(pool)
        .await?;

    let contact = order
        .metadata
        .as_deref()
        .and_then(|m| serde_json::from_str::<CustomerInfo>(m).ok())
        .unwrap_or_default();

    let details = lines
        .into_iter()
        .map(|line| OrderLineResponse {
            id: line.id,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            product: line.product_name.map(|name| ProductSnapshot {
                id: line.product_id,
                name,
                price: line.product_price.unwrap_or(0.0),
                category: line.product_category.unwrap_or_default(),
            }),
        })
        .collect();

    Ok(OrderResponse {
        id: order.id,
        user_id: order.user_id,
        customer_name: staff_name
            .map(|(name,)| name)
            .unwrap_or_else(|| "Guest".to_string()),
        customer_phone: if contact.customer_phone.is_empty() {
            "N/A".to_string()
        } else {
            contact.customer_phone
        },
        delivery_address: if contact.delivery_address.is_empty() {
            "N/A".to_string()
        } else {
            contact.delivery_address
        },
        notes: contact.notes,
        table_number: order.table_number,
        source: order.source,
        status: order.status,
        total_price: order.total_price,
        created_at: order.created_at,
        details,
    })
}

/// List orders, newest first, optionally filtered by source and status
///
/// GET /api/orders?source=&status=
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders: Vec<Order> = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE (?1 IS NULL OR source = ?1)
          AND (?2 IS NULL OR status = ?2)
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(&query.source)
    .bind(&query.status)
    .fetch_all(&state.db)
    .await?;

    let mut responses = Vec::with_capacity(orders.len());
    for order in orders {
        responses.push(build_order_response(&state.db, order).await?);
    }

    Ok(Json(responses))
}

/// GET /api/orders/:id
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;

    let order = order.ok_or_else(|| ApiError::not_found("Order not found"))?;
    Ok(Json(build_order_response(&state.db, order).await?))
}

/// Move an order through its lifecycle
///
/// PUT /api/orders/:id/status
pub async fn update_order_status(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let next = OrderStatus::parse(&req.status).ok_or_else(|| {
        ApiError::validation_field(
            "status",
            "Status must be one of: pending, preparing, completed, delivered, cancelled",
        )
    })?;

    let order: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    let order = order.ok_or_else(|| ApiError::not_found("Order not found"))?;

    // Status column is CHECK-constrained, so parse cannot fail here.
    let current = OrderStatus::parse(&order.status)
        .ok_or_else(|| ApiError::internal("Order has unknown status"))?;

    if !current.can_transition_to(next) {
        return Err(ApiError::invalid_transition(current.as_str(), next.as_str()));
    }

    sqlx::query("UPDATE orders SET status = ? WHERE id = ?")
        .bind(next.as_str())
        .bind(id)
        .execute(&state.db)
        .await?;

    let order: Order = sqlx::query_as("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(order_id = id, status = %order.status, "Order status updated");

    Ok(Json(order))
}

/// Hard-delete an order; lines and coupon cascade
///
/// DELETE /api/orders/:id
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let result = sqlx::query("DELETE FROM orders WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Order not found"));
    }

    tracing::info!(order_id = id, "Order deleted");

    Ok(StatusCode::NO_CONTENT)
}
