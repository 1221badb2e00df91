//! Product catalog endpoints. Reads are public; writes are admin-only.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{CreateProductRequest, Product, UpdateProductRequest};
use crate::AppState;

use super::auth::AuthUser;
use super::error::{ApiError, ValidationErrorBuilder};

fn validate_create_request(req: &CreateProductRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    if req.name.trim().is_empty() {
        errors.add("name", "Name is required");
    }
    if req.category.trim().is_empty() {
        errors.add("category", "Category is required");
    }
    if req.price < 0.0 {
        errors.add("price", "Price must not be negative");
    }
    if req.stock.is_some_and(|s| s < 0) {
        errors.add("stock", "Stock must not be negative");
    }

    errors.finish()
}

/// List products, grouped by category then name
///
/// GET /api/products
pub async fn list_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    let products: Vec<Product> =
        sqlx::query_as("SELECT * FROM products ORDER BY category ASC, name ASC")
            .fetch_all(&state.db)
            .await?;

    Ok(Json(products))
}

/// GET /api/products/:id
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Product>, ApiError> {
    let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;

    product
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

/// Create a product (admin only)
///
/// POST /api/products
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    auth.require_admin()?;
    validate_create_request(&req)?;

    let tags = req.tags.map(|t| t.join());

    let result = sqlx::query(
        r#"
        INSERT INTO products (name, description, category, price, stock, image_url, tags, created_by_admin_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(&req.category)
    .bind(req.price)
    .bind(req.stock.unwrap_or(0))
    .bind(&req.image_url)
    .bind(&tags)
    .bind(auth.id)
    .execute(&state.db)
    .await?;

    let product: Product = sqlx::query_as("SELECT * FROM products WHERE id = ?")
        .bind(result.last_insert_rowid())
        .fetch_one(&state.db)
        .await?;

    tracing::info!(id = product.id, name = %product.name, "Product created");

    Ok((StatusCode::CREATED, Json(product)))
}

/// Partially update a product (admin only)
///
/// PUT /api/products/:id
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<Json<Product>, ApiError> {
    auth.require_admin()?;

    if req.price.is_some_and(|p| p < 0.0) {
        return Err(ApiError::validation_field("price", "Price must not be negative"));
    }
    if req.stock.is_some_and(|s| s < 0) {
        return Err(ApiError::validation_field("stock", "Stock must not be negative"));
    }

    let existing: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_none() {
        return Err(ApiError::not_found("Product not found"));
    }

    let tags = req.tags.map(|t| t.join());

    sqlx::query(
        r#"
        UPDATE products SET
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            category = COALESCE(?, category),
            price = COALESCE(?, price),
            stock = COALESCE(?, stock),
            image_url = COALESCE(?, image_url),
            tags = COALESCE(?, tags)
        WHERE id = ?
        "#,
    )
    .bind(&req.name)
    .bind(&req.description)
    .bind(&req.category)
    .bind(req.price)
    .bind(req.stock)
    .bind(&req.image_url)
    .bind(&tags)
    .bind(id)
    .execute(&state.db)
    .await?;

    let product: Product = sqlx::query_as("SELECT * FROM products WHERE id = ?")
        .bind(id)
        .fetch_one(&state.db)
        .await?;

    Ok(Json(product))
}

/// Delete a product (admin only). Fails while order lines still
/// reference it (FK RESTRICT).
///
/// DELETE /api/products/:id
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    auth.require_admin()?;

    let result = sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| {
            if e.to_string().contains("FOREIGN KEY constraint failed") {
                ApiError::bad_request("Product is referenced by existing orders")
            } else {
                ApiError::from(e)
            }
        })?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Product not found"));
    }

    tracing::info!(id, "Product deleted");

    Ok(StatusCode::NO_CONTENT)
}
