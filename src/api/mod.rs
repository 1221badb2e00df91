pub mod auth;
mod coupons;
mod error;
mod orders;
mod products;
mod reports;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub use error::{ApiError, ErrorCode};

pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/staff", get(auth::list_staff))
        .route("/staff/:id", put(auth::update_staff))
        .route("/staff/:id", delete(auth::delete_staff));

    let product_routes = Router::new()
        .route("/", get(products::list_products))
        .route("/", post(products::create_product))
        .route("/:id", get(products::get_product))
        .route("/:id", put(products::update_product))
        .route("/:id", delete(products::delete_product));

    let order_routes = Router::new()
        .route("/", get(orders::list_orders))
        .route("/", post(orders::create_order))
        .route("/:id", get(orders::get_order))
        .route("/:id/status", put(orders::update_order_status))
        .route("/:id", delete(orders::delete_order));

    let coupon_routes = Router::new()
        .route("/:orderId", post(coupons::generate_coupon))
        .route("/:orderId", get(coupons::get_coupon));

    let report_routes = Router::new()
        .route("/", get(reports::get_all_reports))
        .route("/daily", post(reports::generate_daily_report))
        .route("/daily", get(reports::get_daily_reports))
        .route("/historical", post(reports::generate_historical_reports))
        .route("/user/:userId", get(reports::get_reports_by_user))
        .route("/revenue", get(reports::get_revenue))
        .route("/products", get(reports::get_product_performance));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api/products", product_routes)
        .nest("/api/orders", order_routes)
        .nest("/api/coupons", coupon_routes)
        .nest("/api/reports", report_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
