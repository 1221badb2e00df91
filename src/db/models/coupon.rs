//! Coupon (receipt snapshot) models.
//!
//! A coupon is a printed receipt snapshot of an order, not a discount
//! code. One coupon per order; once written it never changes, even if
//! product prices change afterwards.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Coupon {
    pub id: i64,
    pub order_id: i64,
    pub issue_date: String,
    pub total_price: f64,
    /// JSON-encoded `Vec<CouponLine>`.
    pub details: String,
}

/// One receipt line, captured at issue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponLine {
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub line_total: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponResponse {
    pub id: i64,
    pub order_id: i64,
    pub issue_date: String,
    pub total_price: f64,
    pub details: Vec<CouponLine>,
}

impl CouponResponse {
    /// Malformed legacy rows degrade to an empty line list rather than
    /// failing the read.
    pub fn from_row(coupon: Coupon) -> Self {
        let details: Vec<CouponLine> =
            serde_json::from_str(&coupon.details).unwrap_or_default();
        Self {
            id: coupon.id,
            order_id: coupon.order_id,
            issue_date: coupon.issue_date,
            total_price: coupon.total_price,
            details,
        }
    }
}
