//! Order models, the status lifecycle, and placement DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Order lifecycle. Cancelled is terminal; completed orders can only
/// move on to delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Preparing,
    Completed,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "preparing" => Some(Self::Preparing),
            "completed" => Some(Self::Completed),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Preparing => "preparing",
            Self::Completed => "completed",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether an order may move from `self` to `next`. Re-applying the
    /// current status is always allowed as a no-op.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (Self::Pending, Self::Preparing)
                | (Self::Pending, Self::Cancelled)
                | (Self::Preparing, Self::Completed)
                | (Self::Preparing, Self::Cancelled)
                | (Self::Completed, Self::Delivered)
        )
    }
}

pub mod sources {
    pub const LOKAL: &str = "lokal";
    pub const ONLINE: &str = "online";
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub table_number: Option<String>,
    pub source: String,
    pub status: String,
    pub total_price: f64,
    pub metadata: Option<String>,
    pub created_at: String,
}

/// Customer contact for online orders, stored as JSON in orders.metadata.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub notes: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItemRequest>,
    pub source: Option<String>,
    pub table_number: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: i64,
    pub total_price: f64,
    pub customer_name: String,
    pub user_id: i64,
    pub source: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct OrderListQuery {
    pub source: Option<String>,
    pub status: Option<String>,
}

/// Product fields embedded in an order line response.
#[derive(Debug, Clone, Serialize)]
pub struct ProductSnapshot {
    pub id: i64,
    pub name: String,
    pub price: f64,
    pub category: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineResponse {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: f64,
    pub product: Option<ProductSnapshot>,
}

/// Normalized order shape returned by the list/detail endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: i64,
    pub user_id: i64,
    pub customer_name: String,
    pub customer_phone: String,
    pub delivery_address: String,
    pub notes: String,
    pub table_number: Option<String>,
    pub source: String,
    pub status: String,
    pub total_price: f64,
    pub created_at: String,
    pub details: Vec<OrderLineResponse>,
}
