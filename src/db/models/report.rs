//! Daily sales report models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One order inside a report's detail blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOrderItem {
    pub product_id: i64,
    pub product_name: String,
    pub unit_price: f64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOrderSummary {
    pub id: i64,
    pub total_price: f64,
    pub status: String,
    pub created_at: String,
    pub staff_name: String,
    pub item_count: i64,
    pub items: Vec<ReportOrderItem>,
}

/// Typed shape of daily_reports.details. Counts are written alongside
/// the nested summaries so readers never have to re-derive them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDetails {
    pub order_count: i64,
    pub item_count: i64,
    #[serde(default)]
    pub orders: Vec<ReportOrderSummary>,
}

impl ReportDetails {
    /// Parse a stored detail blob, falling back to zeroed defaults on
    /// missing or malformed data.
    pub fn parse(raw: Option<&str>) -> Self {
        raw.and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }

    /// Re-derive counts from the nested summaries when a stored blob
    /// carries orders but zeroed counters.
    pub fn normalized(mut self) -> Self {
        if !self.orders.is_empty() {
            if self.order_count == 0 {
                self.order_count = self.orders.len() as i64;
            }
            if self.item_count == 0 {
                self.item_count = self.orders.iter().map(|o| o.item_count).sum();
            }
        }
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReportRequest {
    pub user_id: i64,
    pub report_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalReportRequest {
    pub start_date: String,
    pub end_date: String,
}

/// Summary returned after generating a report.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: i64,
    pub report_date: String,
    pub user_id: i64,
    pub staff_name: String,
    pub staff_role: String,
    pub total_sales: f64,
    pub order_count: i64,
    pub item_count: i64,
}

/// Row shape for the report list endpoints, with staff identity joined
/// in and counts normalized from the detail blob.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListEntry {
    pub id: i64,
    pub report_date: String,
    pub staff_name: String,
    pub staff_role: String,
    pub total_sales: f64,
    pub order_count: i64,
    pub item_count: i64,
    pub details: ReportDetails,
}

#[derive(Debug, Serialize)]
pub struct RevenueResponse {
    pub today: f64,
    pub weekly: f64,
    pub monthly: f64,
}

/// Top-selling product aggregate.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductPerformance {
    pub product_id: i64,
    pub name: String,
    pub category: String,
    pub total_quantity: i64,
    pub total_revenue: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_missing_details() {
        let details = ReportDetails::parse(None);
        assert_eq!(details.order_count, 0);
        assert_eq!(details.item_count, 0);
        assert!(details.orders.is_empty());
    }

    #[test]
    fn test_parse_malformed_details() {
        let details = ReportDetails::parse(Some("not json"));
        assert_eq!(details.order_count, 0);
    }

    #[test]
    fn test_parse_counts_without_orders() {
        let details = ReportDetails::parse(Some(r#"{"orderCount":3,"itemCount":7}"#));
        assert_eq!(details.order_count, 3);
        assert_eq!(details.item_count, 7);
        assert!(details.orders.is_empty());
    }

    #[test]
    fn test_normalized_rederives_counts() {
        let raw = r#"{"orderCount":0,"itemCount":0,"orders":[
            {"id":1,"totalPrice":10.0,"status":"completed","createdAt":"2025-03-10 11:00:00",
             "staffName":"Arta","itemCount":2,"items":[]},
            {"id":2,"totalPrice":5.0,"status":"delivered","createdAt":"2025-03-10 12:00:00",
             "staffName":"Arta","itemCount":1,"items":[]}
        ]}"#;
        let details = ReportDetails::parse(Some(raw)).normalized();
        assert_eq!(details.order_count, 2);
        assert_eq!(details.item_count, 3);
    }
}
