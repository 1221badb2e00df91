//! Daily sales report endpoints.
//!
//! A report aggregates every completed/delivered order of a calendar
//! day, restaurant-wide, and is recorded against the requesting user.
//! Regenerating for the same (user, date) overwrites in place.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;

use crate::db::{
    GenerateReportRequest, HistoricalReportRequest, ProductPerformance, ReportDetails,
    ReportListEntry, ReportOrderItem, ReportOrderSummary, ReportSummary, RevenueResponse, User,
};
use crate::utils::round_money;
use crate::{AppState, DbPool};

use super::auth::AuthUser;
use super::error::ApiError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const QUALIFYING_STATUSES: &str = "('completed', 'delivered')";

fn parse_date(s: &str, field: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|_| ApiError::validation_field(field, "Date must be in YYYY-MM-DD format"))
}

/// Day-wide aggregate of qualifying orders, restaurant-wide.
async fn aggregate_day(pool: &DbPool, date: NaiveDate) -> Result<(f64, ReportDetails), ApiError> {
    let day_start = format!("{} 00:00:00", date.format(DATE_FORMAT));
    let day_end = format!("{} 23:59:59", date.format(DATE_FORMAT));

    let orders: Vec<(i64, f64, String, String, Option<String>)> = sqlx::query_as(&format!(
        "SELECT o.id, o.total_price, o.status, o.created_at, u.full_name \
         FROM orders o \
         LEFT JOIN users u ON u.id = o.user_id \
         WHERE o.status IN {QUALIFYING_STATUSES} AND o.created_at BETWEEN ? AND ? \
         ORDER BY o.created_at ASC"
    ))
    .bind(&day_start)
    .bind(&day_end)
    .fetch_all(pool)
    .await?;

    let mut total_sales = 0.0;
    let mut total_items = 0;
    let mut summaries = Vec::with_capacity(orders.len());

    for (order_id, total_price, status, created_at, staff_name) in orders {
        let items: Vec<(i64, Option<String>, f64, i64)> = sqlx::query_as(
            "SELECT d.product_id, p.name, d.unit_price, d.quantity \
             FROM order_details d \
             LEFT JOIN products p ON p.id = d.product_id \
             WHERE d.order_id = ? \
             ORDER BY d.id ASC",
        )
        .bind(order_id)
        .fetch_all(pool)
        .await?;

        let item_count: i64 = items.iter().map(|(_, _, _, quantity)| quantity).sum();
        total_sales += total_price;
        total_items += item_count;

        summaries.push(ReportOrderSummary {
            id: order_id,
            total_price,
            status,
            created_at,
            staff_name: staff_name.unwrap_or_else(|| "Unknown Staff".to_string()),
            item_count,
            items: items
                .into_iter()
                .map(|(product_id, name, unit_price, quantity)| ReportOrderItem {
                    product_id,
                    product_name: name.unwrap_or_else(|| "Unknown Product".to_string()),
                    unit_price,
                    quantity,
                })
                .collect(),
        });
    }

    let details = ReportDetails {
        order_count: summaries.len() as i64,
        item_count: total_items,
        orders: summaries,
    };

    Ok((round_money(total_sales), details))
}

/// Create-or-overwrite the (user, date) report row, returning its id.
async fn upsert_report(
    pool: &DbPool,
    user_id: i64,
    date: NaiveDate,
    total_sales: f64,
    details: &ReportDetails,
) -> Result<i64, ApiError> {
    let details_json = serde_json::to_string(details).map_err(|e| {
        tracing::error!("Failed to serialize report details: {}", e);
        ApiError::internal("Failed to serialize report details")
    })?;

    sqlx::query(
        "INSERT INTO daily_reports (user_id, report_date, total_sales, details) \
         VALUES (?, ?, ?, ?) \
         ON CONFLICT(user_id, report_date) DO UPDATE SET \
             total_sales = excluded.total_sales, \
             details = excluded.details",
    )
    .bind(user_id)
    .bind(date.format(DATE_FORMAT).to_string())
    .bind(total_sales)
    .bind(&details_json)
    .execute(pool)
    .await?;

    let (id,): (i64,) =
        sqlx::query_as("SELECT id FROM daily_reports WHERE user_id = ? AND report_date = ?")
            .bind(user_id)
            .bind(date.format(DATE_FORMAT).to_string())
            .fetch_one(pool)
            .await?;

    Ok(id)
}

/// Generate (or regenerate) the report for a user and date
///
/// POST /api/reports/daily
pub async fn generate_daily_report(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Json(req): Json<GenerateReportRequest>,
) -> Result<(StatusCode, Json<ReportSummary>), ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(req.user_id)
        .fetch_optional(&state.db)
        .await?;
    let user = user.ok_or_else(|| ApiError::not_found("User not found"))?;

    let date = match req.report_date.as_deref() {
        Some(s) => parse_date(s, "reportDate")?,
        None => Utc::now().date_naive(),
    };

    let (total_sales, details) = aggregate_day(&state.db, date).await?;
    let id = upsert_report(&state.db, user.id, date, total_sales, &details).await?;

    tracing::info!(
        user_id = user.id,
        date = %date,
        total_sales,
        order_count = details.order_count,
        "Daily report generated"
    );

    Ok((
        StatusCode::CREATED,
        Json(ReportSummary {
            id,
            report_date: date.format(DATE_FORMAT).to_string(),
            user_id: user.id,
            staff_name: user.full_name,
            staff_role: user.role,
            total_sales,
            order_count: details.order_count,
            item_count: details.item_count,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct HistoricalReportResponse {
    pub message: String,
    pub results: Vec<String>,
}

/// Backfill reports for a date range, for every user (admin only).
/// Days with no qualifying orders are skipped entirely.
///
/// POST /api/reports/historical
pub async fn generate_historical_reports(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<HistoricalReportRequest>,
) -> Result<Json<HistoricalReportResponse>, ApiError> {
    auth.require_admin()?;

    let start = parse_date(&req.start_date, "startDate")?;
    let end = parse_date(&req.end_date, "endDate")?;
    if start > end {
        return Err(ApiError::validation_field(
            "startDate",
            "Start date must be before end date",
        ));
    }

    let users: Vec<(i64, String)> = sqlx::query_as("SELECT id, full_name FROM users")
        .fetch_all(&state.db)
        .await?;
    if users.is_empty() {
        return Err(ApiError::not_found("No users found to generate reports for"));
    }

    let mut results = Vec::new();
    let mut date = start;
    while date <= end {
        let (total_sales, details) = aggregate_day(&state.db, date).await?;

        if details.order_count == 0 {
            tracing::debug!(date = %date, "No qualifying orders, skipping day");
            date = date + Duration::days(1);
            continue;
        }

        for (user_id, full_name) in &users {
            upsert_report(&state.db, *user_id, date, total_sales, &details).await?;
            results.push(format!(
                "Generated report for {} on {}",
                full_name,
                date.format(DATE_FORMAT)
            ));
        }

        date = date + Duration::days(1);
    }

    tracing::info!(
        start = %start,
        end = %end,
        count = results.len(),
        "Historical reports generated"
    );

    Ok(Json(HistoricalReportResponse {
        message: format!(
            "Generated historical reports from {} to {}",
            req.start_date, req.end_date
        ),
        results,
    }))
}

#[derive(Debug, FromRow)]
struct ReportRow {
    id: i64,
    report_date: String,
    total_sales: f64,
    details: Option<String>,
    full_name: Option<String>,
    role: Option<String>,
}

impl ReportRow {
    fn into_entry(self) -> ReportListEntry {
        let details = ReportDetails::parse(self.details.as_deref()).normalized();
        ReportListEntry {
            id: self.id,
            report_date: self.report_date,
            staff_name: self
                .full_name
                .unwrap_or_else(|| "Unknown Staff".to_string()),
            staff_role: self.role.unwrap_or_else(|| "N/A".to_string()),
            total_sales: round_money(self.total_sales),
            order_count: details.order_count,
            item_count: details.item_count,
            details,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ReportListQuery {
    pub date: Option<String>,
}

/// List reports with staff identity, newest date first
///
/// GET /api/reports/daily?date=
pub async fn get_daily_reports(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Query(query): Query<ReportListQuery>,
) -> Result<Json<Vec<ReportListEntry>>, ApiError> {
    if let Some(ref date) = query.date {
        parse_date(date, "date")?;
    }

    let rows: Vec<ReportRow> = sqlx::query_as(
        "SELECT r.id, r.report_date, r.total_sales, r.details, u.full_name, u.role \
         FROM daily_reports r \
         LEFT JOIN users u ON u.id = r.user_id \
         WHERE (?1 IS NULL OR r.report_date = ?1) \
         ORDER BY r.report_date DESC, r.id ASC",
    )
    .bind(&query.date)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows.into_iter().map(ReportRow::into_entry).collect()))
}

/// All reports (admin only)
///
/// GET /api/reports
pub async fn get_all_reports(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Vec<ReportListEntry>>, ApiError> {
    auth.require_admin()?;

    let rows: Vec<ReportRow> = sqlx::query_as(
        "SELECT r.id, r.report_date, r.total_sales, r.details, u.full_name, u.role \
         FROM daily_reports r \
         LEFT JOIN users u ON u.id = r.user_id \
         ORDER BY r.report_date DESC, r.id ASC",
    )
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows.into_iter().map(ReportRow::into_entry).collect()))
}

/// Reports belonging to one user
///
/// GET /api/reports/user/:userId
pub async fn get_reports_by_user(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<ReportListEntry>>, ApiError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?;
    if user.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let rows: Vec<ReportRow> = sqlx::query_as(
        "SELECT r.id, r.report_date, r.total_sales, r.details, u.full_name, u.role \
         FROM daily_reports r \
         LEFT JOIN users u ON u.id = r.user_id \
         WHERE r.user_id = ? \
         ORDER BY r.report_date DESC",
    )
    .bind(user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows.into_iter().map(ReportRow::into_entry).collect()))
}

async fn sum_completed_since(pool: &DbPool, since: &str) -> Result<f64, ApiError> {
    let (sum,): (Option<f64>,) = sqlx::query_as(
        "SELECT SUM(total_price) FROM orders WHERE status = 'completed' AND created_at >= ?",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;
    Ok(round_money(sum.unwrap_or(0.0)))
}

/// Revenue rollup: today, this week (from Sunday), this month
///
/// GET /api/reports/revenue
pub async fn get_revenue(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> Result<Json<RevenueResponse>, ApiError> {
    let today = Utc::now().date_naive();
    let week_start = today - Duration::days(today.weekday().num_days_from_sunday() as i64);
    let month_start = today.with_day(1).unwrap_or(today);

    let day_floor = |d: NaiveDate| format!("{} 00:00:00", d.format(DATE_FORMAT));

    Ok(Json(RevenueResponse {
        today: sum_completed_since(&state.db, &day_floor(today)).await?,
        weekly: sum_completed_since(&state.db, &day_floor(week_start)).await?,
        monthly: sum_completed_since(&state.db, &day_floor(month_start)).await?,
    }))
}

/// Top 10 products by quantity sold
///
/// GET /api/reports/products
pub async fn get_product_performance(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> Result<Json<Vec<ProductPerformance>>, ApiError> {
    let mut rows: Vec<ProductPerformance> = sqlx::query_as(
        "SELECT d.product_id, p.name, p.category, \
                CAST(SUM(d.quantity) AS INTEGER) AS total_quantity, \
                SUM(d.quantity * d.unit_price) AS total_revenue \
         FROM order_details d \
         JOIN products p ON p.id = d.product_id \
         GROUP BY d.product_id, p.name, p.category \
         ORDER BY total_quantity DESC \
         LIMIT 10",
    )
    .fetch_all(&state.db)
    .await?;

    for row in &mut rows {
        row.total_revenue = round_money(row.total_revenue);
    }

    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::test_support::{seed_order, seed_order_line, seed_product, seed_user, test_state};

    fn staff(id: i64) -> AuthUser {
        AuthUser {
            id,
            role: "kamarier".to_string(),
        }
    }

    fn admin(id: i64) -> AuthUser {
        AuthUser {
            id,
            role: "admin".to_string(),
        }
    }

    /// Two completed orders and one pending on 2025-03-10, plus one
    /// completed order the day after.
    async fn seed_sales(state: &Arc<AppState>, user_id: i64) -> i64 {
        let product = seed_product(&state.db, "Qofte", 5.00, 100).await;

        let o1 = seed_order(&state.db, user_id, "completed", 10.00, "2025-03-10 11:30:00").await;
        seed_order_line(&state.db, o1, product, 2, 5.00).await;

        let o2 = seed_order(&state.db, user_id, "delivered", 15.00, "2025-03-10 19:45:00").await;
        seed_order_line(&state.db, o2, product, 3, 5.00).await;

        // Pending orders never count toward reports
        let o3 = seed_order(&state.db, user_id, "pending", 5.00, "2025-03-10 20:00:00").await;
        seed_order_line(&state.db, o3, product, 1, 5.00).await;

        let o4 = seed_order(&state.db, user_id, "completed", 5.00, "2025-03-11 09:00:00").await;
        seed_order_line(&state.db, o4, product, 1, 5.00).await;

        product
    }

    #[tokio::test]
    async fn test_daily_report_counts_only_window_orders() {
        let state = test_state().await;
        let user_id = seed_user(&state.db, "Arta", "arta@example.com", "kamarier").await;
        seed_sales(&state, user_id).await;

        let (status, Json(summary)) = generate_daily_report(
            State(state.clone()),
            staff(user_id),
            Json(GenerateReportRequest {
                user_id,
                report_date: Some("2025-03-10".to_string()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(summary.order_count, 2);
        assert_eq!(summary.item_count, 5);
        assert_eq!(summary.total_sales, 25.00);
        assert_eq!(summary.staff_name, "Arta");
    }

    #[tokio::test]
    async fn test_regenerating_overwrites_instead_of_duplicating() {
        let state = test_state().await;
        let user_id = seed_user(&state.db, "Arta", "arta@example.com", "kamarier").await;
        let product = seed_sales(&state, user_id).await;

        let req = || {
            Json(GenerateReportRequest {
                user_id,
                report_date: Some("2025-03-10".to_string()),
            })
        };

        let (_, Json(first)) = generate_daily_report(State(state.clone()), staff(user_id), req())
            .await
            .unwrap();

        // Another qualifying order lands on the same day, then regenerate
        let o = seed_order(&state.db, user_id, "completed", 20.00, "2025-03-10 21:00:00").await;
        seed_order_line(&state.db, o, product, 4, 5.00).await;

        let (_, Json(second)) = generate_daily_report(State(state.clone()), staff(user_id), req())
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.order_count, 3);
        assert_eq!(second.total_sales, 45.00);

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM daily_reports WHERE user_id = ? AND report_date = '2025-03-10'",
        )
        .bind(user_id)
        .fetch_one(&state.db)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_daily_report_unknown_user_is_404() {
        let state = test_state().await;
        let user_id = seed_user(&state.db, "Arta", "arta@example.com", "kamarier").await;

        let err = generate_daily_report(
            State(state),
            staff(user_id),
            Json(GenerateReportRequest {
                user_id: 999,
                report_date: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_historical_skips_empty_days_and_covers_all_users() {
        let state = test_state().await;
        let admin_id = seed_user(&state.db, "Admin", "admin@example.com", "admin").await;
        let waiter_id = seed_user(&state.db, "Arta", "arta@example.com", "kamarier").await;
        seed_sales(&state, waiter_id).await;

        let Json(resp) = generate_historical_reports(
            State(state.clone()),
            admin(admin_id),
            Json(HistoricalReportRequest {
                start_date: "2025-03-09".to_string(),
                end_date: "2025-03-12".to_string(),
            }),
        )
        .await
        .unwrap();

        // Orders exist only on the 10th and 11th; two users each -> 4 reports
        assert_eq!(resp.results.len(), 4);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM daily_reports")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(count, 4);

        // Empty days wrote nothing for anyone
        let (empty,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM daily_reports WHERE report_date IN ('2025-03-09', '2025-03-12')",
        )
        .fetch_one(&state.db)
        .await
        .unwrap();
        assert_eq!(empty, 0);

        // Both users carry the same restaurant-wide totals for the 10th
        let totals: Vec<(f64,)> = sqlx::query_as(
            "SELECT total_sales FROM daily_reports WHERE report_date = '2025-03-10'",
        )
        .fetch_all(&state.db)
        .await
        .unwrap();
        assert_eq!(totals.len(), 2);
        assert!(totals.iter().all(|(t,)| *t == 25.00));
    }

    #[tokio::test]
    async fn test_historical_requires_admin_and_valid_range() {
        let state = test_state().await;
        let waiter_id = seed_user(&state.db, "Arta", "arta@example.com", "kamarier").await;

        let err = generate_historical_reports(
            State(state.clone()),
            staff(waiter_id),
            Json(HistoricalReportRequest {
                start_date: "2025-03-01".to_string(),
                end_date: "2025-03-02".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        let admin_id = seed_user(&state.db, "Admin", "admin@example.com", "admin").await;
        let err = generate_historical_reports(
            State(state),
            admin(admin_id),
            Json(HistoricalReportRequest {
                start_date: "2025-03-05".to_string(),
                end_date: "2025-03-01".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_report_listing_joins_staff_and_counts() {
        let state = test_state().await;
        let user_id = seed_user(&state.db, "Arta", "arta@example.com", "kamarier").await;
        seed_sales(&state, user_id).await;

        generate_daily_report(
            State(state.clone()),
            staff(user_id),
            Json(GenerateReportRequest {
                user_id,
                report_date: Some("2025-03-10".to_string()),
            }),
        )
        .await
        .unwrap();

        let Json(reports) = get_daily_reports(
            State(state.clone()),
            staff(user_id),
            Query(ReportListQuery::default()),
        )
        .await
        .unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].staff_name, "Arta");
        assert_eq!(reports[0].order_count, 2);
        assert_eq!(reports[0].item_count, 5);
        assert_eq!(reports[0].details.orders.len(), 2);

        // Date filter
        let Json(none) = get_daily_reports(
            State(state),
            staff(user_id),
            Query(ReportListQuery {
                date: Some("2025-03-11".to_string()),
            }),
        )
        .await
        .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_reports_by_user_scopes_and_404s() {
        let state = test_state().await;
        let arta = seed_user(&state.db, "Arta", "arta@example.com", "kamarier").await;
        let blerim = seed_user(&state.db, "Blerim", "blerim@example.com", "kamarier").await;
        seed_sales(&state, arta).await;

        for user_id in [arta, blerim] {
            generate_daily_report(
                State(state.clone()),
                staff(user_id),
                Json(GenerateReportRequest {
                    user_id,
                    report_date: Some("2025-03-10".to_string()),
                }),
            )
            .await
            .unwrap();
        }

        let Json(reports) = get_reports_by_user(State(state.clone()), staff(arta), Path(arta))
            .await
            .unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].staff_name, "Arta");
        assert_eq!(reports[0].order_count, 2);

        // A user with no reports gets an empty list, not an error
        let charlie = seed_user(&state.db, "Çlirim", "clirim@example.com", "kamarier").await;
        let Json(none) = get_reports_by_user(State(state.clone()), staff(arta), Path(charlie))
            .await
            .unwrap();
        assert!(none.is_empty());

        let err = get_reports_by_user(State(state), staff(arta), Path(999))
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_product_performance_top_sellers() {
        let state = test_state().await;
        let user_id = seed_user(&state.db, "Arta", "arta@example.com", "kamarier").await;
        let qofte = seed_product(&state.db, "Qofte", 5.00, 100).await;
        let pica = seed_product(&state.db, "Pica", 7.00, 100).await;

        let o = seed_order(&state.db, user_id, "completed", 31.00, "2025-03-10 11:00:00").await;
        seed_order_line(&state.db, o, qofte, 2, 5.00).await;
        seed_order_line(&state.db, o, pica, 3, 7.00).await;

        let Json(top) = get_product_performance(State(state), staff(user_id))
            .await
            .unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "Pica");
        assert_eq!(top[0].total_quantity, 3);
        assert_eq!(top[0].total_revenue, 21.00);
        assert_eq!(top[1].total_revenue, 10.00);
    }
}
