use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::errors::ServiceError;
use crate::services::reports::{DailyRevenue, MonthlyRevenue, ProductSales, WeeklyRevenue};
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize, IntoParams)]
pub struct YearQuery {
    /// Calendar year; 0 (or omitted) means the current year.
    #[serde(default)]
    pub year: i32,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RangeQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Monthly revenue for a year: exactly 12 entries, zero-filled.
#[utoipa::path(
    get,
    path = "/api/v1/statistics/revenue/yearly",
    tag = "Statistics",
    params(YearQuery),
    responses(
        (status = 200, description = "12 monthly buckets", body = ApiResponse<Vec<MonthlyRevenue>>),
    )
)]
pub async fn yearly_revenue(
    State(state): State<AppState>,
    Query(query): Query<YearQuery>,
) -> Result<Json<ApiResponse<Vec<MonthlyRevenue>>>, ServiceError> {
    let stats = state.services.reports.revenue_for_year(query.year).await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// Sparse monthly revenue over a date range.
#[utoipa::path(
    get,
    path = "/api/v1/statistics/revenue/monthly",
    tag = "Statistics",
    params(RangeQuery),
    responses(
        (status = 200, description = "Month buckets", body = ApiResponse<Vec<MonthlyRevenue>>),
    )
)]
pub async fn monthly_revenue(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<ApiResponse<Vec<MonthlyRevenue>>>, ServiceError> {
    let stats = state
        .services
        .reports
        .revenue_by_month(query.start, query.end)
        .await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// Daily revenue over a date range.
#[utoipa::path(
    get,
    path = "/api/v1/statistics/revenue/daily",
    tag = "Statistics",
    params(RangeQuery),
    responses(
        (status = 200, description = "Day buckets", body = ApiResponse<Vec<DailyRevenue>>),
    )
)]
pub async fn daily_revenue(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<ApiResponse<Vec<DailyRevenue>>>, ServiceError> {
    let stats = state
        .services
        .reports
        .revenue_by_day(query.start, query.end)
        .await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// ISO-week revenue over a date range.
#[utoipa::path(
    get,
    path = "/api/v1/statistics/revenue/weekly",
    tag = "Statistics",
    params(RangeQuery),
    responses(
        (status = 200, description = "ISO-week buckets", body = ApiResponse<Vec<WeeklyRevenue>>),
    )
)]
pub async fn weekly_revenue(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<ApiResponse<Vec<WeeklyRevenue>>>, ServiceError> {
    let stats = state
        .services
        .reports
        .revenue_by_week(query.start, query.end)
        .await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// Per-product quantity and revenue totals, best sellers first.
#[utoipa::path(
    get,
    path = "/api/v1/statistics/product-sales",
    tag = "Statistics",
    params(RangeQuery),
    responses(
        (status = 200, description = "Product sales totals", body = ApiResponse<Vec<ProductSales>>),
    )
)]
pub async fn product_sales(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<ApiResponse<Vec<ProductSales>>>, ServiceError> {
    let stats = state
        .services
        .reports
        .product_sales(query.start, query.end)
        .await?;
    Ok(Json(ApiResponse::success(stats)))
}
