use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::entities::OrderStatus;
use crate::errors::ServiceError;
use crate::services::gateway::SessionContext;
use crate::services::orders::{
    CreateOrderRequest, OrderListResponse, OrderResponse, UpdateOrderStatusRequest,
};
use crate::services::payments::PaymentRedirect;
use crate::{ApiResponse, AppState};

fn default_page() -> u64 {
    1
}
fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UserOrdersQuery {
    pub status: Option<OrderStatus>,
    pub keyword: Option<String>,
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Create an order from cart lines and open a payment session when paying
/// through the gateway.
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    tag = "Orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created", body = ApiResponse<PaymentRedirect>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown user, product or coupon", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<ApiResponse<PaymentRedirect>>, ServiceError> {
    let ctx = SessionContext {
        client_ip: client_ip(&headers),
    };
    let redirect = state.services.payments.checkout(payload, ctx).await?;
    Ok(Json(ApiResponse::success(redirect)))
}

/// Fetch a single order with its line items.
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    tag = "Orders",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.get_order(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// List orders, optionally filtered by creation date range and status.
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    tag = "Orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders listed", body = ApiResponse<OrderListResponse>),
    )
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<OrderListResponse>>, ServiceError> {
    let result = state
        .services
        .orders
        .list_by_filter(
            query.start,
            query.end,
            query.status,
            query.page,
            query.per_page,
        )
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

/// List a user's orders, optionally narrowed by status and keyword.
#[utoipa::path(
    get,
    path = "/api/v1/orders/user/{user_id}",
    tag = "Orders",
    params(("user_id" = Uuid, Path, description = "Owning user id"), UserOrdersQuery),
    responses(
        (status = 200, description = "Orders listed", body = ApiResponse<Vec<OrderResponse>>),
    )
)]
pub async fn list_user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<UserOrdersQuery>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, ServiceError> {
    let orders = state
        .services
        .orders
        .find_by_user(user_id, query.status, query.keyword)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Apply a lifecycle transition (and optional address edit) to an order.
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    tag = "Orders",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.update_order_status(id, payload).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Record that the buyer submitted post-delivery feedback.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/feedback",
    tag = "Orders",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Feedback recorded", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn submit_feedback(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.submit_feedback(id).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Orders are never hard-deleted; the endpoint acknowledges and keeps the
/// audit trail intact.
#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    tag = "Orders",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Delete acknowledged (no-op)", body = ApiResponse<String>),
    )
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<String>>, ServiceError> {
    state.services.orders.delete_order(id).await?;
    Ok(Json(ApiResponse::success(
        "orders are retained as the audit trail".to_string(),
    )))
}
