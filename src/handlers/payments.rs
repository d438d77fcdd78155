use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::{ApiResponse, AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentReturnResponse {
    /// 1 when the gateway confirmed the charge.
    pub code: i32,
}

/// Gateway redirect target: verifies the callback and reconciles the order
/// status.
#[utoipa::path(
    get,
    path = "/api/v1/payments/return",
    tag = "Payments",
    responses(
        (status = 200, description = "Callback reconciled", body = ApiResponse<PaymentReturnResponse>),
        (status = 404, description = "Unknown order reference", body = crate::errors::ErrorResponse),
    )
)]
pub async fn payment_return(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ApiResponse<PaymentReturnResponse>>, ServiceError> {
    let code = state.services.payments.gateway_return(params).await?;
    Ok(Json(ApiResponse::success(PaymentReturnResponse { code })))
}
