//! Customer-facing refund endpoints.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::warn;

use driftwood_core::OrderId;
use driftwood_orders::RefundRequest;

use super::orders::ListParams;
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::state::AppState;

/// Refund request payload.
#[derive(Debug, Deserialize)]
pub struct CreateRefundRequest {
    /// Order to refund. Must belong to the caller.
    pub order_id: OrderId,
    /// Free-text reason, at most 1000 characters.
    pub reason: String,
}

/// POST /refunds - open a refund request.
pub async fn create_refund_request(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateRefundRequest>,
) -> Result<(StatusCode, Json<RefundRequest>)> {
    let request = state
        .refunds()
        .create_refund_request(payload.order_id, user.id, &payload.reason)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /refunds - the caller's refund requests, newest first.
///
/// Degrades to an empty list on read failure, same as the order list.
pub async fn list_refund_requests(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<RefundRequest>>> {
    params.check_matches(&user)?;

    match state.refunds().list_for_user(user.id).await {
        Ok(requests) => Ok(Json(requests)),
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "refund list failed, serving empty");
            sentry::capture_error(&e);
            Ok(Json(Vec::new()))
        }
    }
}
