//! Admin refund review endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use tracing::info;

use driftwood_core::RefundRequestId;
use driftwood_orders::{RefundDecision, RefundRequest};

use super::clamp_limit;
use crate::error::Result;
use crate::middleware::AdminUser;
use crate::routes::orders::ListParams;
use crate::state::AppState;

/// Refund resolution payload.
#[derive(Debug, Deserialize)]
pub struct ResolveRefundRequest {
    /// Approve (issue the gateway refund) or reject (restore the order).
    pub decision: RefundDecision,
    /// Optional note shown to the customer.
    pub admin_comment: Option<String>,
}

/// GET /admin/refunds - all refund requests, newest first.
pub async fn list_refund_requests(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<RefundRequest>>> {
    let requests = state.refunds().list_all(clamp_limit(params.limit)).await?;
    Ok(Json(requests))
}

/// GET /admin/refunds/{id} - one refund request.
pub async fn get_refund_request(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(request_id): Path<RefundRequestId>,
) -> Result<Json<RefundRequest>> {
    let request = state.refunds().get_refund_request(request_id).await?;
    Ok(Json(request))
}

/// PUT /admin/refunds/{id} - resolve a pending refund request.
///
/// Approval issues the gateway refund before any local write; a gateway
/// failure leaves the request open so the admin can retry safely.
pub async fn resolve_refund_request(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(request_id): Path<RefundRequestId>,
    Json(payload): Json<ResolveRefundRequest>,
) -> Result<Json<RefundRequest>> {
    let request = state
        .refunds()
        .resolve(
            request_id,
            payload.decision,
            payload.admin_comment.as_deref(),
            &admin.actor(),
        )
        .await?;
    info!(
        %request_id,
        status = %request.status,
        admin = %admin.id,
        "refund request resolved"
    );
    Ok(Json(request))
}
