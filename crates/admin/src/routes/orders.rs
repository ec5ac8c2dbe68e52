//! Admin order endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::{Deserialize, Serialize};
use tracing::info;

use driftwood_core::{OrderId, OrderStatus};
use driftwood_orders::{Order, StatusChange};

use super::clamp_limit;
use crate::error::Result;
use crate::middleware::AdminUser;
use crate::state::AppState;

/// Query parameters for list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// Maximum rows to return.
    pub limit: Option<i64>,
}

/// Order with its full status history, as shown in the back office.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    /// The order itself.
    pub order: Order,
    /// Every recorded status transition, oldest first.
    pub history: Vec<StatusChange>,
}

/// Fulfilment status update.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// Target status. Payment and refund statuses are reserved for their
    /// own flows and rejected here.
    pub new_status: OrderStatus,
}

/// GET /admin/orders - all orders, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Order>>> {
    let orders = state.orders().list_orders(clamp_limit(params.limit)).await?;
    Ok(Json(orders))
}

/// GET /admin/orders/{id} - one order with its status history.
pub async fn get_order(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let order = state.orders().get_order(order_id).await?;
    let history = state.orders().status_history(order_id).await?;
    Ok(Json(OrderDetail { order, history }))
}

/// PUT /admin/orders/{id} - advance fulfilment.
///
/// Only the fulfilment statuses are settable here; the transition table
/// rejects everything else with a 409.
pub async fn update_status(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(order_id): Path<OrderId>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Order>> {
    let order = state
        .orders()
        .update_status(order_id, payload.new_status, &admin.actor())
        .await?;
    info!(%order_id, status = %order.status, admin = %admin.id, "order status updated");
    Ok(Json(order))
}
