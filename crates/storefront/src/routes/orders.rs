//! Customer-facing order endpoints.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use driftwood_core::{AddressId, LineItem, OrderId, OrderStatus, UserId};
use driftwood_orders::{CheckoutSummary, Order};

use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::state::AppState;

/// Query parameters for the customer list endpoints.
///
/// `userId` is optional and redundant with the authenticated identity;
/// when present it must match, so a client cannot even ask for someone
/// else's records.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// Caller-asserted user id.
    #[serde(rename = "userId")]
    pub user_id: Option<UserId>,
}

impl ListParams {
    /// Reject a `userId` that names anyone but the authenticated caller.
    pub(crate) fn check_matches(&self, user: &CurrentUser) -> Result<()> {
        match self.user_id {
            Some(claimed) if claimed != user.id => Err(AppError::BadRequest(
                "userId does not match the authenticated user".to_owned(),
            )),
            _ => Ok(()),
        }
    }
}

/// Checkout payload. Line items arrive priced from the cart service.
#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    /// Priced cart positions.
    pub line_items: Vec<LineItem>,
    /// Shipping address reference.
    pub address_id: AddressId,
}

/// Payment confirmation relayed from the gateway's client SDK.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    /// Gateway-side payment reference.
    pub gateway_payment_id: String,
    /// Hex HMAC over the intent/payment pair.
    pub gateway_signature: String,
}

/// POST /orders - begin checkout.
///
/// Creates the order in `PENDING_PAYMENT` and returns everything the
/// client SDK needs to collect payment.
pub async fn create_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CheckoutSummary>)> {
    let summary = state
        .orders()
        .create_order(user.id, payload.line_items, payload.address_id)
        .await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Outcome of a payment verification.
#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    /// Always true on a 2xx; failures surface as error responses.
    pub success: bool,
    /// Resulting order status.
    pub status: OrderStatus,
}

/// POST /orders/{id}/verify - confirm payment.
///
/// Idempotent: verifying an already paid order with the same proof
/// returns it unchanged.
pub async fn verify_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<OrderId>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>> {
    // Ownership check before touching payment state.
    state.orders().get_order_for_user(order_id, user.id).await?;

    let order = state
        .orders()
        .verify_payment(order_id, &payload.gateway_payment_id, &payload.gateway_signature)
        .await?;
    Ok(Json(VerifyPaymentResponse {
        success: true,
        status: order.status,
    }))
}

/// POST /orders/{id}/cancel - abandon an unpaid order.
pub async fn cancel_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>> {
    state.orders().get_order_for_user(order_id, user.id).await?;

    let order = state
        .orders()
        .cancel_order(order_id, &format!("customer:{}", user.id))
        .await?;
    Ok(Json(order))
}

/// GET /orders - the caller's order history, newest first.
///
/// A failing read degrades to an empty list so the account page still
/// renders; the failure is logged and reported.
pub async fn list_orders(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Order>>> {
    params.check_matches(&user)?;

    match state.orders().list_orders_for_user(user.id).await {
        Ok(orders) => Ok(Json(orders)),
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "order list failed, serving empty");
            sentry::capture_error(&e);
            Ok(Json(Vec::new()))
        }
    }
}

/// GET /orders/{id} - one order, owner-scoped.
pub async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>> {
    let order = state.orders().get_order_for_user(order_id, user.id).await?;
    Ok(Json(order))
}
