//! Route handlers for the storefront API.

pub mod orders;
pub mod refunds;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

/// Build the storefront route tree.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/verify", post(orders::verify_payment))
        .route("/orders/{id}/cancel", post(orders::cancel_order))
        .route(
            "/refunds",
            post(refunds::create_refund_request).get(refunds::list_refund_requests),
        )
}
