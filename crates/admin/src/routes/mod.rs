//! Route handlers for the admin API.

pub mod orders;
pub mod refunds;

use axum::Router;
use axum::routing::get;

use crate::state::AppState;

/// Default page size for list endpoints.
pub(crate) const DEFAULT_LIST_LIMIT: i64 = 100;
/// Hard cap for list endpoints.
pub(crate) const MAX_LIST_LIMIT: i64 = 500;

/// Build the admin route tree.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/orders", get(orders::list_orders))
        .route(
            "/admin/orders/{id}",
            get(orders::get_order).put(orders::update_status),
        )
        .route("/admin/refunds", get(refunds::list_refund_requests))
        .route(
            "/admin/refunds/{id}",
            get(refunds::get_refund_request).put(refunds::resolve_refund_request),
        )
}

/// Clamp a caller-supplied limit into `[1, MAX_LIST_LIMIT]`.
pub(crate) fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}
