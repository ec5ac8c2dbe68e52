//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use driftwood_orders::OrderError;

/// Application-level error type for the storefront API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Order or refund operation failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Request is missing or carries invalid identity claims.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server-side failures to Sentry; client mistakes stay out
        if matches!(
            self,
            Self::Order(
                OrderError::Repository(_) | OrderError::Gateway(_) | OrderError::RefundGateway(_)
            )
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = match &self {
            Self::Order(err) => match err {
                OrderError::Validation(_) => StatusCode::BAD_REQUEST,
                OrderError::NotFound => StatusCode::NOT_FOUND,
                OrderError::PaymentVerification(_) => StatusCode::PAYMENT_REQUIRED,
                OrderError::InvalidState { .. }
                | OrderError::InvalidTransition { .. }
                | OrderError::DuplicateRequest
                | OrderError::AlreadyResolved { .. }
                | OrderError::NotEligible { .. }
                | OrderError::Conflict => StatusCode::CONFLICT,
                OrderError::Gateway(_) | OrderError::RefundGateway(_) => StatusCode::BAD_GATEWAY,
                OrderError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Order(OrderError::Repository(_)) => "Internal server error".to_string(),
            Self::Order(OrderError::Gateway(_) | OrderError::RefundGateway(_)) => {
                "Payment gateway unavailable".to_string()
            }
            Self::Order(err) => err.to_string(),
            Self::Unauthorized(_) => "Unauthorized".to_string(),
            Self::BadRequest(msg) => msg.clone(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use driftwood_core::OrderStatus;
    use driftwood_orders::gateway::GatewayError;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(AppError::Order(OrderError::Validation("x".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::Order(OrderError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::Order(OrderError::PaymentVerification(
                "bad signature".into()
            ))),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            status_of(AppError::Order(OrderError::InvalidTransition {
                from: OrderStatus::Paid,
                to: OrderStatus::Delivered,
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::Order(OrderError::Conflict)),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::Order(OrderError::Gateway(GatewayError::Request(
                "timeout".into()
            )))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(AppError::Unauthorized("missing claims".into())),
            StatusCode::UNAUTHORIZED
        );
    }
}
