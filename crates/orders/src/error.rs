//! Domain error taxonomy for the order core.
//!
//! Each variant maps to exactly one caller-visible failure class; the API
//! binaries translate them to HTTP statuses. Nothing that affects money
//! movement is ever swallowed - payment verification and refund issuance
//! failures always surface as one of the variants below.

use driftwood_core::{OrderStatus, RefundStatus};
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::repository::RepositoryError;

/// Errors produced by `OrderService` and `RefundService`.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Malformed input; the caller can correct it and retry.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Order or refund request does not exist (or is not visible to the caller).
    #[error("not found")]
    NotFound,

    /// The operation is not permitted from the record's current status.
    #[error("operation not permitted in status {current}")]
    InvalidState {
        /// Status the record currently holds.
        current: OrderStatus,
    },

    /// The requested transition is absent from the transition table.
    #[error("illegal status transition {from} -> {to}")]
    InvalidTransition {
        /// Status the order currently holds.
        from: OrderStatus,
        /// Status that was requested.
        to: OrderStatus,
    },

    /// The payment gateway call failed (retryable for transient errors).
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Signature verification failed; the payment confirmation is not trusted.
    #[error("payment verification failed: {0}")]
    PaymentVerification(String),

    /// Gateway-side refund issuance failed; safe to retry the approval.
    #[error("refund gateway error: {0}")]
    RefundGateway(GatewayError),

    /// A non-terminal refund request already exists for this order.
    #[error("a refund request is already open for this order")]
    DuplicateRequest,

    /// The refund request was already resolved; terminal states are final.
    #[error("refund request already resolved as {status}")]
    AlreadyResolved {
        /// Status the request currently holds.
        status: RefundStatus,
    },

    /// The order's status does not allow opening a refund request.
    #[error("order in status {status} is not eligible for a refund")]
    NotEligible {
        /// Status the order currently holds.
        status: OrderStatus,
    },

    /// Concurrent writers kept invalidating our read; retries exhausted.
    #[error("conflicting concurrent update, please retry")]
    Conflict,

    /// Storage failure.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}
