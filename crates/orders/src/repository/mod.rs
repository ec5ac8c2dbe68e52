//! Durable storage for orders and refund requests.
//!
//! All mutations go through a read-modify-write cycle guarded by the
//! order's `version` column: a write whose expected version no longer
//! matches is rejected with [`RepositoryError::StaleVersion`] and the
//! caller must re-read. Orders are independent units of concurrency; there
//! is no cross-order locking.
//!
//! # Migrations
//!
//! Migrations live in `crates/orders/migrations/` and run via:
//! ```bash
//! cargo run -p driftwood-cli -- migrate
//! ```

pub mod memory;
pub mod orders;
pub mod refunds;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use driftwood_core::{OrderId, OrderStatus, RefundRequestId, RefundStatus, UserId};

use crate::model::{Order, RefundRequest, StatusChange};

pub use memory::{InMemoryOrderStore, InMemoryRefundStore};
pub use orders::PgOrderStore;
pub use refunds::PgRefundStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate active refund request).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The record's version advanced since it was read; re-read and retry.
    #[error("stale version")]
    StaleVersion,
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// A version-checked status write.
///
/// `expected_version` is the version the caller read; the write fails with
/// [`RepositoryError::StaleVersion`] if it no longer matches. `from` is the
/// status the caller read and is recorded in the status history alongside
/// the new status.
#[derive(Debug)]
pub struct StatusTransition<'a> {
    /// Order to write.
    pub order_id: OrderId,
    /// Version observed by the caller's read.
    pub expected_version: i32,
    /// Status observed by the caller's read (history `from`).
    pub from: OrderStatus,
    /// New status.
    pub to: OrderStatus,
    /// Who drove the change.
    pub actor: &'a str,
    /// Payment proof, set exactly once on the transition to `Paid`.
    pub payment: Option<PaymentProof<'a>>,
}

/// Gateway payment reference and verified signature, stored write-once.
#[derive(Debug)]
pub struct PaymentProof<'a> {
    /// Gateway-side payment id.
    pub payment_id: &'a str,
    /// Verified callback signature.
    pub signature: &'a str,
}

/// Durable storage of orders and their status history.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order (version 0) and its creation history row.
    async fn insert(&self, order: &Order, actor: &str) -> Result<(), RepositoryError>;

    /// Load one order.
    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Orders belonging to one customer, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// All orders, newest first, bounded.
    async fn list_all(&self, limit: i64) -> Result<Vec<Order>, RepositoryError>;

    /// Apply a version-checked status transition and append it to the
    /// history, atomically. Returns the updated order.
    async fn transition(&self, t: StatusTransition<'_>) -> Result<Order, RepositoryError>;

    /// Full status history of one order, oldest first.
    async fn status_history(&self, id: OrderId) -> Result<Vec<StatusChange>, RepositoryError>;
}

/// Durable storage of refund requests.
#[async_trait]
pub trait RefundStore: Send + Sync {
    /// Persist a new refund request.
    ///
    /// Fails with [`RepositoryError::Conflict`] if the order already has a
    /// request in a non-terminal state.
    async fn insert(&self, request: &RefundRequest) -> Result<(), RepositoryError>;

    /// Load one refund request.
    async fn get(&self, id: RefundRequestId) -> Result<Option<RefundRequest>, RepositoryError>;

    /// The order's non-terminal refund request, if any.
    async fn find_active_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<RefundRequest>, RepositoryError>;

    /// Refund requests opened by one customer, newest first.
    async fn list_for_user(&self, user_id: UserId)
    -> Result<Vec<RefundRequest>, RepositoryError>;

    /// All refund requests, newest first, bounded.
    async fn list_all(&self, limit: i64) -> Result<Vec<RefundRequest>, RepositoryError>;

    /// Resolve a request that is still `Requested`.
    ///
    /// Guarded on the current status: fails with
    /// [`RepositoryError::StaleVersion`] if the request was resolved by a
    /// concurrent writer. Returns the updated request.
    async fn resolve(
        &self,
        id: RefundRequestId,
        new_status: RefundStatus,
        admin_comment: Option<&str>,
        resolved_by: &str,
    ) -> Result<RefundRequest, RepositoryError>;
}
