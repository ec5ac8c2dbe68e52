//! Refund request orchestration.
//!
//! Creation is a two-phase compensating update: the order is CAS-moved to
//! `RefundRequested` first (the version guard serializes racing
//! requesters), then the request row is inserted; if the insert fails the
//! order is restored. Approval calls the gateway before any local write,
//! under a deterministic idempotency key, so a retry after a partial
//! failure never refunds twice.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use driftwood_core::{OrderId, OrderStatus, RefundRequestId, RefundStatus, UserId};

use super::MAX_WRITE_ATTEMPTS;
use crate::error::OrderError;
use crate::gateway::{PaymentGateway, refund_idempotency_key};
use crate::model::{Order, RefundDecision, RefundRequest};
use crate::repository::{OrderStore, RefundStore, RepositoryError, StatusTransition};

/// Longest accepted refund reason, in characters.
const MAX_REASON_CHARS: usize = 1000;

/// Orchestrates refund request creation and admin resolution.
pub struct RefundService {
    orders: Arc<dyn OrderStore>,
    refunds: Arc<dyn RefundStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl RefundService {
    /// Create a new refund service.
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrderStore>,
        refunds: Arc<dyn RefundStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            orders,
            refunds,
            gateway,
        }
    }

    /// Open a refund request against a paid (or later) order.
    ///
    /// Moves the order to `RefundRequested` and persists the request, or
    /// does neither.
    ///
    /// # Errors
    ///
    /// `NotEligible` unless the order is paid/confirmed/shipped/delivered,
    /// `DuplicateRequest` when a non-terminal request already exists,
    /// `NotFound` when the order is missing or owned by someone else.
    #[instrument(skip(self, reason), fields(%order_id, %user_id))]
    pub async fn create_refund_request(
        &self,
        order_id: OrderId,
        user_id: UserId,
        reason: &str,
    ) -> Result<RefundRequest, OrderError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(OrderError::Validation("refund reason is required".to_owned()));
        }
        if reason.chars().count() > MAX_REASON_CHARS {
            return Err(OrderError::Validation(format!(
                "refund reason exceeds {MAX_REASON_CHARS} characters"
            )));
        }

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let order = self
                .orders
                .get(order_id)
                .await?
                .ok_or(OrderError::NotFound)?;
            if order.user_id != user_id {
                return Err(OrderError::NotFound);
            }

            if order.status == OrderStatus::RefundRequested {
                return Err(OrderError::DuplicateRequest);
            }
            if !order.status.is_refund_eligible() {
                return Err(OrderError::NotEligible {
                    status: order.status,
                });
            }
            if self.refunds.find_active_for_order(order_id).await?.is_some() {
                return Err(OrderError::DuplicateRequest);
            }

            // Phase one: the version-checked order write serializes racing
            // requesters; losers re-read and bail out above.
            let moved = match self
                .orders
                .transition(StatusTransition {
                    order_id,
                    expected_version: order.version,
                    from: order.status,
                    to: OrderStatus::RefundRequested,
                    actor: &format!("customer:{user_id}"),
                    payment: None,
                })
                .await
            {
                Ok(moved) => moved,
                Err(RepositoryError::StaleVersion) => continue,
                Err(e) => return Err(e.into()),
            };

            // Phase two: persist the request; restore the order if this fails.
            let now = Utc::now();
            let request = RefundRequest {
                id: RefundRequestId::generate(),
                order_id,
                user_id,
                reason: reason.to_owned(),
                status: RefundStatus::Requested,
                admin_comment: None,
                resolved_by: None,
                created_at: now,
                updated_at: now,
            };

            match self.refunds.insert(&request).await {
                Ok(()) => {
                    info!(request_id = %request.id, "refund request opened");
                    return Ok(request);
                }
                Err(insert_err) => {
                    self.compensate_restore(&moved, order.status).await;
                    return Err(match insert_err {
                        RepositoryError::Conflict(_) => OrderError::DuplicateRequest,
                        e => e.into(),
                    });
                }
            }
        }
        Err(OrderError::Conflict)
    }

    /// Resolve a pending refund request.
    ///
    /// Rejection restores the order to the status recorded in its history
    /// immediately before `RefundRequested`. Approval issues the gateway
    /// refund first (idempotent per order) and only then applies the local
    /// transitions, leaving both records untouched if the gateway fails so
    /// the admin can retry. A retried approval that finds the order already
    /// `Refunded` (an earlier attempt died between the two local writes)
    /// skips the order transition and completes the request.
    ///
    /// # Errors
    ///
    /// `AlreadyResolved` when the request is terminal, `RefundGateway`
    /// when refund issuance fails, `Conflict` when a concurrent resolver
    /// won the race.
    #[instrument(skip(self, admin_comment), fields(%refund_request_id, ?decision))]
    pub async fn resolve(
        &self,
        refund_request_id: RefundRequestId,
        decision: RefundDecision,
        admin_comment: Option<&str>,
        actor: &str,
    ) -> Result<RefundRequest, OrderError> {
        let request = self
            .refunds
            .get(refund_request_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        if request.status != RefundStatus::Requested {
            return Err(OrderError::AlreadyResolved {
                status: request.status,
            });
        }

        match decision {
            RefundDecision::Reject => {
                self.reject(&request, admin_comment, actor).await
            }
            RefundDecision::Approve => {
                self.approve(&request, admin_comment, actor).await
            }
        }
    }

    async fn reject(
        &self,
        request: &RefundRequest,
        admin_comment: Option<&str>,
        actor: &str,
    ) -> Result<RefundRequest, OrderError> {
        let restore_to = self.status_before_refund(request.order_id).await?;

        self.transition_from_refund_requested(request.order_id, restore_to, actor)
            .await?;

        let resolved = self
            .refunds
            .resolve(request.id, RefundStatus::Rejected, admin_comment, actor)
            .await
            .map_err(|e| match e {
                RepositoryError::StaleVersion => OrderError::Conflict,
                e => e.into(),
            })?;

        info!(request_id = %resolved.id, %restore_to, "refund request rejected");
        Ok(resolved)
    }

    async fn approve(
        &self,
        request: &RefundRequest,
        admin_comment: Option<&str>,
        actor: &str,
    ) -> Result<RefundRequest, OrderError> {
        let order = self
            .orders
            .get(request.order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        let Some(payment_id) = order.gateway_payment_id.as_deref() else {
            return Err(RepositoryError::DataCorruption(
                "order under refund has no gateway payment id".to_owned(),
            )
            .into());
        };

        // Gateway first, no lock held. The deterministic key makes retries
        // after partial failures safe on the gateway side.
        let key = refund_idempotency_key(order.id);
        let refund_id = self
            .gateway
            .issue_refund(payment_id, order.amount_total, &key)
            .await
            .map_err(|e| {
                warn!(order_id = %order.id, error = %e, "gateway refund failed, leaving request open");
                OrderError::RefundGateway(e)
            })?;

        self.mark_order_refunded(order.id, actor).await?;

        let resolved = self
            .refunds
            .resolve(request.id, RefundStatus::Completed, admin_comment, actor)
            .await
            .map_err(|e| match e {
                RepositoryError::StaleVersion => {
                    error!(
                        order_id = %order.id,
                        request_id = %request.id,
                        "refund issued at gateway but request was resolved concurrently; needs reconciliation"
                    );
                    OrderError::Conflict
                }
                e => e.into(),
            })?;

        info!(
            request_id = %resolved.id,
            order_id = %order.id,
            %refund_id,
            "refund approved and issued"
        );
        Ok(resolved)
    }

    /// CAS the order to `Refunded`.
    ///
    /// An order that is already `Refunded` is fine: a previous approval
    /// issued the refund and moved the order but died before closing the
    /// request, and this retry is converging on the same outcome. Any
    /// other status means a rejection won after the gateway refund went
    /// out, which only an operator can reconcile.
    async fn mark_order_refunded(&self, order_id: OrderId, actor: &str) -> Result<(), OrderError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let order = self
                .orders
                .get(order_id)
                .await?
                .ok_or(OrderError::NotFound)?;
            match order.status {
                OrderStatus::Refunded => return Ok(()),
                OrderStatus::RefundRequested => {}
                other => {
                    error!(
                        %order_id,
                        status = %other,
                        "refund issued at gateway but order left refund review; needs reconciliation"
                    );
                    return Err(OrderError::Conflict);
                }
            }

            match self
                .orders
                .transition(StatusTransition {
                    order_id,
                    expected_version: order.version,
                    from: order.status,
                    to: OrderStatus::Refunded,
                    actor,
                    payment: None,
                })
                .await
            {
                Ok(_) => return Ok(()),
                Err(RepositoryError::StaleVersion) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Err(OrderError::Conflict)
    }

    /// CAS the order out of `RefundRequested`, retrying lost races as long
    /// as the order is still there.
    async fn transition_from_refund_requested(
        &self,
        order_id: OrderId,
        to: OrderStatus,
        actor: &str,
    ) -> Result<Order, OrderError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let order = self
                .orders
                .get(order_id)
                .await?
                .ok_or(OrderError::NotFound)?;
            if order.status != OrderStatus::RefundRequested {
                // A concurrent resolver won.
                return Err(OrderError::Conflict);
            }

            match self
                .orders
                .transition(StatusTransition {
                    order_id,
                    expected_version: order.version,
                    from: order.status,
                    to,
                    actor,
                    payment: None,
                })
                .await
            {
                Ok(order) => return Ok(order),
                Err(RepositoryError::StaleVersion) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Err(OrderError::Conflict)
    }

    /// The status the order held immediately before `RefundRequested`,
    /// read from the explicit history log.
    async fn status_before_refund(&self, order_id: OrderId) -> Result<OrderStatus, OrderError> {
        let history = self.orders.status_history(order_id).await?;
        history
            .iter()
            .rev()
            .find(|c| c.to == OrderStatus::RefundRequested)
            .and_then(|c| c.from)
            .ok_or_else(|| {
                RepositoryError::DataCorruption(
                    "no refund_requested transition in status history".to_owned(),
                )
                .into()
            })
    }

    /// Best-effort restore after a failed phase-two insert. A failure here
    /// is logged and the original error still surfaces to the caller.
    async fn compensate_restore(&self, moved: &Order, restore_to: OrderStatus) {
        let result = self
            .orders
            .transition(StatusTransition {
                order_id: moved.id,
                expected_version: moved.version,
                from: moved.status,
                to: restore_to,
                actor: "system:compensation",
                payment: None,
            })
            .await;
        if let Err(e) = result {
            error!(order_id = %moved.id, error = %e, "failed to restore order after refund insert failure");
        }
    }

    /// Load one refund request.
    ///
    /// # Errors
    ///
    /// `NotFound` if it does not exist.
    pub async fn get_refund_request(
        &self,
        id: RefundRequestId,
    ) -> Result<RefundRequest, OrderError> {
        self.refunds.get(id).await?.ok_or(OrderError::NotFound)
    }

    /// Refund requests opened by one customer, newest first.
    ///
    /// # Errors
    ///
    /// `Repository` if the read fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<RefundRequest>, OrderError> {
        Ok(self.refunds.list_for_user(user_id).await?)
    }

    /// All refund requests, newest first, bounded.
    ///
    /// # Errors
    ///
    /// `Repository` if the read fails.
    pub async fn list_all(&self, limit: i64) -> Result<Vec<RefundRequest>, OrderError> {
        Ok(self.refunds.list_all(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::repository::{InMemoryOrderStore, InMemoryRefundStore};
    use crate::service::OrderService;
    use driftwood_core::{AddressId, CurrencyCode, LineItem, ProductId};
    use rust_decimal::Decimal;

    struct Fixture {
        orders: OrderService,
        refunds: RefundService,
        order_store: Arc<InMemoryOrderStore>,
        gateway: Arc<MockGateway>,
    }

    fn fixture() -> Fixture {
        let order_store = Arc::new(InMemoryOrderStore::new());
        let refund_store = Arc::new(InMemoryRefundStore::new());
        let gateway = Arc::new(MockGateway::new());
        Fixture {
            orders: OrderService::new(order_store.clone(), gateway.clone(), CurrencyCode::USD),
            refunds: RefundService::new(order_store.clone(), refund_store, gateway.clone()),
            order_store,
            gateway,
        }
    }

    async fn paid_order(fx: &Fixture) -> Order {
        let summary = fx
            .orders
            .create_order(
                UserId::new(1),
                vec![
                    LineItem::new(ProductId::new(1), Decimal::from(100), 2),
                    LineItem::new(ProductId::new(2), Decimal::from(50), 1),
                ],
                AddressId::new(10),
            )
            .await
            .expect("create order");
        let sig = MockGateway::valid_signature(&summary.gateway_intent_id, "pay_1");
        fx.orders
            .verify_payment(summary.order_id, "pay_1", &sig)
            .await
            .expect("verify payment")
    }

    #[tokio::test]
    async fn test_full_refund_lifecycle() {
        let fx = fixture();
        let order = paid_order(&fx).await;
        assert_eq!(order.amount_total, Decimal::from(250));

        let request = fx
            .refunds
            .create_refund_request(order.id, UserId::new(1), "arrived damaged")
            .await
            .expect("open request");
        assert_eq!(request.status, RefundStatus::Requested);

        let order = fx.orders.get_order(order.id).await.expect("get order");
        assert_eq!(order.status, OrderStatus::RefundRequested);

        let resolved = fx
            .refunds
            .resolve(request.id, RefundDecision::Approve, Some("ok"), "admin:jane")
            .await
            .expect("approve");
        assert_eq!(resolved.status, RefundStatus::Completed);
        assert_eq!(resolved.resolved_by.as_deref(), Some("admin:jane"));

        let order = fx.orders.get_order(order.id).await.expect("get order");
        assert_eq!(order.status, OrderStatus::Refunded);
        assert_eq!(fx.gateway.refunds_executed(), 1);
    }

    #[tokio::test]
    async fn test_refund_rejected_restores_prior_status() {
        let fx = fixture();
        let order = paid_order(&fx).await;
        let order = fx
            .orders
            .update_status(order.id, OrderStatus::Confirmed, "admin:jane")
            .await
            .expect("confirm");
        let order = fx
            .orders
            .update_status(order.id, OrderStatus::Shipped, "admin:jane")
            .await
            .expect("ship");

        let request = fx
            .refunds
            .create_refund_request(order.id, UserId::new(1), "changed my mind")
            .await
            .expect("open request");

        let resolved = fx
            .refunds
            .resolve(
                request.id,
                RefundDecision::Reject,
                Some("already shipped"),
                "admin:jane",
            )
            .await
            .expect("reject");
        assert_eq!(resolved.status, RefundStatus::Rejected);
        assert_eq!(resolved.admin_comment.as_deref(), Some("already shipped"));

        // restored to Shipped, the status held before the request
        let order = fx.orders.get_order(order.id).await.expect("get order");
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(fx.gateway.refunds_executed(), 0);
    }

    #[tokio::test]
    async fn test_no_refund_for_unpaid_or_cancelled_orders() {
        let fx = fixture();
        let summary = fx
            .orders
            .create_order(
                UserId::new(1),
                vec![LineItem::new(ProductId::new(1), Decimal::from(10), 1)],
                AddressId::new(10),
            )
            .await
            .expect("create order");

        let err = fx
            .refunds
            .create_refund_request(summary.order_id, UserId::new(1), "too slow")
            .await
            .expect_err("pending order");
        assert!(matches!(
            err,
            OrderError::NotEligible {
                status: OrderStatus::PendingPayment
            }
        ));

        fx.orders
            .cancel_order(summary.order_id, "customer:1")
            .await
            .expect("cancel");
        let err = fx
            .refunds
            .create_refund_request(summary.order_id, UserId::new(1), "too slow")
            .await
            .expect_err("cancelled order");
        assert!(matches!(
            err,
            OrderError::NotEligible {
                status: OrderStatus::Cancelled
            }
        ));
    }

    #[tokio::test]
    async fn test_duplicate_request_rejected() {
        let fx = fixture();
        let order = paid_order(&fx).await;

        fx.refunds
            .create_refund_request(order.id, UserId::new(1), "first")
            .await
            .expect("first request");
        let err = fx
            .refunds
            .create_refund_request(order.id, UserId::new(1), "second")
            .await
            .expect_err("second request");
        assert!(matches!(err, OrderError::DuplicateRequest));
    }

    #[tokio::test]
    async fn test_second_request_allowed_after_rejection() {
        let fx = fixture();
        let order = paid_order(&fx).await;

        let first = fx
            .refunds
            .create_refund_request(order.id, UserId::new(1), "first")
            .await
            .expect("first request");
        fx.refunds
            .resolve(first.id, RefundDecision::Reject, None, "admin:jane")
            .await
            .expect("reject");

        // rejection is terminal for the request but not for the order
        let second = fx
            .refunds
            .create_refund_request(order.id, UserId::new(1), "second")
            .await
            .expect("second request");
        assert_eq!(second.status, RefundStatus::Requested);
    }

    #[tokio::test]
    async fn test_retried_approval_never_double_refunds() {
        let fx = fixture();
        let order = paid_order(&fx).await;
        let request = fx
            .refunds
            .create_refund_request(order.id, UserId::new(1), "broken")
            .await
            .expect("open request");

        // First approval: the gateway executes the refund but the response
        // is lost.
        fx.gateway.fail_next_refund();
        let err = fx
            .refunds
            .resolve(request.id, RefundDecision::Approve, None, "admin:jane")
            .await
            .expect_err("simulated timeout");
        assert!(matches!(err, OrderError::RefundGateway(_)));

        // Nothing moved locally; the admin can retry.
        let untouched = fx
            .refunds
            .get_refund_request(request.id)
            .await
            .expect("request still there");
        assert_eq!(untouched.status, RefundStatus::Requested);
        let order_state = fx.orders.get_order(order.id).await.expect("get order");
        assert_eq!(order_state.status, OrderStatus::RefundRequested);

        // Retry succeeds and the gateway executed exactly one refund.
        let resolved = fx
            .refunds
            .resolve(request.id, RefundDecision::Approve, None, "admin:jane")
            .await
            .expect("retry succeeds");
        assert_eq!(resolved.status, RefundStatus::Completed);
        assert_eq!(fx.gateway.refunds_executed(), 1);
    }

    #[tokio::test]
    async fn test_approve_retry_converges_after_interrupted_resolution() {
        let fx = fixture();
        let order = paid_order(&fx).await;
        let request = fx
            .refunds
            .create_refund_request(order.id, UserId::new(1), "broken")
            .await
            .expect("open request");

        // An earlier approval moved the order but died before closing the
        // request.
        let current = fx
            .order_store
            .get(order.id)
            .await
            .expect("read order")
            .expect("order exists");
        fx.order_store
            .transition(StatusTransition {
                order_id: order.id,
                expected_version: current.version,
                from: current.status,
                to: OrderStatus::Refunded,
                actor: "admin:jane",
                payment: None,
            })
            .await
            .expect("stage interrupted approval");

        // The retry must close the request, not conflict forever.
        let resolved = fx
            .refunds
            .resolve(request.id, RefundDecision::Approve, None, "admin:jane")
            .await
            .expect("retry converges");
        assert_eq!(resolved.status, RefundStatus::Completed);

        let order = fx.orders.get_order(order.id).await.expect("get order");
        assert_eq!(order.status, OrderStatus::Refunded);
        assert_eq!(fx.gateway.refunds_executed(), 1);
    }

    #[tokio::test]
    async fn test_resolving_twice_fails() {
        let fx = fixture();
        let order = paid_order(&fx).await;
        let request = fx
            .refunds
            .create_refund_request(order.id, UserId::new(1), "broken")
            .await
            .expect("open request");
        fx.refunds
            .resolve(request.id, RefundDecision::Approve, None, "admin:jane")
            .await
            .expect("approve");

        let err = fx
            .refunds
            .resolve(request.id, RefundDecision::Reject, None, "admin:kim")
            .await
            .expect_err("already resolved");
        assert!(matches!(
            err,
            OrderError::AlreadyResolved {
                status: RefundStatus::Completed
            }
        ));
    }

    #[tokio::test]
    async fn test_request_for_someone_elses_order_is_not_found() {
        let fx = fixture();
        let order = paid_order(&fx).await;

        let err = fx
            .refunds
            .create_refund_request(order.id, UserId::new(2), "not mine")
            .await
            .expect_err("wrong owner");
        assert!(matches!(err, OrderError::NotFound));
    }

    #[tokio::test]
    async fn test_reason_validation() {
        let fx = fixture();
        let order = paid_order(&fx).await;

        let err = fx
            .refunds
            .create_refund_request(order.id, UserId::new(1), "   ")
            .await
            .expect_err("blank reason");
        assert!(matches!(err, OrderError::Validation(_)));

        let long = "x".repeat(1001);
        let err = fx
            .refunds
            .create_refund_request(order.id, UserId::new(1), &long)
            .await
            .expect_err("oversized reason");
        assert!(matches!(err, OrderError::Validation(_)));
    }
}
