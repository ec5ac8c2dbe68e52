//! Order lifecycle orchestration.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use driftwood_core::{
    AddressId, CurrencyCode, LineItem, OrderId, OrderStatus, UserId, line_items_total,
};

use super::MAX_WRITE_ATTEMPTS;
use crate::error::OrderError;
use crate::gateway::PaymentGateway;
use crate::model::{CheckoutSummary, Order, StatusChange};
use crate::repository::{OrderStore, PaymentProof, RepositoryError, StatusTransition};

/// Statuses an administrator may set directly. Everything else moves only
/// through its dedicated trigger (payment verification, refund flow).
const ADMIN_SETTABLE: [OrderStatus; 4] = [
    OrderStatus::Confirmed,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
];

/// Orchestrates order creation, payment verification, and status updates.
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    currency: CurrencyCode,
}

impl OrderService {
    /// Create a new order service.
    #[must_use]
    pub fn new(
        orders: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            orders,
            gateway,
            currency,
        }
    }

    /// Create an order from the cart collaborator's line items.
    ///
    /// Obtains a gateway payment intent first; nothing is persisted if the
    /// gateway call fails, so no order ever sits in `PendingPayment`
    /// without an intent id.
    ///
    /// # Errors
    ///
    /// `Validation` on empty/invalid line items, `Gateway` if intent
    /// creation fails, `Repository` if persistence fails.
    #[instrument(skip(self, line_items), fields(%user_id))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        line_items: Vec<LineItem>,
        address_id: AddressId,
    ) -> Result<CheckoutSummary, OrderError> {
        if line_items.is_empty() {
            return Err(OrderError::Validation("order has no line items".to_owned()));
        }
        for item in &line_items {
            if item.quantity == 0 {
                return Err(OrderError::Validation(format!(
                    "line item {} has zero quantity",
                    item.product_id
                )));
            }
            if item.unit_price < Decimal::ZERO {
                return Err(OrderError::Validation(format!(
                    "line item {} has a negative unit price",
                    item.product_id
                )));
            }
        }

        // Computed once, never recomputed from client input afterwards.
        let amount_total = line_items_total(&line_items);

        let gateway_intent_id = self
            .gateway
            .create_intent(amount_total, self.currency)
            .await?;

        let now = Utc::now();
        let order = Order {
            id: OrderId::generate(),
            user_id,
            address_id,
            line_items,
            amount_total,
            currency: self.currency,
            status: OrderStatus::PendingPayment,
            gateway_intent_id: gateway_intent_id.clone(),
            gateway_payment_id: None,
            gateway_signature: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };

        self.orders
            .insert(&order, &format!("customer:{user_id}"))
            .await?;

        info!(order_id = %order.id, %amount_total, "order created");

        Ok(CheckoutSummary {
            order_id: order.id,
            gateway_intent_id,
            amount_total,
            currency: self.currency,
            publishable_key: self.gateway.publishable_key().to_owned(),
        })
    }

    /// Verify a payment confirmation and transition the order to `Paid`.
    ///
    /// Idempotent under webhook re-delivery: an order that is already
    /// `Paid` returns success with no side effects. The signature check is
    /// pure and happens before the version-checked write, so racing
    /// verifications may both check but at most one wins the transition.
    ///
    /// # Errors
    ///
    /// `InvalidState` when the order is neither pending nor paid,
    /// `PaymentVerification` on a signature mismatch (the order is
    /// cancelled), `Conflict` when retries are exhausted.
    #[instrument(skip(self, gateway_signature), fields(%order_id))]
    pub async fn verify_payment(
        &self,
        order_id: OrderId,
        gateway_payment_id: &str,
        gateway_signature: &str,
    ) -> Result<Order, OrderError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let order = self
                .orders
                .get(order_id)
                .await?
                .ok_or(OrderError::NotFound)?;

            match order.status {
                // Re-delivery of a confirmation we already accepted.
                OrderStatus::Paid => return Ok(order),
                OrderStatus::PendingPayment => {}
                current => return Err(OrderError::InvalidState { current }),
            }

            if !self.gateway.verify_signature(
                &order.gateway_intent_id,
                gateway_payment_id,
                gateway_signature,
            ) {
                warn!(%order_id, "payment signature mismatch, cancelling order");
                match self
                    .orders
                    .transition(StatusTransition {
                        order_id,
                        expected_version: order.version,
                        from: order.status,
                        to: OrderStatus::Cancelled,
                        actor: "gateway",
                        payment: None,
                    })
                    .await
                {
                    Ok(_) => {
                        return Err(OrderError::PaymentVerification(
                            "gateway signature mismatch".to_owned(),
                        ));
                    }
                    Err(RepositoryError::StaleVersion) => continue,
                    Err(e) => return Err(e.into()),
                }
            }

            match self
                .orders
                .transition(StatusTransition {
                    order_id,
                    expected_version: order.version,
                    from: order.status,
                    to: OrderStatus::Paid,
                    actor: "gateway",
                    payment: Some(PaymentProof {
                        payment_id: gateway_payment_id,
                        signature: gateway_signature,
                    }),
                })
                .await
            {
                Ok(order) => {
                    info!(%order_id, "payment verified");
                    return Ok(order);
                }
                Err(RepositoryError::StaleVersion) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Err(OrderError::Conflict)
    }

    /// Explicitly cancel an order that is still awaiting payment.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the order is in `PendingPayment`.
    #[instrument(skip(self), fields(%order_id))]
    pub async fn cancel_order(&self, order_id: OrderId, actor: &str) -> Result<Order, OrderError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let order = self
                .orders
                .get(order_id)
                .await?
                .ok_or(OrderError::NotFound)?;

            if order.status != OrderStatus::PendingPayment {
                return Err(OrderError::InvalidState {
                    current: order.status,
                });
            }

            match self
                .orders
                .transition(StatusTransition {
                    order_id,
                    expected_version: order.version,
                    from: order.status,
                    to: OrderStatus::Cancelled,
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

    /// Admin status update, validated against the transition table.
    ///
    /// Only fulfilment steps and the pending-payment cancel may be set
    /// directly; `Paid`, `RefundRequested`, and `Refunded` move exclusively
    /// through their own triggers, and an order under an open refund
    /// request cannot be driven from here at all.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` for anything the table does not allow.
    #[instrument(skip(self), fields(%order_id, %new_status))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
        actor: &str,
    ) -> Result<Order, OrderError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let order = self
                .orders
                .get(order_id)
                .await?
                .ok_or(OrderError::NotFound)?;

            if !ADMIN_SETTABLE.contains(&new_status)
                || order.status == OrderStatus::RefundRequested
                || !order.status.can_transition_to(new_status)
            {
                return Err(OrderError::InvalidTransition {
                    from: order.status,
                    to: new_status,
                });
            }

            match self
                .orders
                .transition(StatusTransition {
                    order_id,
                    expected_version: order.version,
                    from: order.status,
                    to: new_status,
                    actor,
                    payment: None,
                })
                .await
            {
                Ok(order) => {
                    info!(%order_id, status = %order.status, "admin status update applied");
                    return Ok(order);
                }
                Err(RepositoryError::StaleVersion) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Err(OrderError::Conflict)
    }

    /// Load one order.
    ///
    /// # Errors
    ///
    /// `NotFound` if the order does not exist.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.orders
            .get(order_id)
            .await?
            .ok_or(OrderError::NotFound)
    }

    /// Load one order, scoped to its owner.
    ///
    /// # Errors
    ///
    /// `NotFound` if the order does not exist or belongs to someone else.
    pub async fn get_order_for_user(
        &self,
        order_id: OrderId,
        user_id: UserId,
    ) -> Result<Order, OrderError> {
        let order = self.get_order(order_id).await?;
        if order.user_id != user_id {
            return Err(OrderError::NotFound);
        }
        Ok(order)
    }

    /// Orders belonging to one customer, newest first.
    ///
    /// # Errors
    ///
    /// `Repository` if the read fails.
    pub async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_for_user(user_id).await?)
    }

    /// All orders, newest first, bounded.
    ///
    /// # Errors
    ///
    /// `Repository` if the read fails.
    pub async fn list_orders(&self, limit: i64) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.list_all(limit).await?)
    }

    /// Full status history of one order, oldest first.
    ///
    /// # Errors
    ///
    /// `Repository` if the read fails.
    pub async fn status_history(&self, order_id: OrderId) -> Result<Vec<StatusChange>, OrderError> {
        Ok(self.orders.status_history(order_id).await?)
    }
}
