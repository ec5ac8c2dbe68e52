//! In-memory repositories.
//!
//! Used by the test suites and by local development without Postgres.
//! They honor the same version/status guards as the Postgres stores, so
//! the services behave identically on either backend.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use driftwood_core::{OrderId, RefundRequestId, RefundStatus, UserId};

use super::{OrderStore, RefundStore, RepositoryError, StatusTransition};
use crate::model::{Order, RefundRequest, StatusChange};

/// In-memory order store.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
    history: RwLock<Vec<StatusChange>>,
}

impl InMemoryOrderStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order, actor: &str) -> Result<(), RepositoryError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        if orders.contains_key(&order.id) {
            return Err(RepositoryError::Conflict("order id already exists".to_owned()));
        }
        orders.insert(order.id, order.clone());

        self.history.write().map_err(poisoned)?.push(StatusChange {
            order_id: order.id,
            from: None,
            to: order.status,
            actor: actor.to_owned(),
            changed_at: order.created_at,
        });
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().map_err(poisoned)?.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .orders
            .read()
            .map_err(poisoned)?
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn list_all(&self, limit: i64) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> =
            self.orders.read().map_err(poisoned)?.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(orders)
    }

    async fn transition(&self, t: StatusTransition<'_>) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().map_err(poisoned)?;
        let order = orders.get_mut(&t.order_id).ok_or(RepositoryError::NotFound)?;

        if order.version != t.expected_version {
            return Err(RepositoryError::StaleVersion);
        }

        order.status = t.to;
        order.version += 1;
        order.updated_at = Utc::now();
        if let Some(payment) = &t.payment {
            // write-once, like the Postgres COALESCE
            order
                .gateway_payment_id
                .get_or_insert_with(|| payment.payment_id.to_owned());
            order
                .gateway_signature
                .get_or_insert_with(|| payment.signature.to_owned());
        }
        let updated = order.clone();
        drop(orders);

        self.history.write().map_err(poisoned)?.push(StatusChange {
            order_id: t.order_id,
            from: Some(t.from),
            to: t.to,
            actor: t.actor.to_owned(),
            changed_at: updated.updated_at,
        });
        Ok(updated)
    }

    async fn status_history(&self, id: OrderId) -> Result<Vec<StatusChange>, RepositoryError> {
        Ok(self
            .history
            .read()
            .map_err(poisoned)?
            .iter()
            .filter(|c| c.order_id == id)
            .cloned()
            .collect())
    }
}

/// In-memory refund request store.
#[derive(Debug, Default)]
pub struct InMemoryRefundStore {
    requests: RwLock<HashMap<RefundRequestId, RefundRequest>>,
}

impl InMemoryRefundStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefundStore for InMemoryRefundStore {
    async fn insert(&self, request: &RefundRequest) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().map_err(poisoned)?;
        let has_active = requests
            .values()
            .any(|r| r.order_id == request.order_id && !r.status.is_terminal());
        if has_active {
            return Err(RepositoryError::Conflict(
                "an active refund request already exists for this order".to_owned(),
            ));
        }
        requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn get(&self, id: RefundRequestId) -> Result<Option<RefundRequest>, RepositoryError> {
        Ok(self.requests.read().map_err(poisoned)?.get(&id).cloned())
    }

    async fn find_active_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<RefundRequest>, RepositoryError> {
        Ok(self
            .requests
            .read()
            .map_err(poisoned)?
            .values()
            .find(|r| r.order_id == order_id && !r.status.is_terminal())
            .cloned())
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RefundRequest>, RepositoryError> {
        let mut requests: Vec<RefundRequest> = self
            .requests
            .read()
            .map_err(poisoned)?
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn list_all(&self, limit: i64) -> Result<Vec<RefundRequest>, RepositoryError> {
        let mut requests: Vec<RefundRequest> =
            self.requests.read().map_err(poisoned)?.values().cloned().collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(requests)
    }

    async fn resolve(
        &self,
        id: RefundRequestId,
        new_status: RefundStatus,
        admin_comment: Option<&str>,
        resolved_by: &str,
    ) -> Result<RefundRequest, RepositoryError> {
        let mut requests = self.requests.write().map_err(poisoned)?;
        let request = requests.get_mut(&id).ok_or(RepositoryError::NotFound)?;

        if request.status != RefundStatus::Requested {
            return Err(RepositoryError::StaleVersion);
        }

        request.status = new_status;
        request.admin_comment = admin_comment.map(str::to_owned);
        request.resolved_by = Some(resolved_by.to_owned());
        request.updated_at = Utc::now();
        Ok(request.clone())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> RepositoryError {
    RepositoryError::DataCorruption("in-memory store lock poisoned".to_owned())
}
