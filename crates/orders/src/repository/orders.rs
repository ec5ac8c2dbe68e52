//! Postgres order repository.
//!
//! Queries are runtime-bound (`sqlx::query_as` + `bind`). Status writes and
//! their history rows happen in one transaction; the version check is the
//! `WHERE version = $n` predicate of the `UPDATE`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use driftwood_core::{AddressId, CurrencyCode, OrderId, OrderStatus, UserId};

use super::{OrderStore, RepositoryError, StatusTransition};
use crate::model::{Order, StatusChange};

/// Order repository over a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    address_id: AddressId,
    line_items: serde_json::Value,
    amount_total: Decimal,
    currency: CurrencyCode,
    status: OrderStatus,
    gateway_intent_id: String,
    gateway_payment_id: Option<String>,
    gateway_signature: Option<String>,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let line_items = serde_json::from_value(row.line_items).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid line items in database: {e}"))
        })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            address_id: row.address_id,
            line_items,
            amount_total: row.amount_total,
            currency: row.currency,
            status: row.status,
            gateway_intent_id: row.gateway_intent_id,
            gateway_payment_id: row.gateway_payment_id,
            gateway_signature: row.gateway_signature,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatusChangeRow {
    order_id: OrderId,
    from_status: Option<OrderStatus>,
    to_status: OrderStatus,
    actor: String,
    changed_at: DateTime<Utc>,
}

impl From<StatusChangeRow> for StatusChange {
    fn from(row: StatusChangeRow) -> Self {
        Self {
            order_id: row.order_id,
            from: row.from_status,
            to: row.to_status,
            actor: row.actor,
            changed_at: row.changed_at,
        }
    }
}

const SELECT_ORDER: &str = r"
    SELECT id, user_id, address_id, line_items, amount_total, currency,
           status, gateway_intent_id, gateway_payment_id, gateway_signature,
           version, created_at, updated_at
    FROM orders
";

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order, actor: &str) -> Result<(), RepositoryError> {
        let line_items = serde_json::to_value(&order.line_items).map_err(|e| {
            RepositoryError::DataCorruption(format!("failed to serialize line items: {e}"))
        })?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO orders (
                id, user_id, address_id, line_items, amount_total, currency,
                status, gateway_intent_id, version, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            ",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.address_id)
        .bind(line_items)
        .bind(order.amount_total)
        .bind(order.currency)
        .bind(order.status)
        .bind(&order.gateway_intent_id)
        .bind(order.version)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
            INSERT INTO order_status_history (order_id, from_status, to_status, actor, changed_at)
            VALUES ($1, NULL, $2, $3, $4)
            ",
        )
        .bind(order.id)
        .bind(order.status)
        .bind(actor)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Order::try_from).transpose()
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{SELECT_ORDER} WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn list_all(&self, limit: i64) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{SELECT_ORDER} ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn transition(&self, t: StatusTransition<'_>) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // COALESCE keeps the payment fields write-once.
        let row = sqlx::query_as::<_, OrderRow>(
            r"
            UPDATE orders
            SET status = $3,
                version = version + 1,
                gateway_payment_id = COALESCE(gateway_payment_id, $4),
                gateway_signature = COALESCE(gateway_signature, $5),
                updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING id, user_id, address_id, line_items, amount_total, currency,
                      status, gateway_intent_id, gateway_payment_id, gateway_signature,
                      version, created_at, updated_at
            ",
        )
        .bind(t.order_id)
        .bind(t.expected_version)
        .bind(t.to)
        .bind(t.payment.as_ref().map(|p| p.payment_id))
        .bind(t.payment.as_ref().map(|p| p.signature))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            // Distinguish a missing order from a lost race.
            let exists = sqlx::query_scalar::<_, i32>("SELECT version FROM orders WHERE id = $1")
                .bind(t.order_id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            return Err(match exists {
                Some(_) => RepositoryError::StaleVersion,
                None => RepositoryError::NotFound,
            });
        };

        sqlx::query(
            r"
            INSERT INTO order_status_history (order_id, from_status, to_status, actor, changed_at)
            VALUES ($1, $2, $3, $4, NOW())
            ",
        )
        .bind(t.order_id)
        .bind(t.from)
        .bind(t.to)
        .bind(t.actor)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Order::try_from(row)
    }

    async fn status_history(&self, id: OrderId) -> Result<Vec<StatusChange>, RepositoryError> {
        let rows = sqlx::query_as::<_, StatusChangeRow>(
            r"
            SELECT order_id, from_status, to_status, actor, changed_at
            FROM order_status_history
            WHERE order_id = $1
            ORDER BY changed_at ASC, id ASC
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StatusChange::from).collect())
    }
}
