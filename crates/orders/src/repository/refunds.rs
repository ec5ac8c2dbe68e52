//! Postgres refund request repository.
//!
//! A partial unique index (`refund_requests_one_active_per_order`) backs
//! the one-active-request-per-order invariant; resolution is guarded on
//! the row still being in `requested`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use driftwood_core::{OrderId, RefundRequestId, RefundStatus, UserId};

use super::{RefundStore, RepositoryError};
use crate::model::RefundRequest;

/// Refund request repository over a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgRefundStore {
    pool: PgPool,
}

impl PgRefundStore {
    /// Create a new refund request repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RefundRequestRow {
    id: RefundRequestId,
    order_id: OrderId,
    user_id: UserId,
    reason: String,
    status: RefundStatus,
    admin_comment: Option<String>,
    resolved_by: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RefundRequestRow> for RefundRequest {
    fn from(row: RefundRequestRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            user_id: row.user_id,
            reason: row.reason,
            status: row.status,
            admin_comment: row.admin_comment,
            resolved_by: row.resolved_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_REQUEST: &str = r"
    SELECT id, order_id, user_id, reason, status, admin_comment, resolved_by,
           created_at, updated_at
    FROM refund_requests
";

#[async_trait]
impl RefundStore for PgRefundStore {
    async fn insert(&self, request: &RefundRequest) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO refund_requests (
                id, order_id, user_id, reason, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ",
        )
        .bind(request.id)
        .bind(request.order_id)
        .bind(request.user_id)
        .bind(&request.reason)
        .bind(request.status)
        .bind(request.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict(
                    "an active refund request already exists for this order".to_owned(),
                );
            }
            RepositoryError::Database(e)
        })?;

        Ok(())
    }

    async fn get(&self, id: RefundRequestId) -> Result<Option<RefundRequest>, RepositoryError> {
        let row = sqlx::query_as::<_, RefundRequestRow>(&format!("{SELECT_REQUEST} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(RefundRequest::from))
    }

    async fn find_active_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Option<RefundRequest>, RepositoryError> {
        let row = sqlx::query_as::<_, RefundRequestRow>(&format!(
            "{SELECT_REQUEST} WHERE order_id = $1 AND status IN ('requested', 'approved')"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RefundRequest::from))
    }

    async fn list_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<RefundRequest>, RepositoryError> {
        let rows = sqlx::query_as::<_, RefundRequestRow>(&format!(
            "{SELECT_REQUEST} WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RefundRequest::from).collect())
    }

    async fn list_all(&self, limit: i64) -> Result<Vec<RefundRequest>, RepositoryError> {
        let rows = sqlx::query_as::<_, RefundRequestRow>(&format!(
            "{SELECT_REQUEST} ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(RefundRequest::from).collect())
    }

    async fn resolve(
        &self,
        id: RefundRequestId,
        new_status: RefundStatus,
        admin_comment: Option<&str>,
        resolved_by: &str,
    ) -> Result<RefundRequest, RepositoryError> {
        let row = sqlx::query_as::<_, RefundRequestRow>(
            r"
            UPDATE refund_requests
            SET status = $2, admin_comment = $3, resolved_by = $4, updated_at = NOW()
            WHERE id = $1 AND status = 'requested'
            RETURNING id, order_id, user_id, reason, status, admin_comment, resolved_by,
                      created_at, updated_at
            ",
        )
        .bind(id)
        .bind(new_status)
        .bind(admin_comment)
        .bind(resolved_by)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(RefundRequest::from(row)),
            None => {
                let exists =
                    sqlx::query_scalar::<_, RefundRequestId>("SELECT id FROM refund_requests WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await?;
                Err(match exists {
                    Some(_) => RepositoryError::StaleVersion,
                    None => RepositoryError::NotFound,
                })
            }
        }
    }
}
