//! Outbox/DLQ persistence (C1 claim query, plus the per-event writes C4 applies).
//!
//! The claim query's SQL shape is the corpus's own `FOR UPDATE SKIP LOCKED` claim,
//! but threaded through an explicitly held `Transaction` rather than a bare pool
//! reference, so the row lock survives through reconcile and commit instead of
//! releasing the instant the `SELECT` completes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::error::{OutboxResult, RelayError};
use crate::event::{DlqEvent, NewOutboxEvent, OutboxEvent};

/// Database operations the poll loop depends on. Concretely tied to Postgres, same
/// as the corpus's own `OutboxRepository` trait — the seam that matters for testing
/// is the pure decision logic in `backoff`/`reconciler`, not this trait.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Insert a new event within the caller's transaction. MUST be called alongside
    /// the business-logic write it is reporting, in the same transaction.
    async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event: NewOutboxEvent,
        id: Uuid,
        created_at: DateTime<Utc>,
    ) -> OutboxResult<()>;

    /// C1: claim up to `limit` pending rows, locked for the lifetime of `tx`.
    async fn claim(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        limit: i64,
    ) -> OutboxResult<Vec<OutboxEvent>>;

    /// C4 ok branch: `processed_at := now()`.
    async fn mark_processed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> OutboxResult<()>;

    /// C4 fail branch, under max_retries: bump retry bookkeeping.
    async fn increment_retry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> OutboxResult<()>;

    /// C4 fail branch, at/over max_retries: insert the DLQ row and delete the
    /// outbox row, atomically within `tx`.
    async fn move_to_dlq(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event: &OutboxEvent,
        reason: &str,
        dlq_retry_count: i32,
        now: DateTime<Utc>,
    ) -> OutboxResult<()>;

    /// Pending count and oldest-pending age in seconds, for monitoring only.
    async fn count_pending(&self) -> OutboxResult<(i64, i64)>;
}

/// SQLx/Postgres implementation.
pub struct PgOutboxRepository {
    pool: PgPool,
}

impl PgOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OutboxRepository for PgOutboxRepository {
    async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event: NewOutboxEvent,
        id: Uuid,
        created_at: DateTime<Utc>,
    ) -> OutboxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox_events (
                id, aggregate_type, aggregate_id, payload, created_at,
                processed_at, retry_count, last_retry_at, error_message
            ) VALUES ($1, $2, $3, $4, $5, NULL, 0, NULL, NULL)
            "#,
        )
        .bind(id)
        .bind(&event.aggregate_type)
        .bind(event.aggregate_id)
        .bind(&event.payload)
        .bind(created_at)
        .execute(&mut **tx)
        .await?;

        tracing::debug!(event_id = %id, aggregate_type = %event.aggregate_type, "event inserted into outbox");
        Ok(())
    }

    async fn claim(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        limit: i64,
    ) -> OutboxResult<Vec<OutboxEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, aggregate_type, aggregate_id, payload, created_at,
                   processed_at, retry_count, last_retry_at, error_message
            FROM outbox_events
            WHERE processed_at IS NULL
            ORDER BY created_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(limit)
        .fetch_all(&mut **tx)
        .await?;

        let events = rows
            .into_iter()
            .map(|row| {
                Ok(OutboxEvent {
                    id: row.try_get("id")?,
                    aggregate_type: row.try_get("aggregate_type")?,
                    aggregate_id: row.try_get("aggregate_id")?,
                    payload: row.try_get("payload")?,
                    created_at: row.try_get("created_at")?,
                    processed_at: row.try_get("processed_at")?,
                    retry_count: row.try_get("retry_count")?,
                    last_retry_at: row.try_get("last_retry_at")?,
                    error_message: row.try_get("error_message")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        tracing::debug!(count = events.len(), "claimed pending events");
        Ok(events)
    }

    async fn mark_processed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> OutboxResult<()> {
        let result = sqlx::query("UPDATE outbox_events SET processed_at = $2 WHERE id = $1")
            .bind(id)
            .bind(now)
            .execute(&mut **tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RelayError::EventNotFound(id));
        }
        Ok(())
    }

    async fn increment_retry(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        reason: &str,
        now: DateTime<Utc>,
    ) -> OutboxResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET retry_count = retry_count + 1,
                last_retry_at = $2,
                error_message = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(reason)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RelayError::EventNotFound(id));
        }
        Ok(())
    }

    async fn move_to_dlq(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        event: &OutboxEvent,
        reason: &str,
        dlq_retry_count: i32,
        now: DateTime<Utc>,
    ) -> OutboxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox_dlq (
                id, aggregate_type, aggregate_id, payload, created_at,
                retry_count, error_message, moved_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.id)
        .bind(&event.aggregate_type)
        .bind(event.aggregate_id)
        .bind(&event.payload)
        .bind(event.created_at)
        .bind(dlq_retry_count)
        .bind(reason)
        .bind(now)
        .execute(&mut **tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM outbox_events WHERE id = $1")
            .bind(event.id)
            .execute(&mut **tx)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(RelayError::EventNotFound(event.id));
        }

        tracing::warn!(event_id = %event.id, reason, "event moved to DLQ");
        Ok(())
    }

    async fn count_pending(&self) -> OutboxResult<(i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*)::BIGINT AS pending,
                COALESCE(EXTRACT(EPOCH FROM (NOW() - MIN(created_at)))::BIGINT, 0) AS age_seconds
            FROM outbox_events
            WHERE processed_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok((row.try_get("pending")?, row.try_get("age_seconds")?))
    }
}

/// Fetch a single DLQ row by id, for tests and operational inspection.
pub async fn fetch_dlq_event(pool: &PgPool, id: Uuid) -> OutboxResult<Option<DlqEvent>> {
    let row = sqlx::query_as::<_, DlqEvent>("SELECT * FROM outbox_dlq WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Apply the pending sqlx migrations bundled with this crate.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
