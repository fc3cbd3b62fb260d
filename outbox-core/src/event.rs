//! Outbox and DLQ row shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A row in the outbox table: a domain event awaiting publication.
///
/// Rows are created by external writers inside their own business transaction and
/// read-claimed here; the core never inspects `payload`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// A new event to be inserted by `OutboxRepository::insert`, within the caller's
/// transaction. The core assigns `id`/`created_at`.
#[derive(Debug, Clone)]
pub struct NewOutboxEvent {
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub payload: serde_json::Value,
}

/// A terminal row in the DLQ table. Never reappears to the core.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DlqEvent {
    pub id: Uuid,
    pub aggregate_type: String,
    pub aggregate_id: Uuid,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub retry_count: i32,
    pub error_message: String,
    pub moved_at: DateTime<Utc>,
}

/// Outcome of one publish attempt, indexed to the event it was produced for.
#[derive(Debug, Clone)]
pub enum PublishOutcome {
    Ok { delivery_id: String },
    Fail { reason: String },
}
