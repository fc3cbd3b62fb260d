//! Error types for the outbox relay core.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for relay operations.
pub type OutboxResult<T> = Result<T, RelayError>;

/// Errors the core can surface. Kinds match the taxonomy the poll loop reacts to:
/// database errors abort the current tick, publish/reconcile failures are per-event,
/// configuration errors are fatal at construction time.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Claim, reconcile, or commit failed against the database.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A referenced outbox row no longer exists (already claimed/deleted elsewhere).
    #[error("event not found: {0}")]
    EventNotFound(Uuid),

    /// The publisher failed to deliver an event.
    #[error("publish failed: {0}")]
    PublishFailed(String),

    /// Publishing was cancelled before a definitive answer was reached.
    #[error("publish cancelled: {0}")]
    Cancelled(String),

    /// A reconcile statement failed (e.g. DLQ insert conflict); fatal to the tick.
    #[error("reconcile failed: {0}")]
    ReconcileFailed(String),

    /// Construction-time misconfiguration; the processor refuses to start.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Payload (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for context-carrying errors from lower layers.
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
