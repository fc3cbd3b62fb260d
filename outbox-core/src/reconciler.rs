//! Outcome reconciler (C4). `decide` is pure and carries no I/O, mirroring how
//! `backoff` is tested as a free function; `apply` is the thin impure shell that
//! turns a decision into the repository calls, run inside the same transaction
//! that `claim` opened.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use crate::backoff;
use crate::error::OutboxResult;
use crate::event::{OutboxEvent, PublishOutcome};
use crate::repository::OutboxRepository;

/// What to do with one claimed event after a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    MarkProcessed {
        id: Uuid,
    },
    IncrementRetry {
        id: Uuid,
        reason: String,
    },
    /// Resolved open question: the DLQ row records `retry_count + 1`, i.e. the
    /// attempt that exhausted the budget counts toward the stored total.
    MoveToDlq {
        id: Uuid,
        reason: String,
        dlq_retry_count: i32,
    },
}

/// Pure decision: given the claimed event and its publish outcome, decide what
/// the next persisted state should be. Does not touch the database or the clock.
pub fn decide(event: &OutboxEvent, outcome: &PublishOutcome, max_retries: i32) -> ReconcileAction {
    match outcome {
        PublishOutcome::Ok { .. } => ReconcileAction::MarkProcessed { id: event.id },
        PublishOutcome::Fail { reason } => {
            let next_retry_count = event.retry_count + 1;
            if next_retry_count >= max_retries {
                ReconcileAction::MoveToDlq {
                    id: event.id,
                    reason: reason.clone(),
                    dlq_retry_count: next_retry_count,
                }
            } else {
                ReconcileAction::IncrementRetry {
                    id: event.id,
                    reason: reason.clone(),
                }
            }
        }
    }
}

/// Apply a decision to the database within `tx`. `event` must be the same row
/// `decide` was called with, since `MoveToDlq` needs its full row to populate
/// `outbox_dlq`.
pub async fn apply(
    tx: &mut Transaction<'_, Postgres>,
    repo: &dyn OutboxRepository,
    event: &OutboxEvent,
    action: ReconcileAction,
    now: DateTime<Utc>,
) -> OutboxResult<()> {
    match action {
        ReconcileAction::MarkProcessed { id } => repo.mark_processed(tx, id, now).await,
        ReconcileAction::IncrementRetry { id, reason } => {
            repo.increment_retry(tx, id, &reason, now).await
        }
        ReconcileAction::MoveToDlq {
            reason,
            dlq_retry_count,
            ..
        } => {
            repo.move_to_dlq(tx, event, &reason, dlq_retry_count, now)
                .await
        }
    }
}

/// Whether `event` is still within its retry budget, for the caller deciding
/// whether to even attempt a publish this tick (see `backoff::is_eligible`).
pub fn is_retry_eligible(
    event: &OutboxEvent,
    now: DateTime<Utc>,
    max_retries: i32,
    base_backoff: std::time::Duration,
) -> bool {
    backoff::is_eligible(event, now, max_retries, base_backoff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(retry_count: i32) -> OutboxEvent {
        OutboxEvent {
            id: Uuid::new_v4(),
            aggregate_type: "message".to_string(),
            aggregate_id: Uuid::new_v4(),
            payload: serde_json::json!({}),
            created_at: Utc::now(),
            processed_at: None,
            retry_count,
            last_retry_at: None,
            error_message: None,
        }
    }

    #[test]
    fn ok_outcome_marks_processed() {
        let event = sample_event(0);
        let action = decide(&event, &PublishOutcome::Ok { delivery_id: "1:0".to_string() }, 3);
        assert_eq!(action, ReconcileAction::MarkProcessed { id: event.id });
    }

    #[test]
    fn failure_under_budget_increments_retry() {
        let event = sample_event(0);
        let outcome = PublishOutcome::Fail { reason: "timeout".to_string() };
        let action = decide(&event, &outcome, 3);
        assert_eq!(
            action,
            ReconcileAction::IncrementRetry { id: event.id, reason: "timeout".to_string() }
        );
    }

    #[test]
    fn failure_exhausting_budget_moves_to_dlq_with_incremented_count() {
        let event = sample_event(2);
        let outcome = PublishOutcome::Fail { reason: "broker unreachable".to_string() };
        let action = decide(&event, &outcome, 3);
        assert_eq!(
            action,
            ReconcileAction::MoveToDlq {
                id: event.id,
                reason: "broker unreachable".to_string(),
                dlq_retry_count: 3,
            }
        );
    }

    #[test]
    fn failure_already_at_budget_moves_to_dlq() {
        let event = sample_event(3);
        let outcome = PublishOutcome::Fail { reason: "still failing".to_string() };
        let action = decide(&event, &outcome, 3);
        assert!(matches!(action, ReconcileAction::MoveToDlq { dlq_retry_count: 4, .. }));
    }
}
