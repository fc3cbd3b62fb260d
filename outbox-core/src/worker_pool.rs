//! Batch worker pool (C3): `PublishAll(ctx, events) -> results[]`.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::event::{OutboxEvent, PublishOutcome};
use crate::publisher::OutboxPublisher;

/// Publish `events` concurrently with at most `worker_count` in flight, preserving
/// the input-to-result index mapping. If `cancel` fires, any publish that has not
/// yet reached a definitive answer is recorded as a failure carrying the
/// cancellation reason; publishes already in flight are allowed to finish.
pub async fn publish_all(
    publisher: &(dyn OutboxPublisher),
    events: &[OutboxEvent],
    worker_count: usize,
    cancel: &CancellationToken,
) -> Vec<PublishOutcome> {
    let semaphore = Arc::new(Semaphore::new(worker_count.max(1)));
    let mut tasks = Vec::with_capacity(events.len());

    for event in events {
        let semaphore = semaphore.clone();
        let cancel = cancel.clone();

        let outcome = async {
            if cancel.is_cancelled() {
                return PublishOutcome::Fail {
                    reason: "cancelled before publish started".to_string(),
                };
            }

            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return PublishOutcome::Fail {
                        reason: "worker pool closed".to_string(),
                    }
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => PublishOutcome::Fail {
                    reason: "cancelled during publish".to_string(),
                },
                result = publisher.publish(event) => match result {
                    Ok(delivery_id) => PublishOutcome::Ok { delivery_id },
                    Err(err) => PublishOutcome::Fail { reason: err.to_string() },
                },
            }
        };

        tasks.push(outcome);
    }

    futures_util::future::join_all(tasks).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OutboxResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingPublisher {
        in_flight: Arc<AtomicUsize>,
        max_observed: Arc<AtomicUsize>,
        fail_ids: Vec<Uuid>,
    }

    #[async_trait]
    impl OutboxPublisher for CountingPublisher {
        async fn publish(&self, event: &OutboxEvent) -> OutboxResult<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_observed.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_ids.contains(&event.id) {
                Err(crate::error::RelayError::PublishFailed("boom".to_string()))
            } else {
                Ok(event.id.to_string())
            }
        }
    }

    fn sample_events(n: usize) -> Vec<OutboxEvent> {
        (0..n)
            .map(|_| OutboxEvent {
                id: Uuid::new_v4(),
                aggregate_type: "message".to_string(),
                aggregate_id: Uuid::new_v4(),
                payload: serde_json::json!({}),
                created_at: chrono::Utc::now(),
                processed_at: None,
                retry_count: 0,
                last_retry_at: None,
                error_message: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn preserves_index_order_and_respects_worker_cap() {
        let events = sample_events(20);
        let publisher = CountingPublisher {
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_observed: Arc::new(AtomicUsize::new(0)),
            fail_ids: vec![],
        };
        let max_observed = publisher.max_observed.clone();

        let results = publish_all(&publisher, &events, 4, &CancellationToken::new()).await;

        assert_eq!(results.len(), events.len());
        for (event, outcome) in events.iter().zip(results.iter()) {
            match outcome {
                PublishOutcome::Ok { delivery_id } => assert_eq!(delivery_id, &event.id.to_string()),
                PublishOutcome::Fail { .. } => panic!("unexpected failure"),
            }
        }
        assert!(max_observed.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn failures_are_reported_at_the_right_index() {
        let events = sample_events(3);
        let failing_id = events[1].id;
        let publisher = CountingPublisher {
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_observed: Arc::new(AtomicUsize::new(0)),
            fail_ids: vec![failing_id],
        };

        let results = publish_all(&publisher, &events, 10, &CancellationToken::new()).await;

        assert!(matches!(results[0], PublishOutcome::Ok { .. }));
        assert!(matches!(results[1], PublishOutcome::Fail { .. }));
        assert!(matches!(results[2], PublishOutcome::Ok { .. }));
    }

    #[tokio::test]
    async fn cancellation_before_start_fails_remaining_slots() {
        let events = sample_events(5);
        let publisher = CountingPublisher {
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_observed: Arc::new(AtomicUsize::new(0)),
            fail_ids: vec![],
        };

        let cancel = CancellationToken::new();
        cancel.cancel();

        let results = publish_all(&publisher, &events, 2, &cancel).await;
        assert!(results
            .iter()
            .all(|outcome| matches!(outcome, PublishOutcome::Fail { .. })));
    }
}
