//! Poll loop (C5) and lifecycle controller (C7).
//!
//! `Start` is a `tokio::select!` loop over a `tokio::time::interval` and a shutdown
//! `Notify`, the idiom the corpus's long-running workers use for graceful stop; the
//! "processing in progress" bit is an `Arc<AtomicBool>` rather than a bare mutable
//! field, since it is read from `Stop()` on a different task than the one that
//! writes it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::config::RelayConfig;
use crate::error::OutboxResult;
use crate::metrics::RelayMetrics;
use crate::publisher::OutboxPublisher;
use crate::reconciler::{self, ReconcileAction};
use crate::repository::OutboxRepository;
use crate::worker_pool;

/// Drives the claim -> publish -> reconcile -> commit tick on a fixed interval.
pub struct RelayProcessor {
    pool: PgPool,
    repo: Arc<dyn OutboxRepository>,
    publisher: Arc<dyn OutboxPublisher>,
    clock: Arc<dyn Clock>,
    metrics: Arc<RelayMetrics>,
    config: RelayConfig,
    processing: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    stopped: Arc<Notify>,
    cancel: CancellationToken,
}

impl RelayProcessor {
    /// Validates `config` and registers metrics; returns `RelayError::Configuration`
    /// for an invalid config rather than panicking, per the error taxonomy.
    pub fn new(
        pool: PgPool,
        repo: Arc<dyn OutboxRepository>,
        publisher: Arc<dyn OutboxPublisher>,
        clock: Arc<dyn Clock>,
        config: RelayConfig,
    ) -> OutboxResult<Self> {
        config.validate()?;
        let metrics = Arc::new(RelayMetrics::new(&config.metrics_namespace)?);

        Ok(Self {
            pool,
            repo,
            publisher,
            clock,
            metrics,
            config,
            processing: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
            stopped: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Runs ticks on `poll_interval` until `Stop()` is called. Returns when the
    /// shutdown signal has been observed and no tick is in flight.
    pub async fn start(&self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_tick().await;
                }
                _ = self.shutdown.notified() => {
                    break;
                }
            }
        }

        self.stopped.notify_one();
    }

    /// Signals shutdown and blocks until the loop has exited and any in-flight tick
    /// has committed or rolled back.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.shutdown.notify_one();
        self.stopped.notified().await;
    }

    async fn run_tick(&self) {
        self.processing.store(true, Ordering::SeqCst);
        let start = std::time::Instant::now();

        if let Err(err) = self.try_tick().await {
            tracing::error!(error = %err, "outbox tick failed");
        }

        self.metrics
            .tick_duration_seconds
            .observe(start.elapsed().as_secs_f64());
        self.processing.store(false, Ordering::SeqCst);
    }

    async fn try_tick(&self) -> OutboxResult<()> {
        let mut tx = self.pool.begin().await?;

        let events = self.repo.claim(&mut tx, self.config.batch_size).await?;
        self.metrics.batch_size.set(events.len() as i64);
        self.metrics.batch_size_distribution.observe(events.len() as f64);

        if events.is_empty() {
            tx.commit().await?;
            return Ok(());
        }

        let now = self.clock.now();

        // C6: skip events still inside their backoff window rather than handing them
        // to the worker pool; they stay claimed-but-untouched and return to the
        // pending pool, unreconciled, the instant this tx commits.
        let (eligible, skipped): (Vec<_>, Vec<_>) = events.into_iter().partition(|event| {
            reconciler::is_retry_eligible(event, now, self.config.max_retries, self.config.base_backoff)
        });

        if !skipped.is_empty() {
            tracing::debug!(count = skipped.len(), "skipping events still inside their backoff window");
        }

        let results = worker_pool::publish_all(
            self.publisher.as_ref(),
            &eligible,
            self.config.worker_count,
            &self.cancel,
        )
        .await;

        for (event, outcome) in eligible.iter().zip(results.iter()) {
            let action = reconciler::decide(event, outcome, self.config.max_retries);
            match &action {
                ReconcileAction::MarkProcessed { .. } => self.metrics.processed_total.inc(),
                ReconcileAction::IncrementRetry { .. } => self.metrics.publish_failures_total.inc(),
                ReconcileAction::MoveToDlq { .. } => {
                    self.metrics.publish_failures_total.inc();
                    self.metrics.dlq_migrations_total.inc();
                }
            }
            reconciler::apply(&mut tx, self.repo.as_ref(), event, action, now).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Whether a tick is currently executing; exposed for tests and diagnostics.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    /// Runs exactly one tick outside the interval loop, for integration tests that
    /// want to assert on the outcome of a single claim/publish/reconcile cycle
    /// without waiting on `poll_interval`.
    pub async fn start_one_tick_for_test(&self) {
        self.run_tick().await;
    }

    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }
}

/// Convenience for hosts that want a hard ceiling on tick duration (§5's "loose
/// deadline derived from T_poll * k"); not enforced internally, since cancelling a
/// commit in flight is explicitly disallowed.
pub fn tick_deadline(poll_interval: Duration, k: u32) -> Duration {
    poll_interval.saturating_mul(k.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_deadline_scales_with_k() {
        assert_eq!(
            tick_deadline(Duration::from_millis(100), 10),
            Duration::from_secs(1)
        );
        assert_eq!(tick_deadline(Duration::from_millis(100), 0), Duration::from_millis(100));
    }
}
