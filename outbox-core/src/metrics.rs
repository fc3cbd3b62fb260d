//! Observability (C8): counters, a gauge, and two histograms registered against
//! the process-wide default registry, matching the construction idiom of the
//! corpus's `transactional_outbox::metrics::OutboxMetrics::new`.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts};

const TICK_DURATION_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
const BATCH_SIZE_BUCKETS: &[f64] = &[1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 200.0, 500.0];

pub struct RelayMetrics {
    pub processed_total: IntCounter,
    pub publish_failures_total: IntCounter,
    pub dlq_migrations_total: IntCounter,
    pub batch_size: IntGauge,
    pub tick_duration_seconds: Histogram,
    pub batch_size_distribution: Histogram,
}

impl RelayMetrics {
    /// Register every instrument against `prometheus::default_registry()`, with a
    /// `service` const label naming the relay instance. `metrics_namespace` is
    /// applied as that label's value, not as a literal prefix on the metric names
    /// themselves — metric names (`outbox_processed_total` etc.) stay fixed across
    /// instances, following the teacher's own `OutboxMetrics::new(service)` idiom.
    /// Returns an error if any collector name collides with one already registered
    /// (e.g. calling this twice in the same process with the same namespace).
    pub fn new(metrics_namespace: &str) -> Result<Self, prometheus::Error> {
        let const_labels = {
            let mut labels = std::collections::HashMap::new();
            labels.insert("service".to_string(), metrics_namespace.to_string());
            labels
        };

        let processed_total = IntCounter::with_opts(
            Opts::new("outbox_processed_total", "Events successfully published and marked processed")
                .const_labels(const_labels.clone()),
        )?;
        let publish_failures_total = IntCounter::with_opts(
            Opts::new("outbox_publish_failures_total", "Publish attempts that did not succeed")
                .const_labels(const_labels.clone()),
        )?;
        let dlq_migrations_total = IntCounter::with_opts(
            Opts::new("outbox_dlq_migrations_total", "Events moved to the dead-letter table")
                .const_labels(const_labels.clone()),
        )?;
        let batch_size = IntGauge::with_opts(
            Opts::new("outbox_batch_size", "Number of events claimed in the most recent tick")
                .const_labels(const_labels.clone()),
        )?;
        let tick_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("outbox_tick_duration_seconds", "Wall-clock duration of one poll tick")
                .const_labels(const_labels.clone())
                .buckets(TICK_DURATION_BUCKETS.to_vec()),
        )?;
        let batch_size_distribution = Histogram::with_opts(
            HistogramOpts::new("outbox_batch_size_distribution", "Distribution of claimed batch sizes")
                .const_labels(const_labels)
                .buckets(BATCH_SIZE_BUCKETS.to_vec()),
        )?;

        let registry = prometheus::default_registry();
        registry.register(Box::new(processed_total.clone()))?;
        registry.register(Box::new(publish_failures_total.clone()))?;
        registry.register(Box::new(dlq_migrations_total.clone()))?;
        registry.register(Box::new(batch_size.clone()))?;
        registry.register(Box::new(tick_duration_seconds.clone()))?;
        registry.register(Box::new(batch_size_distribution.clone()))?;

        Ok(Self {
            processed_total,
            publish_failures_total,
            dlq_migrations_total,
            batch_size,
            tick_duration_seconds,
            batch_size_distribution,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_without_error_under_a_unique_namespace() {
        let metrics = RelayMetrics::new("outbox_metrics_test_unique_ns").unwrap();
        metrics.processed_total.inc();
        metrics.batch_size.set(7);
        assert_eq!(metrics.processed_total.get(), 1);
        assert_eq!(metrics.batch_size.get(), 7);
    }
}
