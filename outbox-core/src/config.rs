//! Relay configuration.
//!
//! Loading these values from the environment, a config file, or CLI flags is the
//! host's job, not the core's — this is a plain value type the host constructs and
//! hands to [`crate::processor::RelayProcessor::new`].

use std::time::Duration;

use crate::error::{OutboxResult, RelayError};

/// The six recognized configuration options. No others are read by the core.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// `T_poll`: interval between ticks. Typical range 20ms–1s.
    pub poll_interval: Duration,
    /// `B`: maximum rows claimed per tick.
    pub batch_size: i64,
    /// `W`: maximum concurrent publishers within a tick.
    pub worker_count: usize,
    /// Terminal attempt count; a row is moved to the DLQ once it would exceed this.
    pub max_retries: i32,
    /// Retry base duration for `NextBackoff`.
    pub base_backoff: Duration,
    /// Identifies this relay instance on its observability instruments. Applied as
    /// a `service` const label value in `metrics.rs`, not as a literal prefix on
    /// metric names or Kafka topic names — `KafkaOutboxPublisher`'s topic prefix is
    /// a separate string, not derived from this field.
    pub metrics_namespace: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            batch_size: 100,
            worker_count: 10,
            max_retries: 3,
            base_backoff: Duration::from_secs(1),
            metrics_namespace: "outbox".to_string(),
        }
    }
}

impl RelayConfig {
    /// Reject configurations that would make the processor meaningless or unsafe to
    /// start. Returns `RelayError::Configuration` rather than panicking, so the host
    /// can surface it before spawning the poll loop.
    pub fn validate(&self) -> OutboxResult<()> {
        if self.batch_size <= 0 {
            return Err(RelayError::Configuration(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.worker_count == 0 {
            return Err(RelayError::Configuration(
                "worker_count must be positive".to_string(),
            ));
        }
        if self.max_retries <= 0 {
            return Err(RelayError::Configuration(
                "max_retries must be positive".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(RelayError::Configuration(
                "poll_interval must be positive".to_string(),
            ));
        }
        if self.metrics_namespace.trim().is_empty() {
            return Err(RelayError::Configuration(
                "metrics_namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RelayConfig::default();
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.worker_count, 10);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_backoff, Duration::from_secs(1));
        assert_eq!(config.metrics_namespace, "outbox");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_worker_count() {
        let config = RelayConfig {
            worker_count: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RelayError::Configuration(_))));
    }

    #[test]
    fn rejects_nonpositive_batch_size() {
        let config = RelayConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RelayError::Configuration(_))));
    }
}
