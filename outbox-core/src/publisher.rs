//! Downstream publisher (C2).

use async_trait::async_trait;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use resilience::timeout::with_timeout_result;

use crate::error::{OutboxResult, RelayError};
use crate::event::OutboxEvent;

/// `Publish(ctx, event) -> deliveryId | error`. Implementations must not retry
/// internally; retries belong to the reconciler.
#[async_trait]
pub trait OutboxPublisher: Send + Sync {
    async fn publish(&self, event: &OutboxEvent) -> OutboxResult<String>;
}

/// Kafka-backed publisher.
///
/// The producer MUST be configured for idempotence (`enable.idempotence=true`,
/// `acks=all`, `max.in.flight.requests.per.connection=5`) — this type does not set
/// those itself, since constructing the `FutureProducer` is the host's job; it only
/// documents the requirement, matching the corpus's own doc-comment convention.
pub struct KafkaOutboxPublisher {
    producer: FutureProducer,
    topic_prefix: String,
    timeout: std::time::Duration,
}

impl KafkaOutboxPublisher {
    pub fn new(producer: FutureProducer, topic_prefix: String) -> Self {
        Self::with_timeout(producer, topic_prefix, resilience::presets::kafka_config().timeout.duration)
    }

    pub fn with_timeout(
        producer: FutureProducer,
        topic_prefix: String,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            producer,
            topic_prefix,
            timeout,
        }
    }

    /// Resolved open question 2: one topic per aggregate type by default, e.g.
    /// `outbox.message.events`.
    fn topic(&self, aggregate_type: &str) -> String {
        format!("{}.{}.events", self.topic_prefix, aggregate_type)
    }
}

#[async_trait]
impl OutboxPublisher for KafkaOutboxPublisher {
    async fn publish(&self, event: &OutboxEvent) -> OutboxResult<String> {
        let topic = self.topic(&event.aggregate_type);
        let payload_str = serde_json::to_string(&event.payload)?;

        let event_id_str = event.id.to_string();
        let aggregate_id_str = event.aggregate_id.to_string();
        let created_at_str = event.created_at.to_rfc3339();

        let headers = OwnedHeaders::new()
            .insert(Header {
                key: "event_id",
                value: Some(event_id_str.as_bytes()),
            })
            .insert(Header {
                key: "aggregate_type",
                value: Some(event.aggregate_type.as_bytes()),
            })
            .insert(Header {
                key: "aggregate_id",
                value: Some(aggregate_id_str.as_bytes()),
            })
            .insert(Header {
                key: "created_at",
                value: Some(created_at_str.as_bytes()),
            });

        let record = FutureRecord::to(&topic)
            .key(&aggregate_id_str)
            .payload(&payload_str)
            .headers(headers);

        let delivery = with_timeout_result(self.timeout, async {
            self.producer
                .send(record, self.timeout)
                .await
                .map_err(|(err, _)| err.to_string())
        })
        .await
        .map_err(|err| match err {
            resilience::timeout::TimeoutError::Elapsed(_) => RelayError::Cancelled(err.to_string()),
            resilience::timeout::TimeoutError::OperationFailed(msg) => {
                RelayError::PublishFailed(format!("kafka publish failed: {msg}"))
            }
        })?;

        let delivery_id = format!("{}:{}", delivery.0, delivery.1);

        tracing::info!(
            event_id = %event.id,
            aggregate_type = %event.aggregate_type,
            topic = %topic,
            delivery_id = %delivery_id,
            "event published"
        );

        Ok(delivery_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::ClientConfig;

    #[test]
    fn topic_names_are_prefixed_by_aggregate_type() {
        let producer: FutureProducer = ClientConfig::new().create().unwrap();
        let publisher = KafkaOutboxPublisher::new(producer, "outbox".to_string());
        assert_eq!(publisher.topic("message"), "outbox.message.events");
        assert_eq!(publisher.topic("conversation"), "outbox.conversation.events");
    }
}
