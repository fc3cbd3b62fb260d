//! # Transactional Outbox Relay
//!
//! A reusable core for the transactional outbox pattern: business writes and event
//! writes land in the same Postgres transaction, and a background relay claims,
//! publishes, and reconciles those rows against a downstream broker.
//!
//! This guarantees **at-least-once delivery** and prevents event loss even if:
//! - The process crashes after claiming a batch but before the publish completes
//! - The broker is temporarily unavailable
//! - Multiple replicas of the relay run against the same database concurrently
//!
//! ## Usage
//!
//! ```rust,no_run
//! use outbox_core::config::RelayConfig;
//! use outbox_core::clock::SystemClock;
//! use outbox_core::processor::RelayProcessor;
//! use outbox_core::publisher::KafkaOutboxPublisher;
//! use outbox_core::repository::PgOutboxRepository;
//! use rdkafka::ClientConfig;
//! use sqlx::PgPool;
//! use std::sync::Arc;
//!
//! # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
//! let producer = ClientConfig::new()
//!     .set("bootstrap.servers", "localhost:9092")
//!     .set("enable.idempotence", "true")
//!     .set("acks", "all")
//!     .create()?;
//!
//! let repo = Arc::new(PgOutboxRepository::new(pool.clone()));
//! let publisher = Arc::new(KafkaOutboxPublisher::new(producer, "outbox".to_string()));
//! let clock = Arc::new(SystemClock);
//!
//! let processor = RelayProcessor::new(pool, repo, publisher, clock, RelayConfig::default())?;
//! processor.start().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module map
//!
//! - [`event`] — outbox/DLQ row shapes
//! - [`repository`] — the claim query and per-event writes (Postgres)
//! - [`publisher`] — delivery to the downstream broker (Kafka)
//! - [`worker_pool`] — bounded-concurrency fan-out across a claimed batch
//! - [`reconciler`] — pure outcome decision plus its database application
//! - [`backoff`] — retry eligibility and next-attempt scheduling
//! - [`processor`] — the poll loop and lifecycle controller
//! - [`clock`] — injectable time source for deterministic backoff tests
//! - [`config`] — the relay's plain configuration value type
//! - [`metrics`] — Prometheus instruments
//! - [`error`] — the relay's error taxonomy

pub mod backoff;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod macros;
pub mod metrics;
pub mod processor;
pub mod publisher;
pub mod reconciler;
pub mod repository;
pub mod worker_pool;

pub use clock::{Clock, SystemClock};
pub use config::RelayConfig;
pub use error::{OutboxResult, RelayError};
pub use event::{DlqEvent, NewOutboxEvent, OutboxEvent, PublishOutcome};
pub use processor::RelayProcessor;
pub use publisher::{KafkaOutboxPublisher, OutboxPublisher};
pub use repository::{OutboxRepository, PgOutboxRepository};
