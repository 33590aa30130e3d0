//! # monitor-broker
//!
//! The message channel shared by the IDP producer and consumer.
//!
//! This crate provides:
//! - Per-operation channel traits ([`DeclareQueueClient`], [`EnqueueClient`],
//!   [`PublishClient`], [`ConsumeClient`], [`SubscribeClient`]) so each
//!   service depends only on what it uses
//! - [`MessageProperties`] carried as NATS headers, and the validated
//!   [`RequestEnvelope`] the consumer works with
//! - [`NatsChannel`], the JetStream + Core NATS binding
//! - Connection management with lifecycle logging
//! - [`QueueNames`], the request and reply channel names both services share
//! - An in-process [`InMemoryBroker`] for tests (with `test-support` feature)
//!
//! ## Queues and subjects
//!
//! Request queues are JetStream work-queue streams: a request is stored until
//! one consumer acknowledges or rejects it. Reply destinations are Core NATS
//! subjects, so every producer instance sees every reply and keeps only the
//! ones it is waiting for.
//!
//! ```rust,no_run
//! use monitor_broker::{NatsChannel, NatsConfig, connect};
//! use monitor_std::SystemEnv;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = NatsConfig::from_env(&SystemEnv);
//!     let client = connect(&config, Duration::from_secs(10)).await.unwrap();
//!     let _channel = NatsChannel::new(client);
//! }
//! ```

pub mod auth;
pub mod client;
pub mod connect;
pub mod envelope;
pub mod error;
pub mod nats;
pub mod properties;
pub mod queues;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use auth::{NatsAuth, NatsConfig};
pub use client::{
    Acknowledge, ConnectionStatus, ConsumeClient, DeclareQueueClient, Delivery, EnqueueClient,
    InboundMessage, PublishClient, QueueOptions, SubscribeClient,
};
pub use connect::{ConnectError, connect};
pub use envelope::{MalformedMessage, RequestEnvelope};
pub use error::ChannelError;
pub use nats::{JetStreamAcker, NatsChannel};
pub use properties::{MessageProperties, inject_trace_context};
pub use queues::QueueNames;

#[cfg(any(test, feature = "test-support"))]
pub use mocks::{AckOutcome, InMemoryAcker, InMemoryBroker, PublishedMessage, RecordedOutcome};
