//! # idp-producer
//!
//! HTTP front of the IDP monitor.
//!
//! ```text
//! GET /idp/{name}
//!     ↓ mint correlation id, register a one-shot waiter
//!     ↓ enqueue {name} on QUEUE_PRODUCER_NAME (Correlation-Id, Reply-To, Expiration)
//! [idp-consumer probes the IDP]
//!     ↓ {"status": N} published on QUEUE_CONSUMER_NAME
//! [reply listener] → waiter for that correlation id → HTTP status N
//! ```
//!
//! A call that gets no reply within `HTTP_TIMEOUT` answers 503. A reply that
//! arrives afterwards finds no waiter and is dropped.
//!
//! `GET /idp/internet` checks `IDP_URLS` directly and answers 200 when more
//! of them respond with 2xx/3xx than not.

pub mod aggregate;
pub mod config;
pub mod correlation_id;
pub mod correlator;
pub mod idp_name;
pub mod listener;
pub mod pending;
pub mod server;

pub use config::{ConfigError, ProducerConfig};
pub use correlation_id::CorrelationId;
pub use correlator::Correlator;
pub use idp_name::IdpName;
pub use pending::PendingReplies;
pub use server::{AppState, ServeError, router, serve};
