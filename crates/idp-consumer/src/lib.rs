//! # idp-consumer
//!
//! Pulls IDP check requests off `QUEUE_PRODUCER_NAME`, probes the IDP's
//! configured URL and publishes `{"status": N}` to the request's reply
//! destination.
//!
//! | Request | Reply | Settlement |
//! |---|---|---|
//! | malformed (no body, properties, correlation id or reply-to) | none | reject |
//! | expired in the queue | none | reject |
//! | name not in `MAP_FI_NAMES_TO_URL` | 404, no probe | ack |
//! | probe answered | its status, verbatim | ack |
//! | probe failed or timed out | 500 | ack |
//! | reply could not be published | none | reject |
//!
//! Rejections never requeue. A small health server reports liveness and
//! broker readiness for orchestrators.

pub mod config;
pub mod handler;
pub mod health;
pub mod probe;
pub mod registry;

pub use config::{ConfigError, ConsumerConfig};
pub use handler::{Outcome, RequestHandler, StatusReply};
pub use health::{HealthState, ServeError};
pub use probe::{HttpProbe, Probe, ProbeError, ProbeSettings, ProbeSetupError};
pub use registry::IdpRegistry;
