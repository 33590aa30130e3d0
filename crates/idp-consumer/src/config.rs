use std::time::Duration;

use monitor_broker::{NatsConfig, QueueNames};
use monitor_std::{JsonVarError, ReadEnv, json_var, parse_var};

use crate::probe::ProbeSettings;
use crate::registry::IdpRegistry;

const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;
const DEFAULT_HTTP_ACCEPT: &str = "*/*";
const DEFAULT_HTTP_USER_AGENT: &str = "Sonde AgentConnect https://status.agentconnect.gouv.fr/";
const DEFAULT_HEALTH_PORT: u16 = 3000;
const DEFAULT_MAX_IN_FLIGHT: usize = 64;
const DEFAULT_CLOCK_SKEW_MS: u64 = 2000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    InvalidJson(#[from] JsonVarError),
}

/// Configuration for the consumer.
///
/// Resolved from environment variables:
/// - `MAP_FI_NAMES_TO_URL`: JSON object, IDP name → probe URL (default: `{}`)
/// - `HTTP_TIMEOUT`: probe timeout and reply expiration in milliseconds (default: 5000)
/// - `HTTP_ACCEPT`, `HTTP_USER_AGENT`: headers sent with every probe
/// - `HTTPS_PROXY`: proxy for probes (optional)
/// - `HEALTH_PORT`: health server port (default: 3000)
/// - `CONSUMER_MAX_IN_FLIGHT`: requests handled concurrently (default: 64)
/// - `CLOCK_SKEW_TOLERANCE_MS`: slack added to request expiration (default: 2000)
/// - `QUEUE_PRODUCER_NAME` / `QUEUE_CONSUMER_NAME`: see [`QueueNames`]
/// - Standard `NATS_*` variables (see `monitor-broker`)
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub registry: IdpRegistry,
    pub http_timeout: Duration,
    pub accept: String,
    pub user_agent: String,
    pub https_proxy: Option<String>,
    pub health_port: u16,
    pub max_in_flight: usize,
    pub clock_skew: Duration,
    pub queues: QueueNames,
    pub nats: NatsConfig,
}

impl ConsumerConfig {
    pub fn from_env<E: ReadEnv>(env: &E) -> Result<Self, ConfigError> {
        let text = |key: &str, default: &str| env.var(key).unwrap_or_else(|_| default.to_string());

        Ok(Self {
            registry: json_var(env, "MAP_FI_NAMES_TO_URL")?.unwrap_or_default(),
            http_timeout: Duration::from_millis(parse_var(
                env,
                "HTTP_TIMEOUT",
                DEFAULT_HTTP_TIMEOUT_MS,
            )),
            accept: text("HTTP_ACCEPT", DEFAULT_HTTP_ACCEPT),
            user_agent: text("HTTP_USER_AGENT", DEFAULT_HTTP_USER_AGENT),
            https_proxy: env
                .var("HTTPS_PROXY")
                .ok()
                .filter(|proxy| !proxy.trim().is_empty()),
            health_port: parse_var(env, "HEALTH_PORT", DEFAULT_HEALTH_PORT),
            max_in_flight: parse_var(env, "CONSUMER_MAX_IN_FLIGHT", DEFAULT_MAX_IN_FLIGHT).max(1),
            clock_skew: Duration::from_millis(parse_var(
                env,
                "CLOCK_SKEW_TOLERANCE_MS",
                DEFAULT_CLOCK_SKEW_MS,
            )),
            queues: QueueNames::from_env(env),
            nats: NatsConfig::from_env(env),
        })
    }

    pub fn with_health_port(mut self, port: u16) -> Self {
        self.health_port = port;
        self
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            timeout: self.http_timeout,
            accept: self.accept.clone(),
            user_agent: self.user_agent.clone(),
            https_proxy: self.https_proxy.clone(),
        }
    }
}
