use std::time::Duration;

use monitor_broker::{NatsConfig, QueueNames};
use monitor_std::{JsonVarError, ReadEnv, json_var, parse_var};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IDP_URLS is required")]
    MissingIdpUrls,
    #[error(transparent)]
    InvalidJson(#[from] JsonVarError),
}

/// Configuration for the producer.
///
/// Resolved from environment variables:
/// - `PORT`: HTTP listening port (default: 3000)
/// - `HTTP_TIMEOUT`: milliseconds to wait for a reply, and per-URL timeout of
///   the internet check (default: 5000)
/// - `IDP_URLS`: JSON array of URLs for `/idp/internet` (required)
/// - `QUEUE_PRODUCER_NAME` / `QUEUE_CONSUMER_NAME`: see [`QueueNames`]
/// - Standard `NATS_*` variables (see `monitor-broker`)
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub port: u16,
    pub http_timeout: Duration,
    pub idp_urls: Vec<String>,
    pub queues: QueueNames,
    pub nats: NatsConfig,
}

impl ProducerConfig {
    pub fn from_env<E: ReadEnv>(env: &E) -> Result<Self, ConfigError> {
        let idp_urls: Vec<String> =
            json_var(env, "IDP_URLS")?.ok_or(ConfigError::MissingIdpUrls)?;

        Ok(Self {
            port: parse_var(env, "PORT", DEFAULT_PORT),
            http_timeout: Duration::from_millis(parse_var(
                env,
                "HTTP_TIMEOUT",
                DEFAULT_HTTP_TIMEOUT_MS,
            )),
            idp_urls,
            queues: QueueNames::from_env(env),
            nats: NatsConfig::from_env(env),
        })
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_std::InMemoryEnv;

    fn env_with_urls() -> InMemoryEnv {
        let env = InMemoryEnv::new();
        env.set("IDP_URLS", r#"["https://a.test","https://b.test"]"#);
        env
    }

    #[test]
    fn defaults_when_only_urls_are_set() {
        let config = ProducerConfig::from_env(&env_with_urls()).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.http_timeout, Duration::from_millis(5000));
        assert_eq!(config.idp_urls, vec!["https://a.test", "https://b.test"]);
        assert_eq!(config.queues, QueueNames::default());
        assert_eq!(config.nats.servers, vec!["localhost:4222"]);
    }

    #[test]
    fn reads_all_env_vars() {
        let env = env_with_urls();
        env.set("PORT", "8081");
        env.set("HTTP_TIMEOUT", "250");
        env.set("QUEUE_PRODUCER_NAME", "requests");
        env.set("QUEUE_CONSUMER_NAME", "replies");
        env.set("NATS_URL", "nats://broker:4222");

        let config = ProducerConfig::from_env(&env).unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.http_timeout, Duration::from_millis(250));
        assert_eq!(config.queues.requests, "requests");
        assert_eq!(config.queues.replies, "replies");
        assert_eq!(config.nats.servers, vec!["nats://broker:4222"]);
    }

    #[test]
    fn missing_urls_is_an_error() {
        let err = ProducerConfig::from_env(&InMemoryEnv::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingIdpUrls));
        assert_eq!(err.to_string(), "IDP_URLS is required");
    }

    #[test]
    fn urls_that_are_not_an_array_are_an_error() {
        let env = InMemoryEnv::new();
        env.set("IDP_URLS", "https://a.test");
        let err = ProducerConfig::from_env(&env).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJson(_)));
        assert!(err.to_string().contains("IDP_URLS"));
    }

    #[test]
    fn empty_array_is_accepted() {
        let env = InMemoryEnv::new();
        env.set("IDP_URLS", "[]");
        assert!(ProducerConfig::from_env(&env).unwrap().idp_urls.is_empty());
    }

    #[test]
    fn invalid_numbers_fall_back() {
        let env = env_with_urls();
        env.set("PORT", "eighty");
        env.set("HTTP_TIMEOUT", "-1");
        let config = ProducerConfig::from_env(&env).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.http_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn with_port_overrides_env() {
        let config = ProducerConfig::from_env(&env_with_urls())
            .unwrap()
            .with_port(9999);
        assert_eq!(config.port, 9999);
    }
}
