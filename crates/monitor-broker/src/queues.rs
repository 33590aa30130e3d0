use monitor_std::ReadEnv;

const ENV_QUEUE_PRODUCER_NAME: &str = "QUEUE_PRODUCER_NAME";
const ENV_QUEUE_CONSUMER_NAME: &str = "QUEUE_CONSUMER_NAME";

const DEFAULT_REQUEST_QUEUE: &str = "monitoring-producer";
const DEFAULT_REPLY_QUEUE: &str = "monitoring-consumer";

/// Names of the two channels between producer and consumer. Both services
/// must agree on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNames {
    /// Producer → consumer, `QUEUE_PRODUCER_NAME`.
    pub requests: String,
    /// Consumer → producer, `QUEUE_CONSUMER_NAME`.
    pub replies: String,
}

impl Default for QueueNames {
    fn default() -> Self {
        Self {
            requests: DEFAULT_REQUEST_QUEUE.to_string(),
            replies: DEFAULT_REPLY_QUEUE.to_string(),
        }
    }
}

impl QueueNames {
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        let name = |key: &str, default: &str| {
            env.var(key)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            requests: name(ENV_QUEUE_PRODUCER_NAME, DEFAULT_REQUEST_QUEUE),
            replies: name(ENV_QUEUE_CONSUMER_NAME, DEFAULT_REPLY_QUEUE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitor_std::InMemoryEnv;

    #[test]
    fn defaults_when_unset() {
        let names = QueueNames::from_env(&InMemoryEnv::new());
        assert_eq!(names, QueueNames::default());
        assert_eq!(names.requests, "monitoring-producer");
        assert_eq!(names.replies, "monitoring-consumer");
    }

    #[test]
    fn reads_both_names() {
        let env = InMemoryEnv::new();
        env.set("QUEUE_PRODUCER_NAME", "req");
        env.set("QUEUE_CONSUMER_NAME", "rep");
        let names = QueueNames::from_env(&env);
        assert_eq!(names.requests, "req");
        assert_eq!(names.replies, "rep");
    }

    #[test]
    fn blank_name_falls_back_to_default() {
        let env = InMemoryEnv::new();
        env.set("QUEUE_PRODUCER_NAME", "  ");
        assert_eq!(QueueNames::from_env(&env).requests, "monitoring-producer");
    }
}
