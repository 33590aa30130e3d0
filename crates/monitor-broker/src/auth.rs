use std::path::PathBuf;

use monitor_std::ReadEnv;

const ENV_NATS_URL: &str = "NATS_URL";
const ENV_NATS_CREDS: &str = "NATS_CREDS";
const ENV_NATS_USER: &str = "NATS_USER";
const ENV_NATS_PASSWORD: &str = "NATS_PASSWORD";
const ENV_NATS_TOKEN: &str = "NATS_TOKEN";

const DEFAULT_NATS_URL: &str = "localhost:4222";

/// How the services authenticate against the broker.
///
/// Resolved from the environment in this order: `NATS_CREDS`, then
/// `NATS_USER` + `NATS_PASSWORD`, then `NATS_TOKEN`, otherwise none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NatsAuth {
    Credentials(PathBuf),
    UserPassword { user: String, password: String },
    Token(String),
    None,
}

impl NatsAuth {
    /// Safe to log: never includes the secret itself.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Credentials(_) => "credentials file",
            Self::UserPassword { .. } => "user/password",
            Self::Token(_) => "token",
            Self::None => "none",
        }
    }

    fn from_env<E: ReadEnv>(env: &E) -> Self {
        if let Ok(path) = env.var(ENV_NATS_CREDS) {
            return Self::Credentials(PathBuf::from(path));
        }
        if let (Ok(user), Ok(password)) = (env.var(ENV_NATS_USER), env.var(ENV_NATS_PASSWORD)) {
            return Self::UserPassword { user, password };
        }
        if let Ok(token) = env.var(ENV_NATS_TOKEN) {
            return Self::Token(token);
        }
        Self::None
    }
}

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatsConfig {
    pub servers: Vec<String>,
    pub auth: NatsAuth,
}

impl NatsConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            servers: vec![url.into()],
            auth: NatsAuth::None,
        }
    }

    /// `NATS_URL` is a comma-separated server list (default `localhost:4222`).
    pub fn from_env<E: ReadEnv>(env: &E) -> Self {
        let raw = env
            .var(ENV_NATS_URL)
            .unwrap_or_else(|_| DEFAULT_NATS_URL.to_string());
        let mut servers: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if servers.is_empty() {
            servers.push(DEFAULT_NATS_URL.to_string());
        }

        Self {
            servers,
            auth: NatsAuth::from_env(env),
        }
    }
}
