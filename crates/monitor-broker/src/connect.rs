use std::time::Duration;

use async_nats::{Client, ConnectOptions, Event};
use tracing::{error, info, instrument, warn};

use crate::auth::{NatsAuth, NatsConfig};

#[derive(Debug)]
pub enum ConnectError {
    InvalidCredentials(std::io::Error),
    ConnectionFailed {
        servers: Vec<String>,
        error: async_nats::ConnectError,
    },
    TimedOut {
        servers: Vec<String>,
        timeout: Duration,
    },
}

impl std::fmt::Display for ConnectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredentials(e) => write!(f, "Failed to load credentials file: {}", e),
            Self::ConnectionFailed { servers, error } => {
                write!(f, "Failed to connect to broker {:?}: {}", servers, error)
            }
            Self::TimedOut { servers, timeout } => write!(
                f,
                "Timed out after {}ms connecting to broker {:?}",
                timeout.as_millis(),
                servers
            ),
        }
    }
}

impl std::error::Error for ConnectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidCredentials(e) => Some(e),
            Self::ConnectionFailed { error, .. } => Some(error),
            Self::TimedOut { .. } => None,
        }
    }
}

const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// 1s, 2s, 4s ... capped at [`MAX_RECONNECT_DELAY`].
fn reconnect_delay(attempts: usize) -> Duration {
    let exp = u32::try_from(attempts).unwrap_or(u32::MAX);
    Duration::from_secs(2u64.saturating_pow(exp).min(MAX_RECONNECT_DELAY.as_secs()))
}

fn log_event(event: &Event) {
    match event {
        Event::Connected => info!("Broker connected"),
        Event::Disconnected => warn!("Broker disconnected"),
        Event::Closed => info!("Broker connection closed"),
        Event::Draining => info!("Broker connection draining"),
        Event::LameDuckMode => warn!("Broker entering lame duck mode"),
        Event::SlowConsumer(sid) => warn!(sid, "Broker reports slow consumer"),
        Event::ServerError(err) => error!(error = %err, "Broker server error"),
        Event::ClientError(err) => error!(error = %err, "Broker client error"),
    }
}

fn with_lifecycle(opts: ConnectOptions, timeout: Duration) -> ConnectOptions {
    opts.connection_timeout(timeout)
        .reconnect_delay_callback(reconnect_delay)
        .event_callback(|event| async move { log_event(&event) })
}

async fn options_for(auth: &NatsAuth) -> Result<ConnectOptions, ConnectError> {
    let opts = match auth {
        NatsAuth::Credentials(path) => ConnectOptions::with_credentials_file(path.clone())
            .await
            .map_err(ConnectError::InvalidCredentials)?,
        NatsAuth::UserPassword { user, password } => {
            ConnectOptions::with_user_and_password(user.clone(), password.clone())
        }
        NatsAuth::Token(token) => ConnectOptions::with_token(token.clone()),
        NatsAuth::None => ConnectOptions::new(),
    };
    Ok(opts)
}

/// Connect to the broker. Once connected, reconnection is handled by the
/// client; the initial attempt is bounded by `timeout`.
#[instrument(name = "broker.connect", skip(config), fields(servers = ?config.servers, auth = %config.auth.description()))]
pub async fn connect(config: &NatsConfig, timeout: Duration) -> Result<Client, ConnectError> {
    info!("Connecting to broker");

    let opts = with_lifecycle(options_for(&config.auth).await?, timeout);

    match tokio::time::timeout(timeout, opts.connect(&config.servers)).await {
        Ok(Ok(client)) => {
            info!("Connected to broker");
            Ok(client)
        }
        Ok(Err(error)) => {
            warn!(error = %error, "Failed to connect to broker");
            Err(ConnectError::ConnectionFailed {
                servers: config.servers.clone(),
                error,
            })
        }
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "Broker connection timed out");
            Err(ConnectError::TimedOut {
                servers: config.servers.clone(),
                timeout,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_delay_doubles_then_caps() {
        let delays: Vec<u64> = (0..7).map(|n| reconnect_delay(n).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
        assert_eq!(reconnect_delay(usize::MAX), MAX_RECONNECT_DELAY);
    }

    #[test]
    fn lifecycle_events_are_logged_without_panicking() {
        use async_nats::{ClientError, ServerError};

        for event in [
            Event::Connected,
            Event::Disconnected,
            Event::Closed,
            Event::Draining,
            Event::LameDuckMode,
            Event::SlowConsumer(7),
            Event::ServerError(ServerError::Other("boom".into())),
            Event::ClientError(ClientError::Other("boom".into())),
        ] {
            log_event(&event);
        }
    }

    #[tokio::test]
    async fn missing_credentials_file_is_reported() {
        let config = NatsConfig {
            servers: vec!["localhost:4222".into()],
            auth: NatsAuth::Credentials("/definitely/not/here.creds".into()),
        };
        let err = connect(&config, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::InvalidCredentials(_)));
        assert!(err.to_string().contains("credentials"));
    }

    #[test]
    fn timeout_display_includes_servers() {
        let err = ConnectError::TimedOut {
            servers: vec!["nats-a:4222".into()],
            timeout: Duration::from_millis(1500),
        };
        let msg = err.to_string();
        assert!(msg.contains("1500ms"));
        assert!(msg.contains("nats-a:4222"));
    }
}
