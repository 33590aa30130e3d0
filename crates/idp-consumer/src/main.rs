//! IDP consumer binary.
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `MAP_FI_NAMES_TO_URL` | `{}` | JSON object, IDP name → probe URL |
//! | `HTTP_TIMEOUT` | `5000` | Probe timeout in milliseconds |
//! | `HTTP_ACCEPT` | `*/*` | `Accept` header of probes |
//! | `HTTP_USER_AGENT` | `Sonde AgentConnect ...` | `User-Agent` header of probes |
//! | `HTTPS_PROXY` | none | Proxy for probes |
//! | `HEALTH_PORT` | `3000` | Health server port, overridden by `--port` |
//! | `CONSUMER_MAX_IN_FLIGHT` | `64` | Requests handled concurrently |
//! | `CLOCK_SKEW_TOLERANCE_MS` | `2000` | Slack added to request expiration |
//! | `QUEUE_PRODUCER_NAME` | `monitoring-producer` | Request queue |
//! | `NATS_URL` | `localhost:4222` | NATS server address(es) |
//! | `RUST_LOG` | `info` | Log filter |

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use idp_consumer::{ConsumerConfig, HealthState, HttpProbe, RequestHandler, handler, health};
use monitor_broker::{ConsumeClient, DeclareQueueClient, NatsChannel, QueueOptions, connect};
use monitor_std::{Shutdown, SystemEnv};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "idp-consumer", about = "Probes identity providers for the IDP monitor")]
struct Args {
    /// Health server port, overrides HEALTH_PORT
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = ConsumerConfig::from_env(&SystemEnv).expect("Invalid configuration");
    if let Some(port) = args.port {
        config = config.with_health_port(port);
    }

    info!(
        idps = ?config.registry.names().collect::<Vec<_>>(),
        proxy = ?config.https_proxy,
        "IDP registry loaded"
    );
    let probe = HttpProbe::new(&config.probe_settings()).expect("Invalid probe settings");

    info!(
        servers = ?config.nats.servers,
        auth = config.nats.auth.description(),
        "Connecting to NATS"
    );
    let client = connect(&config.nats, Duration::from_secs(10))
        .await
        .expect("Failed to connect to NATS");
    let channel = NatsChannel::new(client);

    channel
        .declare_queue(
            &config.queues.requests,
            QueueOptions::durable().with_max_age(config.http_timeout),
        )
        .await
        .expect("Failed to declare request queue");
    let deliveries = channel
        .consume(&config.queues.requests)
        .await
        .expect("Failed to consume request queue");

    let shutdown = Shutdown::on_signal();

    let health = HealthState::new(channel.clone());
    let health_port = config.health_port;
    let health_stop = shutdown.wait();
    let health_server = tokio::spawn(async move {
        if let Err(e) = health::serve(health, health_port, health_stop).await {
            error!(error = %e, "Health server failed");
        }
    });

    let handler = Arc::new(RequestHandler::new(
        channel,
        Arc::new(config.registry),
        probe,
        config.http_timeout,
    )
    .with_clock_skew(config.clock_skew));
    handler::run(handler, deliveries, config.max_in_flight, shutdown.wait()).await;
    // The request stream can also end on its own; take the health server down with it.
    shutdown.trigger();

    if let Err(e) = health_server.await {
        error!(error = %e, "Health server task panicked");
    }
    info!("IDP consumer stopped");
}
