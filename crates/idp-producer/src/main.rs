//! IDP producer binary.
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `PORT` | `3000` | HTTP port, overridden by `--port` |
//! | `IDP_URLS` | required | JSON array of URLs for `/idp/internet` |
//! | `HTTP_TIMEOUT` | `5000` | Milliseconds to wait for a consumer reply |
//! | `QUEUE_PRODUCER_NAME` | `monitoring-producer` | Request queue |
//! | `QUEUE_CONSUMER_NAME` | `monitoring-consumer` | Reply queue |
//! | `NATS_URL` | `localhost:4222` | NATS server address(es) |
//! | `RUST_LOG` | `info` | Log filter |

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use idp_producer::{AppState, Correlator, PendingReplies, ProducerConfig, listener, serve};
use monitor_broker::{DeclareQueueClient, NatsChannel, QueueOptions, SubscribeClient, connect};
use monitor_std::{Shutdown, SystemEnv};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "idp-producer", about = "HTTP front of the IDP monitor")]
struct Args {
    /// Listening port, overrides PORT
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
    let mut config = ProducerConfig::from_env(&SystemEnv).expect("Invalid configuration");
    if let Some(port) = args.port {
        config = config.with_port(port);
    }

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

    let pending = Arc::new(PendingReplies::new());
    let replies = channel
        .subscribe(&config.queues.replies)
        .await
        .expect("Failed to subscribe to reply queue");
    tokio::spawn(listener::run(replies, Arc::clone(&pending)));

    let correlator = Correlator::new(channel, pending, config.queues.clone(), config.http_timeout);
    info!(
        requests = %config.queues.requests,
        replies = %config.queues.replies,
        timeout_ms = correlator.timeout().as_millis() as u64,
        idp_urls = config.idp_urls.len(),
        "IDP producer starting"
    );

    let state = AppState {
        correlator: Arc::new(correlator),
        http: reqwest::Client::new(),
        idp_urls: config.idp_urls.into(),
        url_timeout: config.http_timeout,
    };

    serve(state, config.port, Shutdown::on_signal().wait())
        .await
        .expect("Server failed");
}
