//! NATS binding of the channel traits.
//!
//! Queues are JetStream streams named after the queue and capturing a subject
//! of the same name; consumption goes through a durable pull consumer shared
//! by every instance of the consuming service. Replies use Core NATS.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_nats::connection::State;
use async_nats::jetstream::consumer::{AckPolicy, DeliverPolicy, pull};
use async_nats::jetstream::stream::{RetentionPolicy, StorageType};
use async_nats::jetstream::{self, AckKind};
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{debug, error, info};

use crate::client::{
    Acknowledge, ConnectionStatus, ConsumeClient, DeclareQueueClient, Delivery, EnqueueClient,
    InboundMessage, PublishClient, QueueOptions, SubscribeClient,
};
use crate::error::ChannelError;
use crate::properties::MessageProperties;

#[derive(Clone)]
pub struct NatsChannel {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    ack_wait: Option<Duration>,
}

impl NatsChannel {
    pub fn new(client: async_nats::Client) -> Self {
        let jetstream = jetstream::new(client.clone());
        Self {
            client,
            jetstream,
            ack_wait: None,
        }
    }

    /// How long an unsettled delivery stays with its consumer before the
    /// server redelivers it. Server default (30s) when unset. Only applies
    /// to consumers this channel creates.
    pub fn with_ack_wait(mut self, ack_wait: Duration) -> Self {
        self.ack_wait = Some(ack_wait);
        self
    }

    pub fn client(&self) -> &async_nats::Client {
        &self.client
    }
}

fn stream_config(name: &str, options: QueueOptions) -> jetstream::stream::Config {
    jetstream::stream::Config {
        name: name.to_string(),
        subjects: vec![name.to_string()],
        retention: RetentionPolicy::WorkQueue,
        storage: if options.durable {
            StorageType::File
        } else {
            StorageType::Memory
        },
        max_age: options.max_age.unwrap_or_default(),
        ..Default::default()
    }
}

fn consumer_config(queue: &str, ack_wait: Option<Duration>) -> pull::Config {
    pull::Config {
        durable_name: Some(queue.to_string()),
        ack_policy: AckPolicy::Explicit,
        deliver_policy: DeliverPolicy::All,
        ack_wait: ack_wait.unwrap_or_default(),
        ..Default::default()
    }
}

fn inbound(message: &async_nats::Message) -> InboundMessage {
    InboundMessage {
        content: message.payload.clone(),
        properties: message.headers.as_ref().map(MessageProperties::from_headers),
    }
}

fn published_at(message: &jetstream::Message) -> Option<SystemTime> {
    let info = message.info().ok()?;
    let nanos = u64::try_from(info.published.unix_timestamp_nanos()).ok()?;
    Some(UNIX_EPOCH + Duration::from_nanos(nanos))
}

impl DeclareQueueClient for NatsChannel {
    async fn declare_queue(&self, name: &str, options: QueueOptions) -> Result<(), ChannelError> {
        self.jetstream
            .get_or_create_stream(stream_config(name, options))
            .await
            .map_err(|e| ChannelError::Declare {
                queue: name.to_string(),
                error: e.to_string(),
            })?;
        info!(
            queue = name,
            durable = options.durable,
            max_age = ?options.max_age,
            "Queue declared"
        );
        Ok(())
    }
}

impl EnqueueClient for NatsChannel {
    async fn enqueue(
        &self,
        queue: &str,
        body: Bytes,
        properties: MessageProperties,
    ) -> Result<(), ChannelError> {
        let publish_error = |e: String| ChannelError::Publish {
            destination: queue.to_string(),
            error: e,
        };

        let ack = self
            .jetstream
            .publish_with_headers(queue.to_string(), properties.to_headers(), body)
            .await
            .map_err(|e| publish_error(e.to_string()))?;
        ack.await.map_err(|e| publish_error(e.to_string()))?;
        Ok(())
    }
}

impl PublishClient for NatsChannel {
    async fn publish(
        &self,
        subject: &str,
        body: Bytes,
        properties: MessageProperties,
    ) -> Result<(), ChannelError> {
        let publish_error = |e: String| ChannelError::Publish {
            destination: subject.to_string(),
            error: e,
        };

        self.client
            .publish_with_headers(subject.to_string(), properties.to_headers(), body)
            .await
            .map_err(|e| publish_error(e.to_string()))?;
        self.client
            .flush()
            .await
            .map_err(|e| publish_error(e.to_string()))
    }
}

/// Settles a JetStream message: `reject(false)` terminates it, `reject(true)`
/// asks for redelivery.
pub struct JetStreamAcker(jetstream::Message);

impl Acknowledge for JetStreamAcker {
    async fn ack(self) -> Result<(), ChannelError> {
        self.0
            .ack()
            .await
            .map_err(|e| ChannelError::Ack(e.to_string()))
    }

    async fn reject(self, requeue: bool) -> Result<(), ChannelError> {
        let kind = if requeue { AckKind::Nak(None) } else { AckKind::Term };
        self.0
            .ack_with(kind)
            .await
            .map_err(|e| ChannelError::Ack(e.to_string()))
    }
}

impl ConsumeClient for NatsChannel {
    type Acker = JetStreamAcker;

    async fn consume(
        &self,
        queue: &str,
    ) -> Result<BoxStream<'static, Delivery<JetStreamAcker>>, ChannelError> {
        let consume_error = |e: String| ChannelError::Consume {
            queue: queue.to_string(),
            error: e,
        };

        let stream = self
            .jetstream
            .get_stream(queue)
            .await
            .map_err(|e| consume_error(e.to_string()))?;

        let consumer: jetstream::consumer::Consumer<pull::Config> = stream
            .get_or_create_consumer(queue, consumer_config(queue, self.ack_wait))
            .await
            .map_err(|e| consume_error(e.to_string()))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| consume_error(e.to_string()))?;

        info!(queue, "Consuming queue");

        let queue = queue.to_string();
        Ok(messages
            .filter_map(move |result| {
                let delivery = match result {
                    Ok(message) => {
                        debug!(queue = %queue, subject = %message.subject, "Received delivery");
                        let published_at = published_at(&message);
                        Some(Delivery::new(
                            inbound(&message),
                            published_at,
                            JetStreamAcker(message),
                        ))
                    }
                    Err(e) => {
                        error!(queue = %queue, error = %e, "Error receiving delivery");
                        None
                    }
                };
                futures::future::ready(delivery)
            })
            .boxed())
    }
}

impl SubscribeClient for NatsChannel {
    async fn subscribe(
        &self,
        subject: &str,
    ) -> Result<BoxStream<'static, InboundMessage>, ChannelError> {
        let subscriber = self
            .client
            .subscribe(subject.to_string())
            .await
            .map_err(|e| ChannelError::Consume {
                queue: subject.to_string(),
                error: e.to_string(),
            })?;
        info!(subject, "Subscribed");
        Ok(subscriber.map(|message| inbound(&message)).boxed())
    }
}

impl ConnectionStatus for NatsChannel {
    fn is_connected(&self) -> bool {
        matches!(self.client.connection_state(), State::Connected)
    }
}
