use std::future::Future;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::ChannelError;
use crate::properties::MessageProperties;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueOptions {
    /// Survives a broker restart.
    pub durable: bool,
    /// Messages older than this are dropped by the broker. `None` keeps them
    /// until consumed.
    pub max_age: Option<Duration>,
}

impl QueueOptions {
    pub fn durable() -> Self {
        Self {
            durable: true,
            max_age: None,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }
}

/// A message as it arrived, before any validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub content: Bytes,
    /// `None` when the message arrived without any headers.
    pub properties: Option<MessageProperties>,
}

impl InboundMessage {
    pub fn correlation_id(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.correlation_id.as_deref())
    }
}

/// Settles a queued message. Consumed on use, so a delivery is settled at
/// most once.
pub trait Acknowledge: Send + 'static {
    fn ack(self) -> impl Future<Output = Result<(), ChannelError>> + Send;

    fn reject(self, requeue: bool) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// A message pulled from a queue, awaiting settlement.
pub struct Delivery<A> {
    pub message: InboundMessage,
    /// When the broker stored the message, if it reports it.
    pub published_at: Option<SystemTime>,
    acker: A,
}

impl<A: Acknowledge> Delivery<A> {
    pub fn new(message: InboundMessage, published_at: Option<SystemTime>, acker: A) -> Self {
        Self {
            message,
            published_at,
            acker,
        }
    }

    /// Time spent in the queue; `None` without a publish timestamp.
    pub fn age(&self) -> Option<Duration> {
        let published_at = self.published_at?;
        Some(
            SystemTime::now()
                .duration_since(published_at)
                .unwrap_or_default(),
        )
    }

    pub async fn ack(self) -> Result<(), ChannelError> {
        self.acker.ack().await
    }

    pub async fn reject(self, requeue: bool) -> Result<(), ChannelError> {
        self.acker.reject(requeue).await
    }
}

impl<A> std::fmt::Debug for Delivery<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .field("published_at", &self.published_at)
            .finish_non_exhaustive()
    }
}

pub trait DeclareQueueClient: Send + Sync + Clone + 'static {
    /// Idempotent.
    fn declare_queue(
        &self,
        name: &str,
        options: QueueOptions,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Publishes onto a declared queue and waits for the broker to store it.
pub trait EnqueueClient: Send + Sync + Clone + 'static {
    fn enqueue(
        &self,
        queue: &str,
        body: Bytes,
        properties: MessageProperties,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Publishes to a subject; only current subscribers receive it.
pub trait PublishClient: Send + Sync + Clone + 'static {
    fn publish(
        &self,
        subject: &str,
        body: Bytes,
        properties: MessageProperties,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

pub trait ConsumeClient: Send + Sync + Clone + 'static {
    type Acker: Acknowledge;

    fn consume(
        &self,
        queue: &str,
    ) -> impl Future<Output = Result<BoxStream<'static, Delivery<Self::Acker>>, ChannelError>> + Send;
}

pub trait SubscribeClient: Send + Sync + Clone + 'static {
    fn subscribe(
        &self,
        subject: &str,
    ) -> impl Future<Output = Result<BoxStream<'static, InboundMessage>, ChannelError>> + Send;
}

pub trait ConnectionStatus: Send + Sync + Clone + 'static {
    fn is_connected(&self) -> bool;
}
