//! In-process broker for tests.
//!
//! Implements every channel trait. Queues buffer messages until a consumer
//! attaches; subjects drop messages nobody is subscribed to, as Core NATS
//! does. Publishes and settlements are recorded for assertions.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use bytes::Bytes;
use futures::StreamExt;
use futures::channel::mpsc;
use futures::stream::BoxStream;

use crate::client::{
    Acknowledge, ConnectionStatus, ConsumeClient, DeclareQueueClient, Delivery, EnqueueClient,
    InboundMessage, PublishClient, QueueOptions, SubscribeClient,
};
use crate::error::ChannelError;
use crate::properties::MessageProperties;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub destination: String,
    pub body: Bytes,
    pub properties: MessageProperties,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Acked,
    Rejected { requeue: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedOutcome {
    pub correlation_id: Option<String>,
    pub outcome: AckOutcome,
}

type Pending = (InboundMessage, SystemTime);

struct Queue {
    options: QueueOptions,
    backlog: VecDeque<Pending>,
    consumer: Option<mpsc::UnboundedSender<Delivery<InMemoryAcker>>>,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, Queue>,
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<InboundMessage>>>,
    published: Vec<PublishedMessage>,
    outcomes: Vec<RecordedOutcome>,
    publish_failures: u32,
    disconnected: bool,
}

#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<State>>,
}

impl std::fmt::Debug for InMemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("InMemoryBroker")
            .field("queues", &state.queues.keys().collect::<Vec<_>>())
            .field("published", &state.published.len())
            .field("outcomes", &state.outcomes.len())
            .finish()
    }
}

/// Records the settlement of an in-memory delivery.
pub struct InMemoryAcker {
    correlation_id: Option<String>,
    state: Arc<Mutex<State>>,
}

impl InMemoryAcker {
    fn record(self, outcome: AckOutcome) {
        self.state.lock().unwrap().outcomes.push(RecordedOutcome {
            correlation_id: self.correlation_id,
            outcome,
        });
    }
}

impl Acknowledge for InMemoryAcker {
    async fn ack(self) -> Result<(), ChannelError> {
        self.record(AckOutcome::Acked);
        Ok(())
    }

    async fn reject(self, requeue: bool) -> Result<(), ChannelError> {
        self.record(AckOutcome::Rejected { requeue });
        Ok(())
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next publish or enqueue.
    pub fn fail_next_publish(&self) {
        self.fail_publish_count(1);
    }

    /// Fail the next `n` publishes or enqueues.
    pub fn fail_publish_count(&self, n: u32) {
        self.state.lock().unwrap().publish_failures = n;
    }

    pub fn disconnect(&self) {
        self.state.lock().unwrap().disconnected = true;
    }

    pub fn reconnect(&self) {
        self.state.lock().unwrap().disconnected = false;
    }

    pub fn queue_options(&self, queue: &str) -> Option<QueueOptions> {
        self.state.lock().unwrap().queues.get(queue).map(|q| q.options)
    }

    /// Every successful publish and enqueue, in order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().unwrap().published.clone()
    }

    pub fn published_to(&self, destination: &str) -> Vec<PublishedMessage> {
        self.published()
            .into_iter()
            .filter(|m| m.destination == destination)
            .collect()
    }

    pub fn outcomes(&self) -> Vec<RecordedOutcome> {
        self.state.lock().unwrap().outcomes.clone()
    }

    /// Put a raw message on a declared queue, bypassing publish failures.
    /// Lets tests build messages a well-behaved publisher never would.
    pub fn deliver(
        &self,
        queue: &str,
        content: impl Into<Bytes>,
        properties: Option<MessageProperties>,
    ) -> Result<(), ChannelError> {
        self.deliver_published_at(queue, content, properties, SystemTime::now())
    }

    pub fn deliver_published_at(
        &self,
        queue: &str,
        content: impl Into<Bytes>,
        properties: Option<MessageProperties>,
        published_at: SystemTime,
    ) -> Result<(), ChannelError> {
        let message = InboundMessage {
            content: content.into(),
            properties,
        };
        let mut state = self.state.lock().unwrap();
        self.push_locked(&mut state, queue, message, published_at)
    }

    fn push_locked(
        &self,
        state: &mut State,
        queue: &str,
        message: InboundMessage,
        published_at: SystemTime,
    ) -> Result<(), ChannelError> {
        let slot = state
            .queues
            .get_mut(queue)
            .ok_or_else(|| ChannelError::Publish {
                destination: queue.to_string(),
                error: "queue not declared".to_string(),
            })?;

        let undelivered = match &slot.consumer {
            Some(consumer) => consumer
                .unbounded_send(self.delivery(message, published_at))
                .err()
                .map(|err| err.into_inner().message),
            None => Some(message),
        };
        if let Some(message) = undelivered {
            slot.consumer = None;
            slot.backlog.push_back((message, published_at));
        }
        Ok(())
    }

    fn delivery(&self, message: InboundMessage, published_at: SystemTime) -> Delivery<InMemoryAcker> {
        let acker = InMemoryAcker {
            correlation_id: message.correlation_id().map(str::to_string),
            state: Arc::clone(&self.state),
        };
        Delivery::new(message, Some(published_at), acker)
    }

    fn take_publish_failure(state: &mut State, destination: &str) -> Result<(), ChannelError> {
        if state.disconnected {
            return Err(ChannelError::Publish {
                destination: destination.to_string(),
                error: "broker disconnected".to_string(),
            });
        }
        if state.publish_failures > 0 {
            state.publish_failures -= 1;
            return Err(ChannelError::Publish {
                destination: destination.to_string(),
                error: "simulated publish failure".to_string(),
            });
        }
        Ok(())
    }
}

impl DeclareQueueClient for InMemoryBroker {
    async fn declare_queue(&self, name: &str, options: QueueOptions) -> Result<(), ChannelError> {
        self.state
            .lock()
            .unwrap()
            .queues
            .entry(name.to_string())
            .or_insert_with(|| Queue {
                options,
                backlog: VecDeque::new(),
                consumer: None,
            });
        Ok(())
    }
}

impl EnqueueClient for InMemoryBroker {
    async fn enqueue(
        &self,
        queue: &str,
        body: Bytes,
        properties: MessageProperties,
    ) -> Result<(), ChannelError> {
        let mut state = self.state.lock().unwrap();
        Self::take_publish_failure(&mut state, queue)?;

        let message = InboundMessage {
            content: body.clone(),
            properties: Some(properties.clone()),
        };
        self.push_locked(&mut state, queue, message, SystemTime::now())?;
        state.published.push(PublishedMessage {
            destination: queue.to_string(),
            body,
            properties,
        });
        Ok(())
    }
}

impl PublishClient for InMemoryBroker {
    async fn publish(
        &self,
        subject: &str,
        body: Bytes,
        properties: MessageProperties,
    ) -> Result<(), ChannelError> {
        let mut state = self.state.lock().unwrap();
        Self::take_publish_failure(&mut state, subject)?;

        let message = InboundMessage {
            content: body.clone(),
            properties: Some(properties.clone()),
        };
        if let Some(subscribers) = state.subscribers.get_mut(subject) {
            subscribers.retain(|tx| tx.unbounded_send(message.clone()).is_ok());
        }
        state.published.push(PublishedMessage {
            destination: subject.to_string(),
            body,
            properties,
        });
        Ok(())
    }
}

impl ConsumeClient for InMemoryBroker {
    type Acker = InMemoryAcker;

    async fn consume(
        &self,
        queue: &str,
    ) -> Result<BoxStream<'static, Delivery<InMemoryAcker>>, ChannelError> {
        let mut state = self.state.lock().unwrap();
        let backlog: Vec<Pending> = {
            let slot = state
                .queues
                .get_mut(queue)
                .ok_or_else(|| ChannelError::Consume {
                    queue: queue.to_string(),
                    error: "queue not declared".to_string(),
                })?;
            slot.backlog.drain(..).collect()
        };

        let (tx, rx) = mpsc::unbounded();
        for (message, published_at) in backlog {
            let _ = tx.unbounded_send(self.delivery(message, published_at));
        }
        if let Some(slot) = state.queues.get_mut(queue) {
            slot.consumer = Some(tx);
        }
        Ok(rx.boxed())
    }
}

impl SubscribeClient for InMemoryBroker {
    async fn subscribe(
        &self,
        subject: &str,
    ) -> Result<BoxStream<'static, InboundMessage>, ChannelError> {
        let (tx, rx) = mpsc::unbounded();
        self.state
            .lock()
            .unwrap()
            .subscribers
            .entry(subject.to_string())
            .or_default()
            .push(tx);
        Ok(rx.boxed())
    }
}

impl ConnectionStatus for InMemoryBroker {
    fn is_connected(&self) -> bool {
        !self.state.lock().unwrap().disconnected
    }
}
