//! Turns one request delivery into at most one reply.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use monitor_broker::{
    Acknowledge, ChannelError, Delivery, MalformedMessage, MessageProperties, PublishClient,
    RequestEnvelope,
};
use serde::{Deserialize, Serialize};
use tracing::{Span, debug, error, info, instrument, warn};

use crate::probe::Probe;
use crate::registry::IdpRegistry;

pub const NOT_FOUND: u16 = 404;
pub const PROBE_FAILED: u16 = 500;

/// How far the local clock may run ahead of the broker's before a fresh
/// request looks expired.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(2);

const JSON: &str = "application/json";

/// Body of every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: u16,
}

/// What became of a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Reply published, request acknowledged.
    Replied { status: u16 },
    /// Rejected before any side effect.
    Malformed(MalformedMessage),
    /// Rejected: its producer stopped waiting before we got to it.
    Expired,
    /// The reply could not be published; request rejected.
    ReplyFailed(ChannelError),
}

pub struct RequestHandler<C, P> {
    channel: C,
    registry: Arc<IdpRegistry>,
    probe: P,
    /// Expiration put on replies.
    reply_expiration: Duration,
    clock_skew: Duration,
}

impl<C: PublishClient, P: Probe> RequestHandler<C, P> {
    pub fn new(channel: C, registry: Arc<IdpRegistry>, probe: P, reply_expiration: Duration) -> Self {
        Self {
            channel,
            registry,
            probe,
            reply_expiration,
            clock_skew: DEFAULT_CLOCK_SKEW,
        }
    }

    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    #[instrument(
        name = "idp.request",
        skip_all,
        fields(correlation_id = tracing::field::Empty, idp = tracing::field::Empty)
    )]
    pub async fn handle<A: Acknowledge>(&self, delivery: Delivery<A>) -> Outcome {
        let envelope = match RequestEnvelope::validate(&delivery.message) {
            Ok(envelope) => envelope,
            Err(malformed) => {
                warn!(error = %malformed, "Rejecting request");
                settle("reject", delivery.reject(false).await);
                return Outcome::Malformed(malformed);
            }
        };

        let idp = envelope.text().into_owned();
        let span = Span::current();
        span.record("correlation_id", envelope.correlation_id.as_str());
        span.record("idp", idp.as_str());

        let age = delivery.age();
        if envelope.is_expired(age, self.clock_skew) {
            warn!(
                age_ms = age.map(|a| a.as_millis() as u64),
                expiration_ms = envelope.expiration.map(|e| e.as_millis() as u64),
                clock_skew_ms = self.clock_skew.as_millis() as u64,
                "Rejecting expired request"
            );
            settle("reject", delivery.reject(false).await);
            return Outcome::Expired;
        }

        let status = self.resolve_status(&idp).await;
        let body = match serde_json::to_vec(&StatusReply { status }) {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                error!(error = %e, "Failed to encode reply");
                settle("reject", delivery.reject(false).await);
                return Outcome::ReplyFailed(ChannelError::Publish {
                    destination: envelope.reply_to,
                    error: e.to_string(),
                });
            }
        };
        let properties = MessageProperties::correlated(envelope.correlation_id.as_str())
            .with_content_type(JSON)
            .with_expiration(self.reply_expiration);

        match self.channel.publish(&envelope.reply_to, body, properties).await {
            Ok(()) => {
                debug!(status, reply_to = %envelope.reply_to, "Reply published");
                settle("ack", delivery.ack().await);
                Outcome::Replied { status }
            }
            Err(e) => {
                error!(error = %e, "Failed to publish reply, rejecting request");
                settle("reject", delivery.reject(false).await);
                Outcome::ReplyFailed(e)
            }
        }
    }

    /// 404 without probing for unknown names; 500 when the probe fails.
    async fn resolve_status(&self, idp: &str) -> u16 {
        let Some(url) = self.registry.url_for(idp) else {
            info!("Unknown IDP");
            return NOT_FOUND;
        };
        match self.probe.probe(url).await {
            Ok(status) => {
                info!(url, status, "IDP probed");
                status
            }
            Err(e) => {
                warn!(error = %e, "IDP probe failed");
                PROBE_FAILED
            }
        }
    }
}

fn settle(action: &'static str, result: Result<(), ChannelError>) {
    if let Err(e) = result {
        error!(action, error = %e, "Failed to settle request");
    }
}

/// Handles deliveries until the stream ends or `shutdown` resolves, at most
/// `max_in_flight` at a time. Deliveries already started are finished.
pub async fn run<C, P, A, S, F>(
    handler: Arc<RequestHandler<C, P>>,
    deliveries: S,
    max_in_flight: usize,
    shutdown: F,
) where
    C: PublishClient,
    P: Probe,
    A: Acknowledge,
    S: Stream<Item = Delivery<A>>,
    F: Future<Output = ()>,
{
    info!(max_in_flight, "Handling requests");
    deliveries
        .take_until(shutdown)
        .for_each_concurrent(max_in_flight, |delivery| {
            let handler = Arc::clone(&handler);
            async move {
                handler.handle(delivery).await;
            }
        })
        .await;
    info!("Stopped handling requests");
}
