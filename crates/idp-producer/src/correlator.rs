//! One request/reply exchange per IDP check.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use bytes::Bytes;
use monitor_broker::{EnqueueClient, MessageProperties, QueueNames};
use serde_json::Value;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, instrument, warn};

use crate::correlation_id::CorrelationId;
use crate::idp_name::IdpName;
use crate::pending::PendingReplies;

pub struct Correlator<C> {
    channel: C,
    pending: Arc<PendingReplies>,
    queues: QueueNames,
    timeout: Duration,
}

impl<C: EnqueueClient> Correlator<C> {
    pub fn new(
        channel: C,
        pending: Arc<PendingReplies>,
        queues: QueueNames,
        timeout: Duration,
    ) -> Self {
        Self {
            channel,
            pending,
            queues,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Asks a consumer to probe `idp` and returns the status it reports.
    ///
    /// The wait starts before the request is published. 503 when nothing
    /// comes back within the timeout or the request cannot be published,
    /// 500 when the reply is unreadable.
    #[instrument(name = "idp.check", skip_all, fields(idp = %idp))]
    pub async fn check_idp(&self, idp: &IdpName) -> StatusCode {
        let deadline = Instant::now() + self.timeout;
        let correlation_id = CorrelationId::new();

        let (reply, _registration) = match self.pending.register(correlation_id.clone()) {
            Ok(registration) => registration,
            Err(e) => {
                error!(error = %e, "Could not register reply waiter");
                return StatusCode::INTERNAL_SERVER_ERROR;
            }
        };

        let properties = MessageProperties::correlated(correlation_id.as_str())
            .with_reply_to(self.queues.replies.as_str())
            .with_expiration(self.timeout);
        let body = Bytes::from(idp.as_str().to_owned());

        match timeout_at(
            deadline,
            self.channel.enqueue(&self.queues.requests, body, properties),
        )
        .await
        {
            Ok(Ok(())) => {
                debug!(correlation_id = %correlation_id, queue = %self.queues.requests, "Request published");
            }
            Ok(Err(e)) => {
                warn!(correlation_id = %correlation_id, error = %e, "Failed to publish request");
                return StatusCode::SERVICE_UNAVAILABLE;
            }
            Err(_) => {
                warn!(correlation_id = %correlation_id, "Timed out publishing request");
                return StatusCode::SERVICE_UNAVAILABLE;
            }
        }

        match timeout_at(deadline, reply).await {
            Ok(Ok(payload)) => {
                let status = reply_status(&payload);
                debug!(correlation_id = %correlation_id, status = status.as_u16(), "Reply received");
                status
            }
            Ok(Err(_)) => {
                warn!(correlation_id = %correlation_id, "Reply waiter closed without a reply");
                StatusCode::SERVICE_UNAVAILABLE
            }
            Err(_) => {
                debug!(correlation_id = %correlation_id, "Timed out waiting for reply");
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

/// Statuses a reply may relay.
const RELAYABLE: std::ops::RangeInclusive<u16> = 200..=599;

/// Reads `{"status": N}` with N in 200..=599. Anything else is a 500.
pub fn reply_status(payload: &[u8]) -> StatusCode {
    let Ok(reply) = serde_json::from_slice::<Value>(payload) else {
        warn!("Reply is not valid JSON");
        return StatusCode::INTERNAL_SERVER_ERROR;
    };
    reply
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|status| u16::try_from(status).ok())
        .filter(|status| RELAYABLE.contains(status))
        .and_then(|status| StatusCode::from_u16(status).ok())
        .unwrap_or_else(|| {
            warn!(reply = %reply, "Reply carries no usable status");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
