//! Routes replies from the reply queue to the callers waiting on them.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use monitor_broker::InboundMessage;
use tracing::{debug, warn};

use crate::pending::PendingReplies;

/// Runs until the reply stream ends.
pub async fn run<S>(replies: S, pending: Arc<PendingReplies>)
where
    S: Stream<Item = InboundMessage> + Unpin,
{
    let mut replies = replies;
    while let Some(reply) = replies.next().await {
        let Some(correlation_id) = reply.correlation_id() else {
            warn!("Dropping reply without correlation id");
            continue;
        };
        if pending.resolve(correlation_id, reply.content.clone()) {
            debug!(correlation_id, "Reply delivered");
        } else {
            debug!(correlation_id, "No caller waiting for reply, dropped");
        }
    }
    warn!("Reply stream ended");
}
