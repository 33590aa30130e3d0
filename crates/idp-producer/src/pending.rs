//! Callers waiting for a reply, keyed by correlation id.
//!
//! Every caller registers before its request is published and unregisters
//! when its guard drops, whether it got a reply, timed out, or was cancelled.
//! A reply whose id is no longer registered finds nobody and is dropped.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::oneshot;

use crate::correlation_id::CorrelationId;

pub type ReplyReceiver = oneshot::Receiver<Bytes>;

/// Removes the registered waiter on drop.
pub struct ReplyWaiterGuard<'a> {
    pending: &'a PendingReplies,
    correlation_id: CorrelationId,
}

impl Drop for ReplyWaiterGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(self.correlation_id.as_str());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlreadyWaiting(pub CorrelationId);

impl std::fmt::Display for AlreadyWaiting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "A caller is already waiting on correlation id {}", self.0)
    }
}

impl std::error::Error for AlreadyWaiting {}

#[derive(Default)]
pub struct PendingReplies {
    waiters: Mutex<HashMap<CorrelationId, oneshot::Sender<Bytes>>>,
}

impl PendingReplies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        correlation_id: CorrelationId,
    ) -> Result<(ReplyReceiver, ReplyWaiterGuard<'_>), AlreadyWaiting> {
        let mut waiters = self.waiters.lock().unwrap();
        if waiters.contains_key(&correlation_id) {
            return Err(AlreadyWaiting(correlation_id));
        }
        let (tx, rx) = oneshot::channel();
        waiters.insert(correlation_id.clone(), tx);
        Ok((
            rx,
            ReplyWaiterGuard {
                pending: self,
                correlation_id,
            },
        ))
    }

    /// Hands `payload` to the caller waiting on `correlation_id`. Returns
    /// `false` when nobody is waiting any more.
    pub fn resolve(&self, correlation_id: &str, payload: Bytes) -> bool {
        let sender = self.waiters.lock().unwrap().remove(correlation_id);
        match sender {
            Some(sender) => sender.send(payload).is_ok(),
            None => false,
        }
    }

    pub fn remove(&self, correlation_id: &str) {
        self.waiters.lock().unwrap().remove(correlation_id);
    }

    pub fn len(&self) -> usize {
        self.waiters.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
