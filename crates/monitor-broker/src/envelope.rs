//! Validation of request messages at the consumer boundary.

use std::borrow::Cow;
use std::time::Duration;

use bytes::Bytes;

use crate::client::InboundMessage;

/// Why a request message cannot be processed. Never worth a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedMessage {
    MissingContent,
    MissingProperties,
    MissingCorrelationId,
    MissingReplyTo,
}

impl std::fmt::Display for MalformedMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let what = match self {
            Self::MissingContent => "content",
            Self::MissingProperties => "properties",
            Self::MissingCorrelationId => "correlation id",
            Self::MissingReplyTo => "reply destination",
        };
        write!(f, "Malformed message: missing {}", what)
    }
}

impl std::error::Error for MalformedMessage {}

/// A request that carries everything needed to answer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEnvelope {
    pub body: Bytes,
    pub correlation_id: String,
    pub reply_to: String,
    pub expiration: Option<Duration>,
}

impl RequestEnvelope {
    /// Checks content first, then properties, then the two required fields.
    pub fn validate(message: &InboundMessage) -> Result<Self, MalformedMessage> {
        if message.content.is_empty() {
            return Err(MalformedMessage::MissingContent);
        }
        let properties = message
            .properties
            .as_ref()
            .ok_or(MalformedMessage::MissingProperties)?;
        let correlation_id = properties
            .correlation_id
            .clone()
            .ok_or(MalformedMessage::MissingCorrelationId)?;
        let reply_to = properties
            .reply_to
            .clone()
            .ok_or(MalformedMessage::MissingReplyTo)?;

        Ok(Self {
            body: message.content.clone(),
            correlation_id,
            reply_to,
            expiration: properties.expiration,
        })
    }

    /// Body as UTF-8, invalid sequences replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Whether a message this old has outlived its expiration by more than
    /// `skew`, the allowed disagreement between broker and local clocks.
    pub fn is_expired(&self, age: Option<Duration>, skew: Duration) -> bool {
        match (self.expiration, age) {
            (Some(expiration), Some(age)) => age > expiration.saturating_add(skew),
            _ => false,
        }
    }
}
