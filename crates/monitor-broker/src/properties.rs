//! Message metadata carried as NATS headers.

use std::time::Duration;

use async_nats::HeaderMap;
use opentelemetry::propagation::Injector;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub const CORRELATION_ID: &str = "Correlation-Id";
pub const REPLY_TO: &str = "Reply-To";
/// Milliseconds, decimal.
pub const EXPIRATION: &str = "Expiration";
pub const CONTENT_TYPE: &str = "Content-Type";

/// Optional metadata attached to a message.
///
/// Every field is optional on the wire; what a given message must carry is
/// decided by the receiver (see [`RequestEnvelope`](crate::RequestEnvelope)).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageProperties {
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub expiration: Option<Duration>,
    pub content_type: Option<String>,
}

impl MessageProperties {
    pub fn correlated(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
            ..Self::default()
        }
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Empty header values read as absent.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .map(|value| value.as_str().trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            correlation_id: text(CORRELATION_ID),
            reply_to: text(REPLY_TO),
            expiration: text(EXPIRATION)
                .and_then(|ms| ms.parse::<u64>().ok())
                .map(Duration::from_millis),
            content_type: text(CONTENT_TYPE),
        }
    }

    /// Headers for an outbound message, including the current trace context.
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(id) = &self.correlation_id {
            headers.insert(CORRELATION_ID, id.as_str());
        }
        if let Some(reply_to) = &self.reply_to {
            headers.insert(REPLY_TO, reply_to.as_str());
        }
        if let Some(expiration) = self.expiration {
            headers.insert(EXPIRATION, expiration.as_millis().to_string().as_str());
        }
        if let Some(content_type) = &self.content_type {
            headers.insert(CONTENT_TYPE, content_type.as_str());
        }
        inject_trace_context(&mut headers);
        headers
    }
}

struct HeaderCarrier<'a>(&'a mut HeaderMap);

impl Injector for HeaderCarrier<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.0.insert(key, value.as_str());
    }
}

/// No-op unless a global text map propagator is installed.
pub fn inject_trace_context(headers: &mut HeaderMap) {
    let cx = Span::current().context();
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&cx, &mut HeaderCarrier(headers));
    });
}
