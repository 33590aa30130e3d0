use std::borrow::Borrow;
use std::fmt;

use uuid::Uuid;

/// Ties one request message to its reply. Random 128-bit, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Lets the pending table be queried with the `&str` read off a reply.
impl Borrow<str> for CorrelationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
