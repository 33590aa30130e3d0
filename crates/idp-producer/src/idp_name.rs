use std::fmt;

/// Name of an identity provider as requested over HTTP. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdpName(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyIdpName;

impl fmt::Display for EmptyIdpName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IDP name must not be empty")
    }
}

impl std::error::Error for EmptyIdpName {}

impl IdpName {
    /// Taken verbatim; only emptiness is rejected.
    pub fn new(name: impl Into<String>) -> Result<Self, EmptyIdpName> {
        let name = name.into();
        if name.is_empty() {
            return Err(EmptyIdpName);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdpName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
