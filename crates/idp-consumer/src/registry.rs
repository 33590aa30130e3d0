use std::collections::HashMap;

use serde::Deserialize;

/// IDP name → probe URL, fixed for the life of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct IdpRegistry(HashMap<String, String>);

impl IdpRegistry {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self(entries)
    }

    /// Exact, case-sensitive match.
    pub fn url_for(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for IdpRegistry {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, url)| (name.into(), url.into()))
                .collect(),
        )
    }
}
