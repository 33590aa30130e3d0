#![cfg(any(test, feature = "test-support"))]

use std::collections::HashMap;
use std::env::VarError;
use std::sync::Mutex;

use super::ReadEnv;

/// Won't touch the global process environment.
///
/// Backed by a `Mutex` so a config built from it can be handed to spawned
/// tasks in multi-threaded tests.
#[derive(Default)]
pub struct InMemoryEnv {
    vars: Mutex<HashMap<String, String>>,
}

impl InMemoryEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.lock().unwrap().insert(key.into(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.vars.lock().unwrap().remove(key);
    }
}

impl ReadEnv for InMemoryEnv {
    fn var(&self, key: &str) -> Result<String, VarError> {
        self.vars
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or(VarError::NotPresent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrite_and_remove() {
        let env = InMemoryEnv::new();
        env.set("QUEUE_PRODUCER_NAME", "a");
        env.set("QUEUE_PRODUCER_NAME", "b");
        assert_eq!(env.var("QUEUE_PRODUCER_NAME").unwrap(), "b");

        env.remove("QUEUE_PRODUCER_NAME");
        assert!(matches!(
            env.var("QUEUE_PRODUCER_NAME"),
            Err(VarError::NotPresent)
        ));
    }
}
