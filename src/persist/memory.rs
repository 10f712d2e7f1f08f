use hashbrown::HashMap;
use serde_json::Value;

use super::{KvStore, PersistResult};

/// Non-durable [`KvStore`] for tests and ephemeral sessions.
#[derive(Debug, Default, Clone)]
pub struct MemoryKvStore {
    values: HashMap<String, Value>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `key`.
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> PersistResult<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &Value) -> PersistResult<()> {
        self.values.insert(key.to_string(), value.clone());
        Ok(())
    }
}
