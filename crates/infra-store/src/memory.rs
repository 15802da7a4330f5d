use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use vendorwatch_domain::KeyValueStore;
use vendorwatch_error::WatchError;

/// Process-local store, used when no data directory is wanted.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, WatchError> {
        let values = self
            .values
            .lock()
            .map_err(|_| WatchError::storage("memory store poisoned"))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), WatchError> {
        self.values
            .lock()
            .map_err(|_| WatchError::storage("memory store poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn last_write_wins() {
        let store = MemoryStore::new();
        store.set("lastSummary", "first").await.unwrap();
        store.set("lastSummary", "second").await.unwrap();
        assert_eq!(store.get("lastSummary").await.unwrap().as_deref(), Some("second"));
        assert_eq!(store.get("vendorEmail").await.unwrap(), None);
    }
}
