use super::{Document, Store, StoreError, Updater};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

/// Volatile store. Used by tests and by hosts that persist elsewhere.
#[derive(Default)]
pub struct MemoryStore {
    doc: Mutex<Document>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(doc: Document) -> Self {
        Self {
            doc: Mutex::new(doc),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Document, StoreError> {
        let doc = self.doc.lock().await;
        Ok(keys
            .iter()
            .filter_map(|key| doc.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: Document) -> Result<(), StoreError> {
        let mut doc = self.doc.lock().await;
        doc.extend(entries);
        Ok(())
    }

    async fn update(&self, key: &str, updater: Updater) -> Result<Value, StoreError> {
        let mut doc = self.doc.lock().await;
        let next = updater(doc.get(key).cloned())?;
        doc.insert(key.to_string(), next.clone());
        Ok(next)
    }
}
