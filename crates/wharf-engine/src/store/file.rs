use super::{Document, Store, StoreError, Updater};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// JSON document on disk with all-or-nothing writes.
///
/// Every call holds the lock for its whole read-modify-write cycle. Writes go to
/// a sibling temp file which is fsynced and then renamed over the original, so a
/// crash mid-write leaves the previous document intact.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when no state has ever been written at this location.
    pub fn is_fresh(&self) -> bool {
        !self.path.exists()
    }

    async fn load(&self) -> Result<Document, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Document::new());
        }

        match serde_json::from_str::<Value>(&content)? {
            Value::Object(doc) => Ok(doc),
            other => Err(StoreError::Corrupt {
                key: self.path.display().to_string(),
                detail: format!("expected a JSON object, found {}", kind_of(&other)),
            }),
        }
    }

    async fn save(&self, doc: &Document) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(doc)?;
        let tmp_path = self.temp_path();

        let mut tmp = tokio::fs::File::create(&tmp_path).await?;
        tmp.write_all(&json).await?;
        tmp.sync_all().await?;
        drop(tmp);

        tokio::fs::rename(&tmp_path, &self.path).await?;
        debug!("Committed {} bytes to {}", json.len(), self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get(&self, keys: &[&str]) -> Result<Document, StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        Ok(keys
            .iter()
            .filter_map(|key| doc.remove(*key).map(|v| (key.to_string(), v)))
            .collect())
    }

    async fn set(&self, entries: Document) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        doc.extend(entries);
        self.save(&doc).await
    }

    async fn update(&self, key: &str, updater: Updater) -> Result<Value, StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let next = updater(doc.remove(key))?;
        doc.insert(key.to_string(), next.clone());
        self.save(&doc).await?;
        Ok(next)
    }
}
