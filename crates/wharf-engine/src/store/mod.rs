//! Durable key-value state shared by every request.
//!
//! All cross-request state (configuration and capture history) lives behind the
//! [`Store`] trait. Each call commits as a single unit, so concurrent
//! read-modify-write operations never interleave.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::{Map, Value};
pub use wharf_common::error::StoreError;

/// Flat key → JSON value document.
pub type Document = Map<String, Value>;

/// Read-modify-write step for [`Store::update`]. Receives the current value (if any)
/// and returns the value to commit.
pub type Updater = Box<dyn FnOnce(Option<Value>) -> Result<Value, StoreError> + Send>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Read the given keys. Keys with no stored value are absent from the result.
    async fn get(&self, keys: &[&str]) -> Result<Document, StoreError>;

    /// Merge `entries` into the stored document, leaving other keys untouched.
    async fn set(&self, entries: Document) -> Result<(), StoreError>;

    /// Atomically replace the value under `key` with the updater's result.
    ///
    /// Returns the committed value. If the updater fails nothing is written.
    async fn update(&self, key: &str, updater: Updater) -> Result<Value, StoreError>;
}
