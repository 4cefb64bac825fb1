use async_trait::async_trait;

use crate::error::StoreError;

pub mod json_file;
pub mod keys;
pub mod memory;

pub use json_file::JsonFileKeyValueStore;
pub use memory::MemoryKeyValueStore;

/// Process-wide string key-value storage. Every call may fail; callers decide
/// whether a failure is surfaced or degraded to "no data".
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
    async fn list_keys(&self) -> Result<Vec<String>, StoreError>;
    async fn remove_many(&self, keys: &[String]) -> Result<(), StoreError>;
}

/// Keys starting with `prefix`, sorted so scans are deterministic.
pub async fn keys_with_prefix(
    store: &dyn KeyValueStore,
    prefix: &str,
) -> Result<Vec<String>, StoreError> {
    let mut keys: Vec<String> = store
        .list_keys()
        .await?
        .into_iter()
        .filter(|key| key.starts_with(prefix))
        .collect();
    keys.sort();
    Ok(keys)
}
