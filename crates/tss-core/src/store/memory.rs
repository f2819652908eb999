//! In-memory share store
//!
//! Backs tests and development runs of the service when no external store is
//! configured. Secrets live for the lifetime of the process.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{Result, ShareStore, StoreError};

/// In-memory [`ShareStore`] on a concurrent map
#[derive(Default)]
pub struct MemoryShareStore {
    secrets: DashMap<String, String>,
}

impl MemoryShareStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: replace a stored value in place, bypassing the
    /// create-if-absent rule the trait enforces.
    #[cfg(test)]
    pub(crate) fn overwrite(&self, name: &str, value: &str) {
        self.secrets.insert(name.to_string(), value.to_string());
    }
}

#[async_trait]
impl ShareStore for MemoryShareStore {
    async fn put(&self, name: &str, value: &str) -> Result<()> {
        match self.secrets.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StoreError::AlreadyExists(name.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(value.to_string());
                Ok(())
            }
        }
    }

    async fn get(&self, name: &str) -> Result<String> {
        self.secrets
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryShareStore::new();
        store.put("a/b", "value").await.unwrap();
        assert_eq!(store.get("a/b").await.unwrap(), "value");
    }

    #[tokio::test]
    async fn put_is_create_if_absent() {
        let store = MemoryShareStore::new();
        store.put("a/b", "first").await.unwrap();

        let err = store.put("a/b", "second").await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(store.get("a/b").await.unwrap(), "first");
    }

    #[tokio::test]
    async fn missing_secret_is_not_found() {
        let store = MemoryShareStore::new();
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
