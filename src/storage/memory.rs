//! In-memory identity store for dry runs and tests.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::ListingKey;
use crate::storage::IdentityStore;

/// Identity store that never touches disk.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    keys: HashSet<ListingKey>,
    flushes: usize,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with already-notified keys.
    pub fn with_keys(keys: impl IntoIterator<Item = ListingKey>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
            flushes: 0,
        }
    }

    /// Number of flushes performed.
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    fn contains(&self, key: &ListingKey) -> bool {
        self.keys.contains(key)
    }

    fn commit(&mut self, key: ListingKey) {
        self.keys.insert(key);
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        self.flushes += 1;
        Ok(())
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store() {
        let mut store = MemoryIdentityStore::with_keys([ListingKey::new("wbm", "u1")]);
        assert!(store.contains(&ListingKey::new("wbm", "u1")));

        store.commit(ListingKey::new("wbm", "u2"));
        store.commit(ListingKey::new("wbm", "u2"));
        assert_eq!(store.len(), 2);

        store.flush().await.unwrap();
        assert_eq!(store.flushes(), 1);
    }
}
