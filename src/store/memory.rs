//! In-process store backed by Moka
//!
//! Entries carry their own expiry, so `set` and `set_ex` can be mixed on one
//! store the way they are on a Redis server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use globset::GlobBuilder;
use moka::Expiry;
use moka::future::Cache;

use super::Store;
use crate::error::StoreError;

#[derive(Debug, Clone)]
struct Entry {
    bytes: Arc<[u8]>,
    ttl: Option<Duration>,
}

/// Expires each entry after its own TTL; overwriting resets it.
struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// In-memory store. Clones share the same entries.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Cache<String, Entry>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().expire_after(EntryExpiry).build(),
        }
    }

    /// The expiry the entry was written with, `None` if it persists
    /// indefinitely or does not exist.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        self.entries.get(key).await.and_then(|entry| entry.ttl)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).await.map(|entry| entry.bytes.to_vec()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let entry = Entry {
            bytes: value.into(),
            ttl: None,
        };
        self.entries.insert(key.to_owned(), entry).await;
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, seconds: u64) -> Result<(), StoreError> {
        let entry = Entry {
            bytes: value.into(),
            ttl: Some(Duration::from_secs(seconds)),
        };
        self.entries.insert(key.to_owned(), entry).await;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.remove(key).await.is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.contains_key(key))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(false)
            .backslash_escape(true)
            .build()
            .map_err(|e| StoreError::Other(Box::new(e)))?
            .compile_matcher();

        Ok(self
            .entries
            .iter()
            .filter(|(key, _)| matcher.is_match(key.as_str()))
            .map(|(key, _)| key.as_str().to_owned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_del() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.set("k", b"v".to_vec()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(b"v".to_vec()));
        assert!(store.exists("k").await.unwrap());

        assert!(store.del("k").await.unwrap());
        assert!(!store.del("k").await.unwrap());
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_tracks_last_write() {
        let store = MemoryStore::new();
        store.set_ex("k", b"v".to_vec(), 60).await.unwrap();
        assert_eq!(store.ttl("k").await, Some(Duration::from_secs(60)));

        store.set("k", b"v2".to_vec()).await.unwrap();
        assert_eq!(store.ttl("k").await, None);
        assert_eq!(store.get("k").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_expired_entries_are_gone() {
        let store = MemoryStore::new();
        store.set_ex("k", b"v".to_vec(), 0).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_filters_by_pattern() {
        let store = MemoryStore::new();
        store.set("balance_aaaaaa", b"1".to_vec()).await.unwrap();
        store.set("balance_bbbbbb", b"2".to_vec()).await.unwrap();
        store.set("ledger_cccccc", b"3".to_vec()).await.unwrap();

        let mut keys = store.keys("balance_*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["balance_aaaaaa", "balance_bbbbbb"]);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_keys_glob_syntax() {
        let store = MemoryStore::new();
        for key in ["hello", "hallo", "hillo", "hbllo", "a*b", "axb", "Ledger_c0ffee"] {
            store.set(key, b"1".to_vec()).await.unwrap();
        }

        let matching = |pattern: &'static str| {
            let store = store.clone();
            async move {
                let mut keys = store.keys(pattern).await.unwrap();
                keys.sort();
                keys
            }
        };

        assert_eq!(matching("*").await.len(), 7);
        assert_eq!(matching("h?llo").await, vec!["hallo", "hbllo", "hello", "hillo"]);
        assert_eq!(matching("h[ae]llo").await, vec!["hallo", "hello"]);
        assert_eq!(matching("h[!e]llo").await, vec!["hallo", "hbllo", "hillo"]);
        assert_eq!(matching("h[a-c]llo").await, vec!["hallo", "hbllo"]);
        assert_eq!(matching("*_c0ffee").await, vec!["Ledger_c0ffee"]);
        assert_eq!(matching("a\\*b").await, vec!["a*b"]);
        assert!(matching("nothing*").await.is_empty());
    }

    #[tokio::test]
    async fn test_keys_rejects_malformed_pattern() {
        let store = MemoryStore::new();
        store.set("k", b"v".to_vec()).await.unwrap();
        assert!(matches!(
            store.keys("h[llo").await,
            Err(StoreError::Other(_))
        ));
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.set("k", b"v".to_vec()).await.unwrap();
        assert!(other.exists("k").await.unwrap());
    }
}
