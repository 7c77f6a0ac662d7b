//! Key-value storage used by the bookmark service.
//!
//! Keys and values are plain strings. The service never needs enumeration,
//! so the trait only covers point reads and writes. `put_all` and `put_if`
//! are the atomic forms the service relies on to keep the per-field keys of a
//! bookmark set consistent.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if it was never written.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Inserts or replaces the value under `key`.
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Inserts or replaces every entry in one atomic step.
    async fn put_all(&self, entries: &[(&str, &str)]) -> Result<()>;

    /// Writes `entries` only if `guard_key` currently holds `expected`.
    ///
    /// Returns `false`, with nothing written, when the guard does not match
    /// (including when `guard_key` is absent).
    async fn put_if(&self, guard_key: &str, expected: &str, entries: &[(&str, &str)]) -> Result<bool>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn put_all(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut map = self.entries.lock().await;
        for (k, v) in entries {
            map.insert(k.to_string(), v.to_string());
        }
        Ok(())
    }

    async fn put_if(&self, guard_key: &str, expected: &str, entries: &[(&str, &str)]) -> Result<bool> {
        let mut map = self.entries.lock().await;
        if map.get(guard_key).map(String::as_str) != Some(expected) {
            return Ok(false);
        }
        for (k, v) in entries {
            map.insert(k.to_string(), v.to_string());
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn entry_count(store: &MemoryStore) -> usize {
        store.entries.lock().await.len()
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_replaces_value() {
        let store = MemoryStore::new();
        store.put("a", "1").await.unwrap();
        store.put("a", "2").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("2"));
        assert_eq!(entry_count(&store).await, 1);
    }

    #[tokio::test]
    async fn test_put_if_guard_mismatch_writes_nothing() {
        let store = MemoryStore::new();
        store.put("guard", "old").await.unwrap();

        let written = store
            .put_if("guard", "stale", &[("guard", "new"), ("payload", "x")])
            .await
            .unwrap();

        assert!(!written);
        assert_eq!(store.get("guard").await.unwrap().as_deref(), Some("old"));
        assert_eq!(store.get("payload").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_if_absent_guard_fails() {
        let store = MemoryStore::new();
        let written = store.put_if("guard", "", &[("guard", "new")]).await.unwrap();
        assert!(!written);
        assert_eq!(entry_count(&store).await, 0);
    }

    #[tokio::test]
    async fn test_put_if_guard_match_writes_all() {
        let store = MemoryStore::new();
        store.put("guard", "old").await.unwrap();

        let written = store
            .put_if("guard", "old", &[("guard", "new"), ("payload", "x")])
            .await
            .unwrap();

        assert!(written);
        assert_eq!(store.get("guard").await.unwrap().as_deref(), Some("new"));
        assert_eq!(store.get("payload").await.unwrap().as_deref(), Some("x"));
    }
}
