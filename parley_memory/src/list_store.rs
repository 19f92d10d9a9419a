//! In-process [`ListStore`].

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use parley_core::ListStore;
use parley_core::store::resolve_range;

#[derive(Debug, Default)]
struct Entry {
    items: VecDeque<String>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn trim(&mut self, start: isize, stop: isize) {
        match resolve_range(self.items.len(), start, stop) {
            Some((first, last)) => {
                self.items.truncate(last + 1);
                self.items.drain(..first);
            }
            None => self.items.clear(),
        }
    }
}

/// Lists held in a sharded map. Expired keys are dropped lazily on access.
///
/// Each operation runs under the shard lock of its key, so
/// [`ListStore::push_capped`] is atomic per key here.
#[derive(Debug, Default)]
pub struct InMemoryListStore {
    lists: DashMap<String, Entry>,
}

impl InMemoryListStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn purge_expired(&self, key: &str) {
        let now = Instant::now();
        self.lists.remove_if(key, |_, entry| entry.is_expired(now));
    }

    /// Remove the key if it was trimmed empty; an empty list does not exist.
    fn drop_if_empty(&self, key: &str) {
        self.lists.remove_if(key, |_, entry| entry.items.is_empty());
    }
}

#[async_trait]
impl ListStore for InMemoryListStore {
    async fn rpush(&self, key: &str, value: &str) -> anyhow::Result<usize> {
        self.purge_expired(key);
        let mut entry = self.lists.entry(key.to_string()).or_default();
        entry.items.push_back(value.to_string());
        Ok(entry.items.len())
    }

    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> anyhow::Result<()> {
        self.purge_expired(key);
        if let Some(mut entry) = self.lists.get_mut(key) {
            entry.trim(start, stop);
        }
        self.drop_if_empty(key);
        Ok(())
    }

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> anyhow::Result<Vec<String>> {
        self.purge_expired(key);
        let Some(entry) = self.lists.get(key) else {
            return Ok(Vec::new());
        };
        Ok(resolve_range(entry.items.len(), start, stop)
            .map(|(first, last)| entry.items.range(first..=last).cloned().collect())
            .unwrap_or_default())
    }

    async fn llen(&self, key: &str) -> anyhow::Result<usize> {
        self.purge_expired(key);
        Ok(self.lists.get(key).map_or(0, |entry| entry.items.len()))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> anyhow::Result<bool> {
        self.purge_expired(key);
        Ok(self.lists.get_mut(key).is_some_and(|mut entry| {
            entry.expires_at = Some(Instant::now() + ttl);
            true
        }))
    }

    async fn del(&self, key: &str) -> anyhow::Result<bool> {
        let now = Instant::now();
        Ok(self
            .lists
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired(now)))
    }

    async fn push_capped(
        &self,
        key: &str,
        value: &str,
        cap: usize,
        ttl: Option<Duration>,
    ) -> anyhow::Result<()> {
        self.purge_expired(key);
        let mut entry = self.lists.entry(key.to_string()).or_default();
        entry.items.push_back(value.to_string());
        while entry.items.len() > cap {
            entry.items.pop_front();
        }
        if let Some(ttl) = ttl {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ltrim_keeps_tail() {
        let store = InMemoryListStore::new();
        for i in 0..5 {
            store.rpush("k", &i.to_string()).await.unwrap();
        }
        store.ltrim("k", -2, -1).await.unwrap();
        assert_eq!(store.lrange("k", 0, -1).await.unwrap(), vec!["3", "4"]);
    }

    #[tokio::test]
    async fn test_trim_to_nothing_removes_key() {
        let store = InMemoryListStore::new();
        store.rpush("k", "a").await.unwrap();
        store.ltrim("k", 5, 10).await.unwrap();
        assert_eq!(store.llen("k").await.unwrap(), 0);
        assert!(!store.del("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_requires_existing_key() {
        let store = InMemoryListStore::new();
        assert!(!store.expire("missing", Duration::from_secs(1)).await.unwrap());
        store.rpush("k", "a").await.unwrap();
        assert!(store.expire("k", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_key_reads_as_absent() {
        let store = InMemoryListStore::new();
        store
            .push_capped("k", "a", 3, Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(store.llen("k").await.unwrap(), 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.lrange("k", 0, -1).await.unwrap().is_empty());

        store.rpush("k", "b").await.unwrap();
        assert_eq!(store.lrange("k", 0, -1).await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_push_capped_never_exceeds_cap() {
        let store = InMemoryListStore::new();
        for i in 0..7 {
            store.push_capped("k", &i.to_string(), 3, None).await.unwrap();
            assert!(store.llen("k").await.unwrap() <= 3);
        }
        assert_eq!(store.lrange("k", 0, -1).await.unwrap(), vec!["4", "5", "6"]);
    }
}
