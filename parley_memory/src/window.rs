use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parley_core::ListStore;
use tracing::{debug, info};

use crate::MemoryError;

pub const DEFAULT_WINDOW_LENGTH: usize = 10;

/// Capped, ordered memory per `(agent, conversation)` key.
///
/// Entries are kept oldest first. After every append the list is trimmed to
/// the most recent `window_length` entries and its TTL refreshed.
pub struct MemoryWindowStore {
    store: Arc<dyn ListStore>,
    window_length: AtomicUsize,
    ttl: Option<Duration>,
}

impl MemoryWindowStore {
    #[must_use]
    pub fn new(store: Arc<dyn ListStore>) -> Self {
        Self {
            store,
            window_length: AtomicUsize::new(DEFAULT_WINDOW_LENGTH),
            ttl: None,
        }
    }

    pub fn with_window_length(self, window_length: usize) -> Result<Self, MemoryError> {
        self.set_window_length(window_length)?;
        Ok(self)
    }

    /// A zero TTL disables expiry.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }

    #[must_use]
    pub fn key_for_session(agent_id: i64, session_id: &str) -> String {
        format!("agent:{agent_id}:session:{session_id}")
    }

    #[must_use]
    pub fn key_for_room(agent_id: i64, room_id: &str) -> String {
        format!("room:{room_id}:agent:{agent_id}")
    }

    pub fn window_length(&self) -> usize {
        self.window_length.load(Ordering::Relaxed)
    }

    /// Takes effect on the next append; existing longer windows are trimmed
    /// then and clipped on read until that happens.
    pub fn set_window_length(&self, window_length: usize) -> Result<(), MemoryError> {
        if window_length == 0 {
            return Err(MemoryError::InvalidWindowLength(window_length));
        }
        self.window_length.store(window_length, Ordering::Relaxed);
        info!("Memory window length set to {}", window_length);
        Ok(())
    }

    pub async fn append(&self, key: &str, entry: &str) -> Result<(), MemoryError> {
        let cap = self.window_length();
        self.store.push_capped(key, entry, cap, self.ttl).await?;
        debug!("Appended to memory window {}", key);
        Ok(())
    }

    /// Oldest first, at most `window_length` entries.
    pub async fn window(&self, key: &str) -> Result<Vec<String>, MemoryError> {
        let cap = isize::try_from(self.window_length()).unwrap_or(isize::MAX);
        Ok(self.store.lrange(key, -cap, -1).await?)
    }

    pub async fn clear(&self, key: &str) -> Result<(), MemoryError> {
        self.store.del(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryListStore;

    fn windows(length: usize) -> MemoryWindowStore {
        MemoryWindowStore::new(Arc::new(InMemoryListStore::new()))
            .with_window_length(length)
            .unwrap()
    }

    #[test]
    fn test_key_formats() {
        assert_eq!(
            MemoryWindowStore::key_for_session(3, "s-1-3"),
            "agent:3:session:s-1-3"
        );
        assert_eq!(MemoryWindowStore::key_for_room(3, "PUBLIC"), "room:PUBLIC:agent:3");
    }

    #[tokio::test]
    async fn test_overflow_keeps_last_entries_in_order() {
        let store = windows(4);
        for i in 0..7 {
            store.append("k", &format!("e{i}")).await.unwrap();
            assert!(store.window("k").await.unwrap().len() <= 4);
        }
        assert_eq!(store.window("k").await.unwrap(), vec!["e3", "e4", "e5", "e6"]);
    }

    #[tokio::test]
    async fn test_absent_window_is_empty() {
        let store = windows(4);
        assert!(store.window("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_length_rejected() {
        let store = windows(4);
        assert!(matches!(
            store.set_window_length(0),
            Err(MemoryError::InvalidWindowLength(0))
        ));
        assert_eq!(store.window_length(), 4);
    }

    #[tokio::test]
    async fn test_shrinking_clips_reads() {
        let store = windows(5);
        for i in 0..5 {
            store.append("k", &format!("e{i}")).await.unwrap();
        }
        store.set_window_length(2).unwrap();
        assert_eq!(store.window("k").await.unwrap(), vec!["e3", "e4"]);
    }

    #[tokio::test]
    async fn test_clear_removes_window() {
        let store = windows(3);
        store.append("k", "e0").await.unwrap();
        store.clear("k").await.unwrap();
        assert!(store.window("k").await.unwrap().is_empty());
    }
}
