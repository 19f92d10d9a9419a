//! Persistence collaborators.

use std::time::Duration;

use async_trait::async_trait;

use crate::{Agent, ChatRecord, MessageRecord, NewChatRecord, NewMessage, Page, Role, TimeRange};

/// Relational store for agents, roles and message records.
///
/// History queries named `recent_*` return newest first; paged history
/// returns oldest first.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(&self, message: &NewMessage) -> anyhow::Result<i64>;

    async fn agent_by_id(&self, id: i64) -> anyhow::Result<Option<Agent>>;

    async fn role_by_id(&self, id: i64) -> anyhow::Result<Option<Role>>;

    async fn insert_chat(&self, record: &NewChatRecord) -> anyhow::Result<i64>;

    async fn recent_in_room(&self, room_id: &str, limit: u64)
    -> anyhow::Result<Vec<MessageRecord>>;

    async fn recent_in_session(
        &self,
        session_id: &str,
        limit: u64,
    ) -> anyhow::Result<Vec<MessageRecord>>;

    /// IN records addressed to `agent_id`.
    async fn recent_inbound_private(
        &self,
        agent_id: i64,
        limit: u64,
    ) -> anyhow::Result<Vec<MessageRecord>>;

    async fn recent_in_room_by_round(
        &self,
        room_id: &str,
        round_id: i64,
        limit: u64,
    ) -> anyhow::Result<Vec<MessageRecord>>;

    /// Group chat frames of one room.
    async fn group_history(
        &self,
        room_id: &str,
        range: TimeRange,
        page: Page,
    ) -> anyhow::Result<Vec<ChatRecord>>;

    /// Private chat frames exchanged between two users, both directions.
    async fn private_history(
        &self,
        user_a: &str,
        user_b: &str,
        range: TimeRange,
        page: Page,
    ) -> anyhow::Result<Vec<ChatRecord>>;
}

/// Ordered-list key-value store with Redis list semantics.
///
/// Indices may be negative, counting from the end (`-1` is the last element).
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Append to the tail, returning the new length.
    async fn rpush(&self, key: &str, value: &str) -> anyhow::Result<usize>;

    /// Keep only the inclusive range `start..=stop`.
    async fn ltrim(&self, key: &str, start: isize, stop: isize) -> anyhow::Result<()>;

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> anyhow::Result<Vec<String>>;

    async fn llen(&self, key: &str) -> anyhow::Result<usize>;

    /// Returns `false` when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> anyhow::Result<bool>;

    /// Returns `true` when a key was removed.
    async fn del(&self, key: &str) -> anyhow::Result<bool>;

    /// Append, trim to the last `cap` entries, then refresh the TTL.
    ///
    /// Stores that can run the three steps as one unit per key should
    /// override this; the default issues them one after another.
    async fn push_capped(
        &self,
        key: &str,
        value: &str,
        cap: usize,
        ttl: Option<Duration>,
    ) -> anyhow::Result<()> {
        self.rpush(key, value).await?;
        let keep = isize::try_from(cap).unwrap_or(isize::MAX);
        self.ltrim(key, -keep, -1).await?;
        if let Some(ttl) = ttl {
            self.expire(key, ttl).await?;
        }
        Ok(())
    }
}

/// Resolve Redis-style inclusive indices against a list of `len` elements.
///
/// Returns `None` when the range selects nothing.
#[must_use]
pub fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len_i = isize::try_from(len).ok()?;
    let start = if start < 0 { (len_i + start).max(0) } else { start };
    let stop = if stop < 0 { len_i + stop } else { stop.min(len_i - 1) };
    if len == 0 || start > stop || start >= len_i || stop < 0 {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

#[cfg(test)]
mod tests {
    use super::resolve_range;

    #[test]
    fn negative_indices_count_from_the_end() {
        assert_eq!(resolve_range(5, -3, -1), Some((2, 4)));
        assert_eq!(resolve_range(5, 0, -1), Some((0, 4)));
        assert_eq!(resolve_range(2, -10, -1), Some((0, 1)));
    }

    #[test]
    fn out_of_range_selects_nothing() {
        assert_eq!(resolve_range(0, 0, -1), None);
        assert_eq!(resolve_range(3, 5, 10), None);
        assert_eq!(resolve_range(3, 2, 1), None);
        assert_eq!(resolve_range(3, 0, -5), None);
    }

    #[test]
    fn stop_is_clamped_to_the_last_element() {
        assert_eq!(resolve_range(3, 1, 100), Some((1, 2)));
    }
}
