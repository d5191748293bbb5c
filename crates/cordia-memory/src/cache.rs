// SPDX-FileCopyrightText: 2026 Cordia Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process TTL-aware list cache implementing [`HotCacheAdapter`].
//!
//! Backs the hot tier when no co-located KV store is deployed; the same
//! adapter trait admits an external store without touching the manager.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use cordia_core::traits::Clock;
use cordia_core::{CordiaError, HotCacheAdapter};

struct ListEntry {
    values: Vec<String>,
    expires_at: Option<DateTime<Utc>>,
}

/// DashMap-backed hot cache with lazy TTL expiry.
///
/// Expiry reads the injected [`Clock`] so tests can advance time explicitly.
pub struct MemoryHotCache {
    lists: DashMap<String, ListEntry>,
    clock: Arc<dyn Clock>,
}

impl MemoryHotCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            lists: DashMap::new(),
            clock,
        }
    }

    /// Drop the entry when its TTL has passed. Returns whether it was live.
    fn evict_if_expired(&self, key: &str) -> bool {
        let now = self.clock.now();
        let expired = self
            .lists
            .get(key)
            .map(|entry| matches!(entry.expires_at, Some(at) if at <= now))
            .unwrap_or(false);
        if expired {
            self.lists.remove(key);
        }
        expired
    }
}

/// Resolve a possibly negative list index to an absolute one, clamped.
fn resolve_index(index: i64, len: usize) -> usize {
    if index < 0 {
        len.saturating_sub(index.unsigned_abs() as usize)
    } else {
        (index as usize).min(len)
    }
}

#[async_trait]
impl HotCacheAdapter for MemoryHotCache {
    async fn lpush(&self, key: &str, value: String) -> Result<(), CordiaError> {
        self.evict_if_expired(key);
        let mut entry = self.lists.entry(key.to_string()).or_insert_with(|| ListEntry {
            values: Vec::new(),
            expires_at: None,
        });
        entry.values.insert(0, value);
        Ok(())
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, CordiaError> {
        self.evict_if_expired(key);
        let Some(entry) = self.lists.get(key) else {
            return Ok(Vec::new());
        };
        let len = entry.values.len();
        let from = resolve_index(start, len);
        // Stop is inclusive; -1 addresses the last element.
        let to = if stop < 0 {
            len - (stop.unsigned_abs() as usize - 1).min(len)
        } else {
            ((stop as usize) + 1).min(len)
        };
        if from >= to {
            return Ok(Vec::new());
        }
        Ok(entry.values[from..to].to_vec())
    }

    async fn ltrim(&self, key: &str, start: i64, stop: i64) -> Result<(), CordiaError> {
        self.evict_if_expired(key);
        if let Some(mut entry) = self.lists.get_mut(key) {
            let len = entry.values.len();
            let from = resolve_index(start, len);
            let to = if stop < 0 {
                len - (stop.unsigned_abs() as usize - 1).min(len)
            } else {
                ((stop as usize) + 1).min(len)
            };
            entry.values = if from >= to {
                Vec::new()
            } else {
                entry.values[from..to].to_vec()
            };
        }
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), CordiaError> {
        let deadline = self.clock.now()
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(0));
        if let Some(mut entry) = self.lists.get_mut(key) {
            entry.expires_at = Some(deadline);
        }
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CordiaError> {
        self.lists.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cordia_core::SystemClock;
    use std::sync::Mutex;

    struct StepClock(Mutex<DateTime<Utc>>);

    impl Clock for StepClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn cache() -> MemoryHotCache {
        MemoryHotCache::new(Arc::new(SystemClock))
    }

    #[tokio::test]
    async fn lpush_prepends_newest_first() {
        let cache = cache();
        cache.lpush("k", "a".into()).await.unwrap();
        cache.lpush("k", "b".into()).await.unwrap();
        cache.lpush("k", "c".into()).await.unwrap();

        let all = cache.lrange("k", 0, -1).await.unwrap();
        assert_eq!(all, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn ltrim_keeps_the_head_range() {
        let cache = cache();
        for v in ["a", "b", "c", "d", "e"] {
            cache.lpush("k", v.into()).await.unwrap();
        }
        cache.ltrim("k", 0, 2).await.unwrap();
        let all = cache.lrange("k", 0, -1).await.unwrap();
        assert_eq!(all, vec!["e", "d", "c"]);
    }

    #[tokio::test]
    async fn missing_key_reads_empty() {
        let cache = cache();
        assert!(cache.lrange("nope", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_keys_read_as_absent() {
        let start = Utc::now();
        let clock = Arc::new(StepClock(Mutex::new(start)));
        let cache = MemoryHotCache::new(clock.clone());

        cache.lpush("k", "a".into()).await.unwrap();
        cache.expire("k", Duration::from_secs(3600)).await.unwrap();
        assert_eq!(cache.lrange("k", 0, -1).await.unwrap().len(), 1);

        *clock.0.lock().unwrap() = start + chrono::Duration::seconds(3601);
        assert!(cache.lrange("k", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn del_removes_the_key() {
        let cache = cache();
        cache.lpush("k", "a".into()).await.unwrap();
        cache.del("k").await.unwrap();
        assert!(cache.lrange("k", 0, -1).await.unwrap().is_empty());
    }
}
