// src/storage/cache.rs

//! Day Cache: TTL-scoped memoization of provider records and extracted artifacts.
//!
//! ## Key space
//!
//! ```text
//! response 2022-03-16        # RawRecord for the day
//! gospel 2022-03-16          # Artifact, "<section prefix> <day>"
//! first lecture 2022-03-16
//! ```
//!
//! Entries are trusted only while `now < expires_at`. Concurrent misses for
//! the same day may both fetch; the last store wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::models::{Artifact, RawRecord};

/// Prefix of raw record keys.
pub const RAW_PREFIX: &str = "response";

/// A cached value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Raw(RawRecord),
    Artifact(Artifact),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Shared, cloneable cache handle. Clones see the same entries.
#[derive(Debug, Clone)]
pub struct DayCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
}

impl DayCache {
    /// Create an empty cache whose convenience stores use `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn raw_key(day: &str) -> String {
        format!("{RAW_PREFIX} {day}")
    }

    pub fn artifact_key(prefix: &str, day: &str) -> String {
        format!("{prefix} {day}")
    }

    async fn lookup(&self, key: &str) -> Option<CachedValue> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    /// Raw record for `day`, if a live one is cached.
    pub async fn lookup_raw(&self, day: &str) -> Option<RawRecord> {
        match self.lookup(&Self::raw_key(day)).await? {
            CachedValue::Raw(raw) => Some(raw),
            CachedValue::Artifact(_) => None,
        }
    }

    /// Artifact for the section keyed by `prefix` on `day`, if a live one is cached.
    pub async fn lookup_artifact(&self, prefix: &str, day: &str) -> Option<Artifact> {
        match self.lookup(&Self::artifact_key(prefix, day)).await? {
            CachedValue::Artifact(artifact) => Some(artifact),
            CachedValue::Raw(_) => None,
        }
    }

    /// Insert or overwrite `key`. Expired entries are evicted on the way.
    ///
    /// A `ttl` too large to represent as an expiry leaves the cache untouched.
    pub async fn store(&self, key: String, value: CachedValue, ttl: Duration) {
        let now = Instant::now();
        let Some(expires_at) = now.checked_add(ttl) else {
            log::warn!("TTL {:?} overflows the clock, not caching '{}'", ttl, key);
            return;
        };

        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(key, CacheEntry { value, expires_at });
    }

    pub async fn store_raw(&self, day: &str, raw: RawRecord) {
        self.store(Self::raw_key(day), CachedValue::Raw(raw), self.ttl)
            .await;
    }

    pub async fn store_artifact(&self, prefix: &str, day: &str, artifact: Artifact) {
        self.store(
            Self::artifact_key(prefix, day),
            CachedValue::Artifact(artifact),
            self.ttl,
        )
        .await;
    }

    /// Drop expired entries, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|entry| entry.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(title: &str) -> RawRecord {
        RawRecord {
            title: title.to_string(),
            html_body: "<p>body</p>".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = DayCache::new(Duration::from_secs(60));
        cache.store_raw("2022-03-16", raw("16/03/2022")).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.lookup_raw("2022-03-16").await, Some(raw("16/03/2022")));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.lookup_raw("2022-03-16").await, None);
        assert_eq!(cache.purge_expired().await, 1);
    }

    #[tokio::test]
    async fn days_and_kinds_do_not_collide() {
        let cache = DayCache::new(Duration::from_secs(60));
        cache.store_raw("2022-03-16", raw("16")).await;
        cache.store_raw("2022-03-20", raw("20")).await;
        cache
            .store_artifact("gospel", "2022-03-16", Artifact::day_only("16"))
            .await;

        assert_eq!(cache.lookup_raw("2022-03-20").await, Some(raw("20")));
        assert_eq!(
            cache.lookup_artifact("gospel", "2022-03-16").await,
            Some(Artifact::day_only("16"))
        );
        assert_eq!(cache.lookup_artifact("gospel", "2022-03-20").await, None);
        assert_eq!(cache.lookup_artifact("psalm", "2022-03-16").await, None);
        assert_eq!(cache.len().await, 3);
    }

    #[tokio::test]
    async fn mismatched_value_kind_is_a_miss() {
        let cache = DayCache::new(Duration::from_secs(60));
        cache
            .store(
                DayCache::raw_key("2022-03-16"),
                CachedValue::Artifact(Artifact::day_only("16")),
                Duration::from_secs(60),
            )
            .await;
        assert_eq!(cache.lookup_raw("2022-03-16").await, None);
    }

    #[tokio::test]
    async fn later_store_overwrites() {
        let cache = DayCache::new(Duration::from_secs(60));
        cache.store_raw("2022-03-16", raw("first")).await;
        cache.store_raw("2022-03-16", raw("second")).await;
        assert_eq!(cache.lookup_raw("2022-03-16").await, Some(raw("second")));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn store_evicts_expired_entries() {
        let cache = DayCache::new(Duration::from_secs(10));
        cache.store_raw("2022-03-16", raw("old")).await;
        tokio::time::advance(Duration::from_secs(11)).await;
        cache.store_raw("2022-03-17", raw("new")).await;

        assert_eq!(cache.purge_expired().await, 0);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn unrepresentable_ttl_skips_the_store() {
        let cache = DayCache::new(Duration::from_secs(u64::MAX));
        cache.store_raw("2022-03-16", raw("16")).await;

        assert_eq!(cache.lookup_raw("2022-03-16").await, None);
        assert!(cache.is_empty().await);
    }
}
