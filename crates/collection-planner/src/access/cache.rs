//! TTL cache for access results
//!
//! Keyed by strip geometry, capability fingerprint and window bounds.
//! Purely a latency optimisation: a miss always falls through to the oracle.

use crate::model::{AssetCapability, CandidateWindow, Strip, StripId, TemporalWindow};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    strip: StripId,
    geometry: u64,
    capability: u64,
    start_ms: i64,
    end_ms: i64,
}

impl CacheKey {
    pub fn new(strip: &Strip, capability: &AssetCapability, window: &TemporalWindow) -> Self {
        Self {
            strip: strip.id,
            geometry: strip.fingerprint(),
            capability: capability.fingerprint(),
            start_ms: window.start.timestamp_millis(),
            end_ms: window.end.timestamp_millis(),
        }
    }
}

struct CacheEntry {
    windows: Vec<CandidateWindow>,
    expires_at: Instant,
}

pub struct AccessCache {
    ttl: Duration,
    capacity: usize,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AccessCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Vec<CandidateWindow>> {
        let entries = self.entries.read().await;
        let found = entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.windows.clone());
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub async fn insert(&self, key: CacheKey, windows: Vec<CandidateWindow>) {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            entries.retain(|_, e| e.expires_at > now);
        }
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.expires_at)
                .map(|(k, _)| *k);
            if let Some(oldest) = oldest {
                debug!("Access cache full, evicting {}", oldest.strip);
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                windows,
                expires_at: now + self.ttl,
            },
        );
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Lookups since creation: (hits, misses)
    pub fn counters(&self) -> (u64, u64) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }

    /// (total entries, unexpired entries)
    pub async fn stats(&self) -> (usize, usize) {
        let entries = self.entries.read().await;
        let now = Instant::now();
        let valid = entries.values().filter(|e| e.expires_at > now).count();
        (entries.len(), valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::tests::{pass, test_capability, test_strip, test_window};

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = AccessCache::new(Duration::from_secs(60), 10);
        let key = CacheKey::new(&test_strip(0), &test_capability(), &test_window());
        cache.insert(key, vec![pass("sat-a", 1, 10, 1.0)]).await;
        assert!(cache.get(&key).await.is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.get(&key).await.is_none());
        assert_eq!(cache.stats().await, (1, 0));
        assert_eq!(cache.counters(), (1, 1));
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let cache = AccessCache::new(Duration::from_secs(60), 2);
        let keys: Vec<_> = (0..3)
            .map(|i| CacheKey::new(&test_strip(i), &test_capability(), &test_window()))
            .collect();
        for key in &keys {
            cache.insert(*key, Vec::new()).await;
            tokio::task::yield_now().await;
        }
        let (total, _) = cache.stats().await;
        assert_eq!(total, 2);
        assert!(cache.get(&keys[2]).await.is_some());
    }

    #[test]
    fn test_key_tracks_capability() {
        let strip = test_strip(0);
        let mut other = test_capability();
        other.resolution_m = 10.0;
        assert_ne!(
            CacheKey::new(&strip, &test_capability(), &test_window()),
            CacheKey::new(&strip, &other, &test_window())
        );
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = AccessCache::new(Duration::from_secs(60), 10);
        let key = CacheKey::new(&test_strip(0), &test_capability(), &test_window());
        cache.insert(key, Vec::new()).await;
        cache.clear().await;
        assert_eq!(cache.stats().await, (0, 0));
    }
}
