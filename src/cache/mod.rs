//! In-memory result cache.
//!
//! Caches report results per tenant for a fixed TTL.
//!
//! # Design
//!
//! - Entries live in a `DashMap`; a mutex-guarded queue records insertion order
//! - Eviction at capacity removes the oldest *inserted* entry; reads never
//!   promote an entry
//! - Expired entries are dropped lazily on read, or by [`ResultCache::purge_expired`]
//! - Failures (poisoned lock) are logged and behave as a miss
//!
//! # Key Format
//!
//! ```text
//! {tenant}:{sha256(json(spec))}
//! ```

mod key;
pub use key::{compute_hash, CacheKey};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::CacheSettings;
use crate::spec::ReportResult;

/// Default time-to-live of an entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default maximum number of entries.
pub const DEFAULT_CAPACITY: usize = 100;

struct Entry {
    result: ReportResult,
    inserted_at: Instant,
}

/// Cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Shared, TTL-bounded result cache.
pub struct ResultCache {
    entries: DashMap<CacheKey, Entry>,
    order: Mutex<VecDeque<CacheKey>>,
    ttl: Duration,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl ResultCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            ttl,
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(Duration::from_secs(settings.ttl_seconds), settings.capacity)
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        entry.inserted_at.elapsed() >= self.ttl
    }

    /// Look up a live entry.
    pub fn get(&self, key: &CacheKey) -> Option<ReportResult> {
        let found = self.entries.get(key).map(|entry| {
            if self.is_expired(&entry) {
                None
            } else {
                Some(entry.result.clone())
            }
        });

        match found {
            Some(Some(result)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(result)
            }
            Some(None) => {
                debug!(%key, "cache entry expired");
                self.remove_expired(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a result, evicting the oldest inserted entries at capacity.
    pub fn put(&self, key: CacheKey, result: ReportResult) {
        if self.capacity == 0 {
            return;
        }
        let mut order = match self.order.lock() {
            Ok(order) => order,
            Err(_) => {
                warn!(%key, "cache order lock poisoned, result not cached");
                return;
            }
        };

        if self.entries.contains_key(&key) {
            order.retain(|k| k != &key);
        }
        while self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            let Some(oldest) = order.pop_front() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key = %oldest, "evicted cache entry");
            }
        }

        order.push_back(key.clone());
        self.entries.insert(
            key,
            Entry {
                result,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop `key` only while its entry is still expired, so a fresh `put`
    /// racing with the read survives.
    fn remove_expired(&self, key: &CacheKey) {
        // Held across the removal, as in `put`, to keep the queue in step.
        let order = self.order.lock();
        if self
            .entries
            .remove_if(key, |_, entry| self.is_expired(entry))
            .is_none()
        {
            return;
        }
        match order {
            Ok(mut order) => order.retain(|k| k != key),
            Err(_) => warn!(%key, "cache order lock poisoned"),
        }
    }

    /// Drop all entries, or only those of `tenant`. Returns the number removed.
    pub fn clear(&self, tenant: Option<&str>) -> usize {
        let before = self.entries.len();
        match tenant {
            Some(tenant) => self.entries.retain(|k, _| k.tenant() != tenant),
            None => self.entries.clear(),
        }
        if let Ok(mut order) = self.order.lock() {
            order.retain(|k| self.entries.contains_key(k));
        }
        before.saturating_sub(self.entries.len())
    }

    /// Drop every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_expired(entry));
        if let Ok(mut order) = self.order.lock() {
            order.retain(|k| self.entries.contains_key(k));
        }
        before.saturating_sub(self.entries.len())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            capacity: self.capacity,
            ttl_seconds: self.ttl.as_secs(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
