use crate::CacheError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Shared rendered-slice cache, Redis-shaped: byte values under string keys
/// with a per-entry TTL. Implementations must be safe under concurrent
/// access from any number of sessions and background warmers.
#[async_trait]
pub trait SliceCache: Send + Sync {
    /// Presence check. This is the only call the prefetch executor makes.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    deadline: Instant,
}

impl Entry {
    fn live(&self) -> bool {
        self.deadline > Instant::now()
    }
}

/// Process-local cache with lazy TTL expiry. Stands in for the Redis tier.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hit/miss accounting across `get` calls plus the live entry count.
    /// Expired entries are pruned as part of the count.
    pub fn metrics(&self) -> CacheMetrics {
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.live());
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: entries.len(),
        }
    }
}

#[async_trait]
impl SliceCache for MemoryCache {
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        // Probes do not count toward hit/miss accounting.
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.live() => Ok(true),
            Some(_) => {
                entries.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let value = {
            let mut entries = self.entries.lock();
            match entries.get(key) {
                Some(entry) if entry.live() => Some(entry.value.clone()),
                Some(_) => {
                    entries.remove(key);
                    None
                }
                None => None,
            }
        };

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(value)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            deadline: Instant::now() + ttl,
        };
        self.entries.lock().insert(key.to_owned(), entry);
        Ok(())
    }
}
