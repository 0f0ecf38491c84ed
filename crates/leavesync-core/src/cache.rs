// ── Read cache and invalidation hook ──
//
// The bus calls `CacheInvalidator::invalidate` before every handler
// invocation. `ReadCache` is the default in-memory implementation;
// applications with their own cache can pass any `Fn()` closure instead.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

/// Default time-to-live for cached reads.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Hook invoked synchronously on every inbound change, before the handler.
pub trait CacheInvalidator: Send + Sync {
    fn invalidate(&self);
}

impl<F> CacheInvalidator for F
where
    F: Fn() + Send + Sync,
{
    fn invalidate(&self) {
        self();
    }
}

struct CacheEntry {
    value: Value,
    inserted_at: Instant,
}

/// Concurrent key → JSON value cache with a fixed TTL.
///
/// Entries past their TTL are treated as missing and evicted lazily on
/// the next `get`.
pub struct ReadCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    generation: AtomicU64,
}

impl ReadCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            generation: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch a live entry. Expired entries are removed and reported missing.
    pub fn get(&self, key: &str) -> Option<Value> {
        {
            let entry = self.entries.get(key)?;
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.value.clone());
            }
        }
        // Read guard released above; removing while holding it deadlocks.
        self.entries
            .remove_if(key, |_, e| e.inserted_at.elapsed() >= self.ttl);
        None
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every entry and bump the generation counter.
    pub fn invalidate(&self) {
        self.entries.clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
        tracing::trace!("read cache invalidated");
    }

    /// Number of stored entries, expired ones included until evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many times the cache has been invalidated.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for ReadCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl CacheInvalidator for ReadCache {
    fn invalidate(&self) {
        ReadCache::invalidate(self);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use super::*;

    #[test]
    fn insert_then_get() {
        let cache = ReadCache::default();
        cache.insert("employees", json!([1, 2, 3]));
        assert_eq!(cache.get("employees"), Some(json!([1, 2, 3])));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("vacations").is_none());
    }

    #[test]
    fn expired_entries_are_evicted() {
        let cache = ReadCache::new(Duration::ZERO);
        cache.insert("employees", json!([]));
        assert!(cache.get("employees").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_clears_and_bumps_generation() {
        let cache = ReadCache::default();
        cache.insert("a", json!(1));
        cache.insert("b", json!(2));
        CacheInvalidator::invalidate(&cache);
        assert!(cache.is_empty());
        assert_eq!(cache.generation(), 1);
    }

    #[test]
    fn closures_are_invalidators() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let hook: Arc<dyn CacheInvalidator> = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        hook.invalidate();
        hook.invalidate();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
