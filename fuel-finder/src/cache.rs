//! In-memory TTL cache for API responses.
//!
//! Entries carry their own time-to-live and are checked lazily when read.
//! Expired entries stay in the map (and remain available to stale reads)
//! until [`TtlCache::prune`] or [`TtlCache::flush`] is called.
//!
//! Storage is a moka cache used as a plain unbounded concurrent map. Neither
//! moka's expiration nor its capacity bound is configured: both evict entries
//! on their own, and only `delete`, `prune` and `flush` may remove one.

use std::time::Duration;

use moka::future::Cache as MokaCache;
use moka::ops::compute::{CompResult, Op};
use tokio::time::Instant;
use tracing::{debug, trace};

/// How long a cached value stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Never stored. `set` hands the value straight back.
    Bypass,
    /// Stored and never expires.
    Forever,
    /// Stored and expires once older than the duration.
    Expires(Duration),
}

impl Ttl {
    /// Interpret a TTL in seconds: negative disables caching, zero never
    /// expires, anything else expires after that many seconds.
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            s if s < 0 => Ttl::Bypass,
            0 => Ttl::Forever,
            s => Ttl::Expires(Duration::from_secs(s as u64)),
        }
    }
}

/// Errors from cache operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("cache key not found: {0}")]
    NotFound(String),
}

/// Configuration for a [`TtlCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL applied when `set` is called without one.
    pub default_ttl: Ttl,
}

impl CacheConfig {
    pub fn new(default_ttl: Ttl) -> Self {
        Self { default_ttl }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(Ttl::Forever)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Ttl,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        match self.ttl {
            Ttl::Expires(ttl) => now.saturating_duration_since(self.created_at) > ttl,
            Ttl::Forever | Ttl::Bypass => false,
        }
    }
}

/// Key/value cache with per-entry expiration and stale reads.
pub struct TtlCache<V> {
    entries: MokaCache<String, CacheEntry<V>>,
    default_ttl: Ttl,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: MokaCache::builder().build(),
            default_ttl: config.default_ttl,
        }
    }

    /// TTL used by `set` when none is given.
    pub fn default_ttl(&self) -> Ttl {
        self.default_ttl
    }

    /// Look up a value.
    ///
    /// Expired values are only returned when `allow_stale` is set.
    pub async fn get(&self, key: &str, allow_stale: bool) -> Option<V> {
        let Some(entry) = self.entries.get(key).await else {
            trace!(key, "cache miss");
            return None;
        };

        if entry.is_expired(Instant::now()) && !allow_stale {
            trace!(key, "cache entry expired");
            return None;
        }

        debug!(key, "returning cached result");
        Some(entry.value)
    }

    /// Store a value and hand it back.
    ///
    /// With an effective TTL of [`Ttl::Bypass`] nothing is stored. Any
    /// previous entry for `key` is replaced.
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Option<Ttl>) -> V {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if ttl == Ttl::Bypass {
            return value;
        }

        let key = key.into();
        debug!(key = %key, ?ttl, "caching result");
        let entry = CacheEntry {
            value: value.clone(),
            created_at: Instant::now(),
            ttl,
        };
        self.entries.insert(key, entry).await;
        value
    }

    /// Remove an entry, returning its value.
    pub async fn delete(&self, key: &str) -> Result<V, CacheError> {
        self.entries
            .remove(key)
            .await
            .map(|entry| entry.value)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    /// Remove every entry that has expired. Returns how many were removed.
    pub async fn prune(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for key in self.expired_keys(now) {
            if self.remove_if_expired(key, now).await {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!(removed, "pruned expired cache entries");
        }
        removed
    }

    fn expired_keys(&self, now: Instant) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.as_ref().clone())
            .collect()
    }

    /// Remove `key` only if the entry stored now is still expired. A `set`
    /// that replaced it since the scan keeps its entry.
    async fn remove_if_expired(&self, key: String, now: Instant) -> bool {
        let result = self
            .entries
            .entry(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) if entry.value().is_expired(now) => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        matches!(result, CompResult::Removed(_))
    }

    /// Remove every entry.
    pub async fn flush(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
