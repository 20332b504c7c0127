//! TTL cache for upstream payloads.

use std::sync::Arc;
use std::time::Duration;

use moka::Expiry;
use moka::future::Cache;
use tokio::time::Instant;

/// A cached payload and the clock it expires against.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Arc<serde_json::Value>,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.stored_at.elapsed() < self.ttl
    }
}

/// Expires each entry after its own TTL, counted from the last write.
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Shared response cache.
///
/// Reads never observe a partial write and concurrent writes to one key are
/// last-write-wins.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Cache<String, CacheEntry>,
    default_ttl: Duration,
}

impl ResponseCache {
    #[must_use]
    pub fn new(max_capacity: u64, default_ttl: Duration) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .build();

        Self { entries, default_ttl }
    }

    /// Value for `key`, or `None` if absent or past its TTL.
    pub async fn get(&self, key: &str) -> Option<Arc<serde_json::Value>> {
        let entry = self.entries.get(key).await?;
        entry.is_fresh().then_some(entry.value)
    }

    /// Store `value` under `key`, replacing any previous entry and restarting its clock.
    pub async fn set(&self, key: &str, value: Arc<serde_json::Value>, ttl: Duration) {
        let entry = CacheEntry { value, stored_at: Instant::now(), ttl };
        self.entries.insert(key.to_string(), entry).await;
    }

    /// [`set`](Self::set) with the configured default TTL.
    pub async fn set_default(&self, key: &str, value: Arc<serde_json::Value>) {
        self.set(key, value, self.default_ttl).await;
    }

    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.entries.entry_count())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

/// Generate cache key.
#[must_use]
pub fn cache_key(method: &str, url: &str) -> String {
    use md5::{Digest, Md5};

    let mut hasher = Md5::new();
    hasher.update(method.as_bytes());
    hasher.update(b"|");
    hasher.update(url.as_bytes());

    format!("{:x}", hasher.finalize())
}
