//! Render cache for the `cache` tag.
//!
//! [`with_cache`] memoizes a rendered body under a key for a bounded time.
//! Store failures never fail a render: they are logged and the body is
//! rendered fresh.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache lock poisoned")]
    Poisoned,

    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Storage for rendered fragments.
///
/// Values are swapped in whole: a reader sees either the previous entry or
/// the complete new one.
pub trait CacheStore: Send + Sync {
    /// Returns `None` when the key is absent or expired.
    fn get(&self, key: &str) -> Result<Option<Arc<str>>, CacheError>;

    fn put(&self, key: &str, value: Arc<str>, ttl: Duration) -> Result<(), CacheError>;

    fn remove(&self, key: &str) -> Result<(), CacheError>;

    fn clear(&self) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Arc<str>,
    /// `None` when the lifetime is too long to represent as an `Instant`.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|entries| entries.values().filter(|e| !e.is_expired()).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Arc<str>>, CacheError> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| Arc::clone(&entry.value)))
    }

    fn put(&self, key: &str, value: Arc<str>, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.retain(|_, entry| !entry.is_expired());
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now().checked_add(ttl),
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.clear();
        Ok(())
    }
}

/// Return the cached output for `key`, or render, store and return it.
///
/// The stored entry is keyed by both `key` and `ttl_seconds`. A `ttl_seconds`
/// of zero or less bypasses the store. When `render` fails nothing is stored
/// and the error is returned.
pub fn with_cache<F, E>(
    store: &dyn CacheStore,
    key: &str,
    ttl_seconds: i64,
    render: F,
) -> Result<String, E>
where
    F: FnOnce() -> Result<String, E>,
{
    let Ok(ttl) = u64::try_from(ttl_seconds) else {
        return render();
    };
    if ttl == 0 {
        return render();
    }

    let storage_key = format!("{key}:{ttl}");
    match store.get(&storage_key) {
        Ok(Some(hit)) => {
            debug!(key = %storage_key, "render cache hit");
            return Ok(hit.to_string());
        }
        Ok(None) => debug!(key = %storage_key, "render cache miss"),
        Err(err) => warn!(key = %storage_key, error = %err, "render cache read failed"),
    }

    let rendered = render()?;
    let value = Arc::from(rendered.as_str());
    if let Err(err) = store.put(&storage_key, value, Duration::from_secs(ttl)) {
        warn!(key = %storage_key, error = %err, "render cache write failed");
    }
    Ok(rendered)
}
