use chrono::{Duration, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use crate::backend::{CacheBackend, MemoryBackend};
use crate::entry::{ByteLengthEstimator, CacheEntry, CacheKey, SizeEstimator};
use crate::Result;

/// What to drop on an explicit invalidation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Every entry whose resource key is, or sits beneath, the prefix
    Prefix(String),
    All,
}

impl Invalidation {
    pub fn prefix(resource: impl Into<String>) -> Self {
        Invalidation::Prefix(resource.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    EntryExceedsBudget { size: u64, budget: u64 },
    CachingDisabled,
    Backend(String),
}

/// A write the cache declined. Never fatal to a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheWriteSkipped {
    pub key: CacheKey,
    pub reason: SkipReason,
}

impl fmt::Display for CacheWriteSkipped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            SkipReason::EntryExceedsBudget { size, budget } => write!(
                f,
                "Skipped caching {}: entry of {} bytes exceeds budget of {} bytes",
                self.key, size, budget
            ),
            SkipReason::CachingDisabled => {
                write!(f, "Skipped caching {}: caching disabled", self.key)
            }
            SkipReason::Backend(msg) => write!(f, "Skipped caching {}: {}", self.key, msg),
        }
    }
}

impl std::error::Error for CacheWriteSkipped {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    Stored { size_bytes: u64, evicted: usize },
    Skipped(CacheWriteSkipped),
}

impl PutOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, PutOutcome::Stored { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub budget_bytes: u64,
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub evictions: u64,
    pub skipped: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    hits: u64,
    misses: u64,
    writes: u64,
    evictions: u64,
    skipped: u64,
}

struct Inner {
    backend: Box<dyn CacheBackend>,
    counters: Counters,
}

/// Budgeted read-through cache shared by every fetch in a run.
///
/// All access goes through one lock, so writes and their eviction accounting
/// are serialized across concurrent fetches. Backend failures are logged and
/// degrade to a miss or a skipped write.
pub struct PageCache {
    inner: Mutex<Inner>,
    budget_bytes: u64,
    max_age: Option<Duration>,
    estimator: Box<dyn SizeEstimator>,
    enabled: bool,
}

impl PageCache {
    pub fn new(backend: impl CacheBackend + 'static, budget_bytes: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                backend: Box::new(backend),
                counters: Counters::default(),
            }),
            budget_bytes,
            max_age: None,
            estimator: Box::new(ByteLengthEstimator),
            enabled: true,
        }
    }

    pub fn in_memory(budget_bytes: u64) -> Self {
        Self::new(MemoryBackend::new(), budget_bytes)
    }

    /// A cache that never serves and never stores
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::in_memory(0)
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn with_estimator(mut self, estimator: impl SizeEstimator + 'static) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn budget_bytes(&self) -> u64 {
        self.budget_bytes
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, resource: &str, fingerprint: &str) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }

        let key = CacheKey::new(resource, fingerprint);
        let mut inner = self.lock();

        let found = match inner.backend.get(&key) {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "cache read failed, treating as miss");
                None
            }
        };

        let fresh = found.filter(|entry| match self.max_age {
            Some(max_age) => Utc::now() - entry.fetched_at <= max_age,
            None => true,
        });

        match &fresh {
            Some(_) => {
                inner.counters.hits += 1;
                tracing::debug!(key = %key, "cache hit");
            }
            None => {
                inner.counters.misses += 1;
                tracing::debug!(key = %key, "cache miss");
            }
        }
        fresh
    }

    /// Store `payload`, evicting least-recently-written entries until it fits.
    pub fn put(&self, resource: &str, fingerprint: &str, payload: String) -> PutOutcome {
        let key = CacheKey::new(resource, fingerprint);

        if !self.enabled {
            return PutOutcome::Skipped(CacheWriteSkipped {
                key,
                reason: SkipReason::CachingDisabled,
            });
        }

        let size = self.estimator.estimate(&key, &payload);
        let mut inner = self.lock();

        if size > self.budget_bytes {
            inner.counters.skipped += 1;
            let skipped = CacheWriteSkipped {
                key,
                reason: SkipReason::EntryExceedsBudget {
                    size,
                    budget: self.budget_bytes,
                },
            };
            tracing::warn!("{}", skipped);
            return PutOutcome::Skipped(skipped);
        }

        let entry = CacheEntry {
            payload,
            fetched_at: Utc::now(),
            size_bytes: size,
        };

        match Self::store(&mut inner, &key, &entry, self.budget_bytes) {
            Ok(evicted) => {
                inner.counters.writes += 1;
                inner.counters.evictions += evicted as u64;
                tracing::debug!(key = %key, size, evicted, "cached page");
                PutOutcome::Stored {
                    size_bytes: size,
                    evicted,
                }
            }
            Err(err) => {
                inner.counters.skipped += 1;
                let skipped = CacheWriteSkipped {
                    key,
                    reason: SkipReason::Backend(err.to_string()),
                };
                tracing::warn!("{}", skipped);
                PutOutcome::Skipped(skipped)
            }
        }
    }

    fn store(inner: &mut Inner, key: &CacheKey, entry: &CacheEntry, budget: u64) -> Result<usize> {
        // An overwrite must not count the bytes it replaces
        inner.backend.remove(key)?;

        let mut total = inner.backend.total_bytes()?;
        let mut evicted = 0;
        while total + entry.size_bytes > budget {
            let Some((oldest, size)) = inner.backend.oldest_written()? else {
                break;
            };
            inner.backend.remove(&oldest)?;
            tracing::debug!(key = %oldest, size, "evicted cache entry");
            total = total.saturating_sub(size);
            evicted += 1;
        }

        inner.backend.put(key, entry)?;
        Ok(evicted)
    }

    pub fn invalidate(&self, scope: &Invalidation) -> Result<usize> {
        let mut inner = self.lock();
        let removed = match scope {
            Invalidation::Prefix(prefix) => inner.backend.remove_prefix(prefix)?,
            Invalidation::All => inner.backend.clear()?,
        };
        tracing::info!(?scope, removed, "invalidated cache entries");
        Ok(removed)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let mut inner = self.lock();
        let counters = inner.counters;
        Ok(CacheStats {
            entries: inner.backend.len()?,
            total_bytes: inner.backend.total_bytes()?,
            budget_bytes: self.budget_bytes,
            hits: counters.hits,
            misses: counters.misses,
            writes: counters.writes,
            evictions: counters.evictions,
            skipped: counters.skipped,
        })
    }
}

impl fmt::Debug for PageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageCache")
            .field("budget_bytes", &self.budget_bytes)
            .field("max_age", &self.max_age)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}
