use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// (resource key, filter fingerprint) pair addressing one cached payload.
///
/// Resource keys are slash-separated (`sessions`, `messages/<session id>`)
/// so that prefix invalidation can clear a whole family at once.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub resource: String,
    pub fingerprint: String,
}

impl CacheKey {
    pub fn new(resource: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            fingerprint: fingerprint.into(),
        }
    }

    /// `resource` equals `prefix` or sits beneath it (`prefix/...`)
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        match self.resource.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.fingerprint.get(..12).unwrap_or(&self.fingerprint);
        write!(f, "{}#{}", self.resource, short)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: String,
    pub fetched_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Estimates how much of the storage budget an entry consumes
pub trait SizeEstimator: Send + Sync {
    fn estimate(&self, key: &CacheKey, payload: &str) -> u64;
}

impl<F> SizeEstimator for F
where
    F: Fn(&CacheKey, &str) -> u64 + Send + Sync,
{
    fn estimate(&self, key: &CacheKey, payload: &str) -> u64 {
        self(key, payload)
    }
}

/// UTF-8 length of the payload plus both key components
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteLengthEstimator;

impl SizeEstimator for ByteLengthEstimator {
    fn estimate(&self, key: &CacheKey, payload: &str) -> u64 {
        (payload.len() + key.resource.len() + key.fingerprint.len()) as u64
    }
}
