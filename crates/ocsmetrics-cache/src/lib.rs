// Bounded key-value cache for fetched pages.
// Entries are keyed by (resource, filter fingerprint); the cache is an
// optimisation only, so every failure degrades to a miss or a skipped write.

mod backend;
mod cache;
mod entry;
mod error;

pub use backend::{CacheBackend, MemoryBackend, SqliteBackend, CACHE_DB_FILE};
pub use cache::{
    CacheStats, CacheWriteSkipped, Invalidation, PageCache, PutOutcome, SkipReason,
};
pub use entry::{ByteLengthEstimator, CacheEntry, CacheKey, SizeEstimator};
pub use error::{Error, Result};
