mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryBackend;
pub use sqlite::{CACHE_DB_FILE, SqliteBackend};

use crate::Result;
use crate::entry::{CacheEntry, CacheKey};

/// Storage medium behind a [`crate::PageCache`].
///
/// Backends keep entries in write order: every `put` (including an
/// overwrite) makes the entry the most recently written one, and
/// `oldest_written` returns the entry that has gone longest without a write.
/// Budget accounting lives in the cache, not here.
pub trait CacheBackend: Send {
    fn get(&mut self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    fn put(&mut self, key: &CacheKey, entry: &CacheEntry) -> Result<()>;

    fn remove(&mut self, key: &CacheKey) -> Result<Option<u64>>;

    /// Key and size of the least recently written entry
    fn oldest_written(&mut self) -> Result<Option<(CacheKey, u64)>>;

    fn total_bytes(&mut self) -> Result<u64>;

    fn len(&mut self) -> Result<usize>;

    /// Remove every entry whose resource matches `prefix` segment-wise
    fn remove_prefix(&mut self, prefix: &str) -> Result<usize>;

    fn clear(&mut self) -> Result<usize>;
}
