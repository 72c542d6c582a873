use std::collections::{BTreeMap, HashMap};

use super::CacheBackend;
use crate::Result;
use crate::entry::{CacheEntry, CacheKey};

/// In-process backend; contents vanish with the process
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: HashMap<CacheKey, (CacheEntry, u64)>,
    write_order: BTreeMap<u64, CacheKey>,
    next_seq: u64,
    total_bytes: u64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn detach(&mut self, key: &CacheKey) -> Option<u64> {
        let (entry, seq) = self.entries.remove(key)?;
        self.write_order.remove(&seq);
        self.total_bytes -= entry.size_bytes;
        Some(entry.size_bytes)
    }

    fn remove_where<P>(&mut self, predicate: P) -> usize
    where
        P: Fn(&CacheKey) -> bool,
    {
        let doomed: Vec<CacheKey> = self.entries.keys().filter(|k| predicate(k)).cloned().collect();
        for key in &doomed {
            self.detach(key);
        }
        doomed.len()
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&mut self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(key).map(|(entry, _)| entry.clone()))
    }

    fn put(&mut self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
        self.detach(key);
        self.next_seq += 1;
        self.write_order.insert(self.next_seq, key.clone());
        self.total_bytes += entry.size_bytes;
        self.entries
            .insert(key.clone(), (entry.clone(), self.next_seq));
        Ok(())
    }

    fn remove(&mut self, key: &CacheKey) -> Result<Option<u64>> {
        Ok(self.detach(key))
    }

    fn oldest_written(&mut self) -> Result<Option<(CacheKey, u64)>> {
        Ok(self.write_order.values().next().and_then(|key| {
            self.entries
                .get(key)
                .map(|(entry, _)| (key.clone(), entry.size_bytes))
        }))
    }

    fn total_bytes(&mut self) -> Result<u64> {
        Ok(self.total_bytes)
    }

    fn len(&mut self) -> Result<usize> {
        Ok(self.entries.len())
    }

    fn remove_prefix(&mut self, prefix: &str) -> Result<usize> {
        Ok(self.remove_where(|key| key.matches_prefix(prefix)))
    }

    fn clear(&mut self) -> Result<usize> {
        Ok(self.remove_where(|_| true))
    }
}
