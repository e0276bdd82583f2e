use std::collections::HashMap;
use std::sync::Arc;

use super::FetchResponse;

/// Page responses keyed by `page_pageSize_sortColumn_sortDirection`.
///
/// Entries are never evicted; the cache lives as long as the view and only
/// holds the combinations a user actually visited.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: HashMap<String, Arc<FetchResponse>>,
    hits: u64,
    misses: u64,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a response, counting the hit or miss
    pub fn get(&mut self, key: &str) -> Option<Arc<FetchResponse>> {
        match self.entries.get(key) {
            Some(response) => {
                self.hits += 1;
                Some(Arc::clone(response))
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn put(&mut self, key: String, response: Arc<FetchResponse>) {
        self.entries.insert(key, response);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop every entry; counters are kept
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entry_count: usize,
    pub hits: u64,
    pub misses: u64,
}
