use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use companyhub_core::{CompanyRecord, MutationAction, MutationEvent};
use dashmap::DashMap;
use uuid::Uuid;

use crate::metrics;

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Sharded in-process map from company id to the last known record.
///
/// Values are stored behind `Arc` so hits clone a pointer, not the name.
/// Every write replaces the whole entry, so readers never observe a
/// partially updated record.
#[derive(Debug, Default)]
pub struct LocalCache {
    entries: DashMap<Uuid, Arc<CompanyRecord>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a record. A miss is `None`, never an error.
    pub fn get(&self, id: &Uuid) -> Option<Arc<CompanyRecord>> {
        match self.entries.get(id) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_hit();
                Some(Arc::clone(entry.value()))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_miss();
                None
            }
        }
    }

    /// Reads an entry without touching the hit/miss counters.
    pub fn peek(&self, id: &Uuid) -> Option<Arc<CompanyRecord>> {
        self.entries.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.entries.contains_key(id)
    }

    /// Inserts or replaces the entry for `id` (last write wins).
    pub fn upsert(&self, id: Uuid, name: impl Into<String>) {
        self.entries.insert(id, Arc::new(CompanyRecord::new(id, name)));
        metrics::set_cache_entries(self.entries.len());
    }

    /// Drops the entry for `id`. Absent ids are a no-op.
    pub fn remove(&self, id: &Uuid) {
        if self.entries.remove(id).is_some() {
            metrics::set_cache_entries(self.entries.len());
        }
    }

    /// Folds one log event into the cache.
    pub fn apply(&self, event: &MutationEvent) {
        match event.action {
            MutationAction::Update => self.upsert(event.id, event.name.as_str()),
            MutationAction::Delete => self.remove(&event.id),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
