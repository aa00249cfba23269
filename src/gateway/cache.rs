//! Bounded FIFO cache of backend model handles, keyed by fingerprint.
//!
//! Deliberately FIFO rather than LRU: a handle's age since creation bounds
//! its lifetime, so a hot entry still gets recycled eventually.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use crate::traits::ModelHandle;

pub const DEFAULT_CAPACITY: usize = 10;

pub struct ModelCache {
    entries: VecDeque<(String, Arc<dyn ModelHandle>)>,
    capacity: usize,
}

impl ModelCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Lookup without reordering — hits do not extend an entry's life.
    pub fn get(&self, fingerprint: &str) -> Option<Arc<dyn ModelHandle>> {
        self.entries
            .iter()
            .find(|(key, _)| key == fingerprint)
            .map(|(_, handle)| handle.clone())
    }

    /// Insert a new handle, evicting the earliest-inserted entry past capacity.
    pub fn insert(&mut self, fingerprint: String, handle: Arc<dyn ModelHandle>) {
        if self.entries.iter().any(|(key, _)| *key == fingerprint) {
            return;
        }
        if self.entries.len() == self.capacity {
            if let Some((evicted, _)) = self.entries.pop_front() {
                debug!(fingerprint = %evicted, "Evicted oldest cached model handle");
            }
        }
        self.entries.push_back((fingerprint, handle));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every handle. Used by the cleanup escalation tier and memory
    /// pressure relief.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::types::RequestPart;

    struct StubHandle(&'static str);

    #[async_trait]
    impl ModelHandle for StubHandle {
        async fn generate_content(&self, _parts: &[RequestPart]) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn handle(tag: &'static str) -> Arc<dyn ModelHandle> {
        Arc::new(StubHandle(tag))
    }

    #[test]
    fn eleventh_insert_evicts_the_earliest() {
        let mut cache = ModelCache::new(DEFAULT_CAPACITY);
        for i in 0..11 {
            cache.insert(format!("fp-{}", i), handle("h"));
        }
        assert_eq!(cache.len(), 10);
        assert!(cache.get("fp-0").is_none(), "earliest entry must be gone");
        for i in 1..11 {
            assert!(cache.get(&format!("fp-{}", i)).is_some());
        }
    }

    #[test]
    fn get_does_not_protect_from_eviction() {
        let mut cache = ModelCache::new(2);
        cache.insert("a".into(), handle("a"));
        cache.insert("b".into(), handle("b"));
        // Touch "a" — FIFO must still evict it first.
        assert!(cache.get("a").is_some());
        cache.insert("c".into(), handle("c"));
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn duplicate_insert_is_a_noop() {
        let mut cache = ModelCache::new(2);
        cache.insert("a".into(), handle("a1"));
        cache.insert("a".into(), handle("a2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_empties_the_cache() {
        let mut cache = ModelCache::new(3);
        cache.insert("a".into(), handle("a"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
