//! Injected shared services.
//!
//! The correlation-id counter and the keyed document store are the only shared
//! mutable state outside slots and the assembler buffer. Both are explicit
//! injected services with their own synchronization, never hidden singletons,
//! so tests can instantiate isolated instances per case.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::document::Document;

/// Process-wide monotonically increasing correlation-id source.
///
/// Every call to [`next_id`](Self::next_id) returns a distinct zero-padded
/// value for the life of the instance, regardless of how many threads draw
/// from it concurrently.
///
/// # Examples
///
/// ```
/// use ductwork::services::CorrelationIdSource;
///
/// let source = CorrelationIdSource::new();
/// assert_eq!(source.next_id(), "0000000000");
/// assert_eq!(source.next_id(), "0000000001");
/// ```
#[derive(Debug)]
pub struct CorrelationIdSource {
    counter: AtomicU64,
    width: usize,
}

impl CorrelationIdSource {
    /// Default zero-padding width of issued ids.
    pub const DEFAULT_WIDTH: usize = 10;

    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_width(Self::DEFAULT_WIDTH)
    }

    /// Creates a source issuing ids padded to `width` digits.
    #[must_use]
    pub fn with_width(width: usize) -> Arc<Self> {
        Arc::new(Self {
            counter: AtomicU64::new(0),
            width,
        })
    }

    /// Issues the next id. Never returns the same value twice.
    pub fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{n:0width$}", width = self.width)
    }
}

/// Keyed store retaining documents for later reference.
///
/// The Splitter stores each pre-split original here under the message id, so
/// downstream stages can recover the whole document after working on
/// fragments. `put` replaces any previous entry for the key.
#[derive(Debug, Default)]
pub struct DocumentStore {
    entries: Mutex<FxHashMap<String, Document>>,
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn put(&self, key: impl Into<String>, document: Document) {
        self.entries.lock().insert(key.into(), document);
    }

    /// Returns a clone of the stored document, or `None` when absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Document> {
        self.entries.lock().get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic_and_padded() {
        let source = CorrelationIdSource::with_width(4);
        assert_eq!(source.next_id(), "0000");
        assert_eq!(source.next_id(), "0001");
        assert_eq!(source.next_id(), "0002");
    }

    #[test]
    fn concurrent_draws_never_repeat() {
        let source = CorrelationIdSource::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let source = Arc::clone(&source);
            handles.push(std::thread::spawn(move || {
                (0..250).map(|_| source.next_id()).collect::<Vec<_>>()
            }));
        }
        let mut all: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let total = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), total);
    }

    #[test]
    fn store_replaces_and_clones() {
        let store = DocumentStore::new();
        store.put("k", Document::element("first"));
        store.put("k", Document::element("second"));
        assert_eq!(store.get("k").unwrap().name, "second");
        assert!(store.get("missing").is_none());
        assert_eq!(store.len(), 1);
    }
}
