//! registry — typed lookup tables for specialized procedures.
//!
//! Purpose
//! -------
//! Map `(category, key)` pairs to values (usually function objects) so
//! generic engines can ask "is there a specialized routine for this case?"
//! without a hard-coded dispatch chain. The Bayesian engine's conjugate
//! table is one category of such a registry.
//!
//! Key behaviors
//! -------------
//! - Categories are created on first insert.
//! - The first value inserted under a key wins; later inserts are ignored
//!   and reported by the `bool` return.
//! - [`Registry::freeze`] turns every later insert into a no-op, so a table
//!   built at startup cannot change while estimations run.
//! - A lookup miss is `None`, never an error: callers fall back to their
//!   general algorithm.
//!
//! Invariants & assumptions
//! ------------------------
//! - Reads take a shared lock and may run concurrently; inserts take the
//!   exclusive lock. A panic while holding the lock does not make the table
//!   unusable (poisoning is recovered from).
use std::{
    collections::HashMap,
    hash::Hash,
    sync::{
        PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

/// Category-partitioned table from `K` to `V`.
#[derive(Debug)]
pub struct Registry<K, V> {
    tables: RwLock<HashMap<&'static str, HashMap<K, V>>>,
    frozen: AtomicBool,
}

impl<K, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self { tables: RwLock::new(HashMap::new()), frozen: AtomicBool::new(false) }
    }
}

impl<K: Eq + Hash, V: Clone> Registry<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` under `category`/`key`.
    ///
    /// Returns `false` when the key was already taken or the registry is
    /// frozen; the stored value is left as it was.
    pub fn insert(&self, category: &'static str, key: K, value: V) -> bool {
        if self.is_frozen() {
            log::debug!("registry is frozen; ignoring insert into '{category}'");
            return false;
        }
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables.entry(category).or_default();
        if table.contains_key(&key) {
            return false;
        }
        table.insert(key, value);
        true
    }

    /// The value stored under `category`/`key`, if any.
    pub fn lookup(&self, category: &str, key: &K) -> Option<V> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.get(category).and_then(|t| t.get(key)).cloned()
    }

    pub fn contains(&self, category: &str, key: &K) -> bool {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.get(category).is_some_and(|t| t.contains_key(key))
    }

    /// Number of entries in `category`.
    pub fn len(&self, category: &str) -> usize {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.get(category).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.values().all(HashMap::is_empty)
    }

    /// Reject every later insert.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - First-writer-wins inserts and category isolation.
    // - Freezing.
    // - Concurrent readers.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Inserts are kept per category and never overwritten.
    //
    // Given
    // -----
    // - Two inserts under ("update", 1) and one under ("other", 1).
    //
    // Expect
    // ------
    // - The first value stays; the second insert reports false; the other
    //   category is independent; a miss is None.
    fn first_writer_wins() {
        // Arrange
        let r: Registry<u32, &str> = Registry::new();

        // Act
        let first = r.insert("update", 1, "a");
        let second = r.insert("update", 1, "b");
        r.insert("other", 1, "c");

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(r.lookup("update", &1), Some("a"));
        assert_eq!(r.lookup("other", &1), Some("c"));
        assert_eq!(r.lookup("update", &2), None);
        assert_eq!(r.len("update"), 1);
    }

    #[test]
    // Purpose
    // -------
    // A frozen registry ignores inserts.
    //
    // Given
    // -----
    // - One entry, then freeze, then a new key.
    //
    // Expect
    // ------
    // - The new key is absent; the old one is still found.
    fn freeze_blocks_inserts() {
        // Arrange
        let r: Registry<u32, u32> = Registry::new();
        r.insert("c", 1, 10);

        // Act
        r.freeze();
        let added = r.insert("c", 2, 20);

        // Assert
        assert!(r.is_frozen());
        assert!(!added);
        assert!(!r.contains("c", &2));
        assert_eq!(r.lookup("c", &1), Some(10));
    }

    #[test]
    // Purpose
    // -------
    // Concurrent lookups see the same table.
    //
    // Given
    // -----
    // - A shared registry with one entry and four reader threads.
    //
    // Expect
    // ------
    // - Every thread finds the entry.
    fn concurrent_reads() {
        // Arrange
        let r: Arc<Registry<u32, u32>> = Arc::new(Registry::new());
        r.insert("c", 7, 49);

        // Act
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let r = Arc::clone(&r);
                thread::spawn(move || r.lookup("c", &7))
            })
            .collect();

        // Assert
        for h in handles {
            assert_eq!(h.join().expect("reader thread"), Some(49));
        }
    }
}
