//! Scoped associative map with undo-log rollback.
//!
//! Backs the equality cache and the literal value caches. Every insert is
//! journaled; `push` marks the journal, `pop` unwinds to the last mark.
//! Snapshots are journal positions, so they stay valid across pushes taken
//! after them and can be recovered without knowing how many scopes were
//! opened in between.

use std::collections::HashMap;
use std::hash::Hash;

/// A recoverable point in a scoped map's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapSnapshot {
    log_len: usize,
    scope_depth: usize,
}

#[derive(Debug, Clone)]
pub struct ScopedMap<K, V> {
    map: HashMap<K, V>,
    log: Vec<(K, Option<V>)>,
    scopes: Vec<usize>,
}

impl<K: Eq + Hash + Clone, V: Clone> ScopedMap<K, V> {
    pub fn new() -> Self {
        ScopedMap {
            map: HashMap::new(),
            log: Vec::new(),
            scopes: Vec::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn insert(&mut self, key: K, value: V) {
        let prev = self.map.insert(key.clone(), value);
        self.log.push((key, prev));
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.map.iter()
    }

    /// Current scope depth.
    pub fn level(&self) -> usize {
        self.scopes.len()
    }

    /// Open a scope: inserts made from here are discarded by the matching
    /// [`ScopedMap::pop`].
    pub fn push(&mut self) {
        self.scopes.push(self.log.len());
    }

    /// Close the innermost scope, undoing its inserts in reverse order.
    pub fn pop(&mut self) {
        debug_assert!(!self.scopes.is_empty(), "pop below the bottom scope");
        if let Some(mark) = self.scopes.pop() {
            self.unwind_to(mark);
        }
    }

    /// Capture the current history position.
    pub fn snapshot(&self) -> MapSnapshot {
        MapSnapshot {
            log_len: self.log.len(),
            scope_depth: self.scopes.len(),
        }
    }

    /// Roll back to a snapshot, discarding inserts and scopes made after it.
    pub fn recover(&mut self, snap: &MapSnapshot) {
        self.unwind_to(snap.log_len);
        self.scopes.truncate(snap.scope_depth);
    }

    fn unwind_to(&mut self, mark: usize) {
        while self.log.len() > mark {
            let (key, prev) = self.log.pop().unwrap();
            match prev {
                Some(v) => {
                    self.map.insert(key, v);
                }
                None => {
                    self.map.remove(&key);
                }
            }
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for ScopedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut m = ScopedMap::new();
        m.insert("a", 1);
        assert_eq!(m.get(&"a"), Some(&1));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_pop_discards_scope_inserts() {
        let mut m = ScopedMap::new();
        m.insert("a", 1);
        m.push();
        m.insert("b", 2);
        m.insert("a", 10); // overwrite inside the scope
        assert_eq!(m.get(&"a"), Some(&10));
        m.pop();
        assert_eq!(m.get(&"a"), Some(&1));
        assert_eq!(m.get(&"b"), None);
        assert_eq!(m.level(), 0);
    }

    #[test]
    fn test_nested_scopes() {
        let mut m = ScopedMap::new();
        m.push();
        m.insert("x", 1);
        m.push();
        m.insert("y", 2);
        m.pop();
        assert!(m.contains(&"x"));
        assert!(!m.contains(&"y"));
        m.pop();
        assert!(m.is_empty());
    }

    #[test]
    fn test_snapshot_recover_across_scopes() {
        let mut m = ScopedMap::new();
        m.insert("a", 1);
        let snap = m.snapshot();
        m.push();
        m.insert("b", 2);
        m.push();
        m.insert("c", 3);
        m.recover(&snap);
        assert_eq!(m.len(), 1);
        assert_eq!(m.level(), 0);
        assert_eq!(m.get(&"a"), Some(&1));
        // Recover is idempotent.
        m.recover(&snap);
        assert_eq!(m.len(), 1);
    }
}
