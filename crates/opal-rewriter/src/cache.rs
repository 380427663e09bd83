//! The equality constraint cache.

use crate::scoped::{MapSnapshot, ScopedMap};
use opal_cells::CellId;

/// What is known about the equality of a cell pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EqEntry {
    /// Proven equal.
    True,
    /// Proven unequal.
    False,
    /// Structural constraints are asserted; native solver equality over the
    /// cells' shared sort is sound from now on.
    Native,
    /// Equality is equivalent to the given boolean cell. Used when the two
    /// cells do not share a solver sort (statically empty sets and
    /// containers built over them).
    Pred(CellId),
}

/// Scoped mapping from unordered cell pairs to equality entries. Push/pop
/// depth mirrors the solver's scope stack so that no entry outlives the
/// assertions that justify it.
#[derive(Debug, Clone, Default)]
pub struct EqCache {
    inner: ScopedMap<(CellId, CellId), EqEntry>,
}

fn key(a: CellId, b: CellId) -> (CellId, CellId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl EqCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, a: CellId, b: CellId) -> Option<EqEntry> {
        self.inner.get(&key(a, b)).copied()
    }

    pub fn contains(&self, a: CellId, b: CellId) -> bool {
        self.inner.contains(&key(a, b))
    }

    pub fn put(&mut self, a: CellId, b: CellId, entry: EqEntry) {
        self.inner.insert(key(a, b), entry);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn level(&self) -> usize {
        self.inner.level()
    }

    pub fn push(&mut self) {
        self.inner.push();
    }

    pub fn pop(&mut self) {
        self.inner.pop();
    }

    pub fn snapshot(&self) -> MapSnapshot {
        self.inner.snapshot()
    }

    pub fn recover(&mut self, snap: &MapSnapshot) {
        self.inner.recover(snap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pairs_are_unordered() {
        let mut cache = EqCache::new();
        let (a, b) = (CellId(3), CellId(7));
        cache.put(b, a, EqEntry::Native);
        assert_eq!(cache.get(a, b), Some(EqEntry::Native));
        assert_eq!(cache.get(b, a), Some(EqEntry::Native));
    }

    #[test]
    fn test_entries_do_not_survive_pop() {
        let mut cache = EqCache::new();
        cache.put(CellId(1), CellId(2), EqEntry::True);
        cache.push();
        cache.put(CellId(3), CellId(4), EqEntry::Pred(CellId(9)));
        assert_eq!(cache.len(), 2);
        cache.pop();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(CellId(3), CellId(4)), None);
        assert_eq!(cache.get(CellId(1), CellId(2)), Some(EqEntry::True));
    }
}
