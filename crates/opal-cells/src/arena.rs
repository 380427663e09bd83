//! The append-only heap of symbolic cells.

use crate::types::CellType;
use std::fmt;

/// Identifier of an arena cell. Ids are dense and allocation-ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(pub u32);

impl CellId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// A truncation watermark over the arena.
///
/// Captures the cell count and the length of each edge undo log. Restoring
/// rolls every table back to the captured lengths; restoring the same
/// snapshot twice is a no-op the second time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaSnapshot {
    cells: usize,
    has_log: usize,
    dom_log: usize,
    cdm_log: usize,
}

/// The arena: every cell ever allocated, plus per-cell edge tables.
///
/// Cells are never deleted or mutated in place; edges are only appended.
/// Each edge append is mirrored in an undo log so that [`Arena::restore`]
/// can truncate back to a snapshot, including edges that were added to
/// cells allocated before the snapshot was taken.
#[derive(Debug, Clone)]
pub struct Arena {
    types: Vec<CellType>,
    has: Vec<Vec<CellId>>,
    dom: Vec<Option<CellId>>,
    cdm: Vec<Option<CellId>>,
    // Undo logs: owner of each appended `has` edge; (owner, previous value)
    // for each `dom`/`cdm` write.
    has_log: Vec<CellId>,
    dom_log: Vec<(CellId, Option<CellId>)>,
    cdm_log: Vec<(CellId, Option<CellId>)>,
    cell_false: CellId,
    cell_true: CellId,
}

impl Arena {
    /// Create an arena with the two distinguished boolean cells allocated.
    pub fn new() -> Self {
        let mut arena = Arena {
            types: Vec::new(),
            has: Vec::new(),
            dom: Vec::new(),
            cdm: Vec::new(),
            has_log: Vec::new(),
            dom_log: Vec::new(),
            cdm_log: Vec::new(),
            cell_false: CellId(0),
            cell_true: CellId(0),
        };
        arena.cell_false = arena.alloc(CellType::Bool);
        arena.cell_true = arena.alloc(CellType::Bool);
        arena
    }

    /// Append a new cell of the given type.
    pub fn alloc(&mut self, ty: CellType) -> CellId {
        let id = CellId(self.types.len() as u32);
        self.types.push(ty);
        self.has.push(Vec::new());
        self.dom.push(None);
        self.cdm.push(None);
        id
    }

    /// The cell representing the boolean constant `false`.
    pub fn cell_false(&self) -> CellId {
        self.cell_false
    }

    /// The cell representing the boolean constant `true`.
    pub fn cell_true(&self) -> CellId {
        self.cell_true
    }

    /// Number of cells allocated so far.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// The type of a cell.
    pub fn ty(&self, c: CellId) -> &CellType {
        &self.types[c.index()]
    }

    /// Append a membership edge `c -has-> e`.
    pub fn append_has(&mut self, c: CellId, e: CellId) {
        debug_assert_ne!(c, e, "a cell cannot hold itself");
        self.has[c.index()].push(e);
        self.has_log.push(c);
    }

    /// Set the domain edge of `c`.
    pub fn set_dom(&mut self, c: CellId, d: CellId) {
        self.dom_log.push((c, self.dom[c.index()]));
        self.dom[c.index()] = Some(d);
    }

    /// Set the codomain / relation edge of `c`.
    pub fn set_cdm(&mut self, c: CellId, r: CellId) {
        self.cdm_log.push((c, self.cdm[c.index()]));
        self.cdm[c.index()] = Some(r);
    }

    /// The ordered membership list of `c`; empty if no edges were recorded.
    pub fn has(&self, c: CellId) -> &[CellId] {
        &self.has[c.index()]
    }

    pub fn dom(&self, c: CellId) -> Option<CellId> {
        self.dom[c.index()]
    }

    pub fn cdm(&self, c: CellId) -> Option<CellId> {
        self.cdm[c.index()]
    }

    /// Whether `c -has-> e` was recorded.
    pub fn has_edge(&self, c: CellId, e: CellId) -> bool {
        self.has[c.index()].contains(&e)
    }

    /// Capture the current table lengths.
    pub fn snapshot(&self) -> ArenaSnapshot {
        ArenaSnapshot {
            cells: self.types.len(),
            has_log: self.has_log.len(),
            dom_log: self.dom_log.len(),
            cdm_log: self.cdm_log.len(),
        }
    }

    /// Truncate back to a snapshot, undoing edge appends in reverse order
    /// before dropping cells allocated after the snapshot.
    pub fn restore(&mut self, snap: &ArenaSnapshot) {
        while self.has_log.len() > snap.has_log {
            let owner = self.has_log.pop().unwrap();
            self.has[owner.index()].pop();
        }
        while self.dom_log.len() > snap.dom_log {
            let (owner, prev) = self.dom_log.pop().unwrap();
            self.dom[owner.index()] = prev;
        }
        while self.cdm_log.len() > snap.cdm_log {
            let (owner, prev) = self.cdm_log.pop().unwrap();
            self.cdm[owner.index()] = prev;
        }
        self.types.truncate(snap.cells);
        self.has.truncate(snap.cells);
        self.dom.truncate(snap.cells);
        self.cdm.truncate(snap.cells);
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_distinguished_cells() {
        let arena = Arena::new();
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.ty(arena.cell_false()), &CellType::Bool);
        assert_eq!(arena.ty(arena.cell_true()), &CellType::Bool);
        assert_ne!(arena.cell_false(), arena.cell_true());
    }

    #[test]
    fn test_alloc_and_edges() {
        let mut arena = Arena::new();
        let e1 = arena.alloc(CellType::Int);
        let e2 = arena.alloc(CellType::Int);
        let s = arena.alloc(CellType::FinSet(Box::new(CellType::Int)));
        arena.append_has(s, e1);
        arena.append_has(s, e2);
        assert_eq!(arena.has(s), &[e1, e2]);
        assert!(arena.has_edge(s, e1));
        assert!(!arena.has_edge(s, arena.cell_true()));
        assert!(arena.has(e1).is_empty());
        assert_eq!(arena.dom(s), None);
    }

    #[test]
    fn test_snapshot_restore_truncates_cells_and_edges() {
        let mut arena = Arena::new();
        let s = arena.alloc(CellType::FinSet(Box::new(CellType::Int)));
        let e1 = arena.alloc(CellType::Int);
        arena.append_has(s, e1);

        let snap = arena.snapshot();

        let e2 = arena.alloc(CellType::Int);
        arena.append_has(s, e2); // edge into a pre-snapshot cell
        let f = arena.alloc(CellType::Fun(
            Box::new(CellType::Int),
            Box::new(CellType::Int),
        ));
        arena.set_dom(f, s);

        arena.restore(&snap);
        assert_eq!(arena.len(), 4);
        assert_eq!(arena.has(s), &[e1]);

        // Idempotent on the same handle.
        arena.restore(&snap);
        assert_eq!(arena.len(), 4);
        assert_eq!(arena.has(s), &[e1]);
    }

    #[test]
    fn test_restore_rewinds_dom_cdm_overwrites() {
        let mut arena = Arena::new();
        let s1 = arena.alloc(CellType::FinSet(Box::new(CellType::Int)));
        let s2 = arena.alloc(CellType::FinSet(Box::new(CellType::Int)));
        let f = arena.alloc(CellType::Fun(
            Box::new(CellType::Int),
            Box::new(CellType::Int),
        ));
        arena.set_dom(f, s1);
        let snap = arena.snapshot();
        arena.set_dom(f, s2);
        assert_eq!(arena.dom(f), Some(s2));
        arena.restore(&snap);
        assert_eq!(arena.dom(f), Some(s1));
    }

    proptest! {
        /// Arbitrary interleavings of allocations and edge appends after a
        /// snapshot are fully rolled back by restore.
        #[test]
        fn prop_snapshot_restore_roundtrip(ops in proptest::collection::vec(0u8..3, 0..40)) {
            let mut arena = Arena::new();
            let base = arena.alloc(CellType::FinSet(Box::new(CellType::Int)));
            let seed = arena.alloc(CellType::Int);
            arena.append_has(base, seed);

            let snap = arena.snapshot();
            let len_before = arena.len();
            let has_before = arena.has(base).to_vec();

            let mut last = seed;
            for op in ops {
                match op {
                    0 => {
                        last = arena.alloc(CellType::Int);
                    }
                    1 => arena.append_has(base, last),
                    _ => {
                        let f = arena.alloc(CellType::Fun(
                            Box::new(CellType::Int),
                            Box::new(CellType::Int),
                        ));
                        arena.set_dom(f, base);
                    }
                }
            }

            arena.restore(&snap);
            prop_assert_eq!(arena.len(), len_before);
            prop_assert_eq!(arena.has(base), &has_before[..]);
        }
    }
}
