//! Lock-step scope stack: arena, caches, and solver rewind together.

use opal_cells::CellType;
use opal_ir::{Expr, ExprKind, IdGen};
use opal_rewriter::{Rewriter, SymbState};
use opal_smt::SatOutcome;
use proptest::prelude::*;
use std::rc::Rc;

fn new_rewriter() -> (Rc<IdGen>, Rewriter) {
    let gen = Rc::new(IdGen::new());
    let rw = Rewriter::new(gen.clone()).unwrap();
    (gen, rw)
}

#[test]
fn push_pop_to_depth_zero_restores_everything() {
    let (gen, mut rw) = new_rewriter();

    // Ground work at depth 0.
    let base = rw
        .rewrite_until_done(SymbState::new(Expr::new(
            &gen,
            ExprKind::Enum(vec![
                Expr::new(&gen, ExprKind::Int(1)),
                Expr::new(&gen, ExprKind::Int(2)),
            ]),
        )))
        .unwrap();
    let base_set = rw.focus_cell(&base).unwrap();

    let arena_len = rw.arena.len();
    let cache_len = rw.eq_cache.len();
    assert_eq!(rw.level(), 0);

    rw.push();
    rw.push();

    // Scope work: new cells, new cache entries, new assertions.
    let scoped = rw
        .rewrite_until_done(SymbState::new(Expr::new(
            &gen,
            ExprKind::Enum(vec![Expr::new(&gen, ExprKind::Int(1))]),
        )))
        .unwrap();
    let scoped_set = rw.focus_cell(&scoped).unwrap();
    rw.cache_eq(base_set, scoped_set).unwrap();
    assert!(rw.eq_cache.len() > cache_len);
    assert!(rw.arena.len() > arena_len);

    rw.pop().unwrap();
    rw.pop().unwrap();

    assert_eq!(rw.level(), 0);
    assert_eq!(rw.arena.len(), arena_len);
    assert_eq!(rw.eq_cache.len(), cache_len);
    assert_eq!(rw.smt.level(), 0);
}

#[test]
fn popped_assertions_are_invisible() {
    let (gen, mut rw) = new_rewriter();
    let flag = rw.arena.alloc(CellType::Bool);
    let flag_ref = Expr::new(&gen, ExprKind::CellRef(flag));

    rw.push();
    rw.smt.assert_ground(&rw.arena, &flag_ref).unwrap();
    assert_eq!(rw.smt.sat(), SatOutcome::Sat);
    rw.pop().unwrap();

    // The scope's constraint on `flag` is gone.
    let not_flag = Expr::new(&gen, ExprKind::Not(Box::new(flag_ref)));
    rw.smt.assert_ground(&rw.arena, &not_flag).unwrap();
    assert_eq!(rw.smt.sat(), SatOutcome::Sat);
}

#[test]
fn snapshots_survive_pushes_taken_after_them() {
    let (_gen, mut rw) = new_rewriter();
    let snap_arena = rw.arena.snapshot();
    let snap_cache = rw.eq_cache.snapshot();

    rw.push();
    let a = rw.arena.alloc(CellType::Int);
    let b = rw.arena.alloc(CellType::Int);
    rw.cache_eq(a, b).unwrap();
    rw.push();
    let _ = rw.arena.alloc(CellType::Bool);

    // Recover straight through two pushes.
    rw.eq_cache.recover(&snap_cache);
    rw.arena.restore(&snap_arena);
    assert_eq!(rw.arena.len(), 2);
    assert!(rw.eq_cache.is_empty());
    assert_eq!(rw.eq_cache.level(), 0);
}

proptest! {
    /// Any balanced sequence of scoped operations leaves arena and cache
    /// pointwise at their initial state once depth 0 is reached again.
    #[test]
    fn prop_balanced_scopes_restore_initial_state(ops in proptest::collection::vec(0u8..4, 1..30)) {
        let (_gen, mut rw) = new_rewriter();
        let arena_len = rw.arena.len();
        let cache_len = rw.eq_cache.len();

        let mut depth = 0usize;
        let mut last_int = None;
        for op in ops {
            match op {
                0 => {
                    rw.push();
                    depth += 1;
                }
                1 => {
                    if depth > 0 {
                        rw.pop().unwrap();
                        depth -= 1;
                    }
                }
                // Mutations only inside scopes, so depth 0 is the baseline.
                2 if depth > 0 => {
                    let c = rw.arena.alloc(CellType::Int);
                    if let Some(prev) = last_int {
                        rw.cache_eq(prev, c).unwrap();
                    }
                    last_int = Some(c);
                }
                3 if depth > 0 => {
                    let s = rw.arena.alloc(CellType::FinSet(Box::new(CellType::Int)));
                    if let Some(prev) = last_int {
                        rw.arena.append_has(s, prev);
                    }
                }
                _ => {}
            }
            // Cells allocated inside scopes vanish on pop; forget them.
            if op == 1 {
                last_int = None;
            }
        }
        rw.pop_n(depth).unwrap();

        prop_assert_eq!(rw.level(), 0);
        prop_assert_eq!(rw.arena.len(), arena_len);
        prop_assert_eq!(rw.eq_cache.len(), cache_len);
        prop_assert_eq!(rw.smt.level(), 0);
    }
}
