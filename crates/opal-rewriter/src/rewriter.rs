//! The rewriter: owner of the arena, the gateway, and the scoped caches.

use crate::cache::EqCache;
use crate::state::SymbState;
use crate::values::{IntCache, StrCache};
use crate::{RwResult, RewriterError};
use opal_cells::{Arena, ArenaSnapshot, CellId, CellType};
use opal_ir::{Expr, ExprKind, IdGen};
use opal_smt::{SmtError, SmtGateway};
use std::rc::Rc;

/// Owns the mutable engine state and keeps the three scope stacks (arena
/// watermarks, cache scopes, solver scopes) in lock-step.
pub struct Rewriter {
    pub arena: Arena,
    pub smt: SmtGateway,
    pub eq_cache: EqCache,
    pub(crate) ints: IntCache,
    pub(crate) strs: StrCache,
    idgen: Rc<IdGen>,
    arena_marks: Vec<ArenaSnapshot>,
}

impl Rewriter {
    pub fn new(idgen: Rc<IdGen>) -> RwResult<Self> {
        Self::with_gateway(idgen, SmtGateway::new())
    }

    /// Build over a pre-configured gateway (script logging, timeouts).
    pub fn with_gateway(idgen: Rc<IdGen>, smt: SmtGateway) -> RwResult<Self> {
        let mut rw = Rewriter {
            arena: Arena::new(),
            smt,
            eq_cache: EqCache::new(),
            ints: IntCache::new(),
            strs: StrCache::new(),
            idgen,
            arena_marks: Vec::new(),
        };
        // Pin the two distinguished boolean cells.
        let t = rw.e_ref(rw.arena.cell_true());
        rw.smt.assert_ground(&rw.arena, &t)?;
        let f = rw.e_ref(rw.arena.cell_false());
        let not_f = rw.expr(ExprKind::Not(Box::new(f)));
        rw.smt.assert_ground(&rw.arena, &not_f)?;
        Ok(rw)
    }

    pub fn idgen(&self) -> &Rc<IdGen> {
        &self.idgen
    }

    /// Current scope depth, identical across arena, caches and solver.
    pub fn level(&self) -> usize {
        self.arena_marks.len()
    }

    /// Open a scope on all three stacks.
    pub fn push(&mut self) {
        self.arena_marks.push(self.arena.snapshot());
        self.eq_cache.push();
        self.ints.push();
        self.strs.push();
        self.smt.push();
    }

    /// Close the innermost scope on all three stacks. The arena and the
    /// caches are restored strictly before the solver pops, so the cache
    /// never claims constraints the solver has already discarded.
    pub fn pop(&mut self) -> RwResult<()> {
        let mark = self
            .arena_marks
            .pop()
            .ok_or(SmtError::PopUnderflow)?;
        self.arena.restore(&mark);
        self.eq_cache.pop();
        self.ints.pop();
        self.strs.pop();
        self.smt.pop()?;
        Ok(())
    }

    pub fn pop_n(&mut self, n: usize) -> RwResult<()> {
        for _ in 0..n {
            self.pop()?;
        }
        Ok(())
    }

    /// Drive the focused expression until it is a cell reference or a
    /// boolean literal. Failing to find an applicable rule is fatal.
    pub fn rewrite_until_done(&mut self, state: SymbState) -> RwResult<SymbState> {
        let mut state = state;
        while !state.focus.is_terminal() {
            state = self.apply_rule(state)?;
        }
        Ok(state)
    }

    /// The arena cell behind a terminal focus.
    pub fn focus_cell(&self, state: &SymbState) -> RwResult<CellId> {
        match &state.focus.kind {
            ExprKind::CellRef(c) => Ok(*c),
            ExprKind::Bool(true) => Ok(self.arena.cell_true()),
            ExprKind::Bool(false) => Ok(self.arena.cell_false()),
            _ => Err(RewriterError::MalformedIr {
                node: state.focus.id,
                detail: "focus is not terminal".into(),
                expr: state.focus.to_string(),
            }),
        }
    }

    /// Allocate a fresh boolean cell.
    pub(crate) fn mk_bool_cell(&mut self) -> CellId {
        self.arena.alloc(CellType::Bool)
    }

    // === IR construction helpers ===

    pub(crate) fn expr(&self, kind: ExprKind) -> Expr {
        Expr::new(&self.idgen, kind)
    }

    pub(crate) fn e_ref(&self, c: CellId) -> Expr {
        self.expr(ExprKind::CellRef(c))
    }

    pub(crate) fn e_bool(&self, b: bool) -> Expr {
        self.expr(ExprKind::Bool(b))
    }

    pub(crate) fn e_int(&self, n: i64) -> Expr {
        self.expr(ExprKind::Int(n))
    }

    pub(crate) fn e_in(&self, e: CellId, s: CellId) -> Expr {
        self.expr(ExprKind::InSet(e, s))
    }

    pub(crate) fn e_and(&self, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::And(args))
    }

    pub(crate) fn e_or(&self, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Or(args))
    }

    pub(crate) fn e_not(&self, a: Expr) -> Expr {
        self.expr(ExprKind::Not(Box::new(a)))
    }

    pub(crate) fn e_implies(&self, a: Expr, b: Expr) -> Expr {
        self.expr(ExprKind::Implies(Box::new(a), Box::new(b)))
    }

    pub(crate) fn e_iff(&self, a: Expr, b: Expr) -> Expr {
        self.expr(ExprKind::Iff(Box::new(a), Box::new(b)))
    }

    pub(crate) fn e_eq(&self, a: Expr, b: Expr) -> Expr {
        self.expr(ExprKind::Eq(Box::new(a), Box::new(b)))
    }

    pub(crate) fn e_eq_cells(&self, a: CellId, b: CellId) -> Expr {
        self.e_eq(self.e_ref(a), self.e_ref(b))
    }

    pub(crate) fn intern_int(&mut self, n: i64) -> RwResult<CellId> {
        let gen = self.idgen.clone();
        self.ints.intern(&mut self.arena, &mut self.smt, &gen, n)
    }

    pub(crate) fn intern_str(&mut self, s: &str) -> RwResult<CellId> {
        let gen = self.idgen.clone();
        self.strs.intern(&mut self.arena, &mut self.smt, &gen, s)
    }
}
