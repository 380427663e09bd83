//! Scoped caches of literal-valued cells.
//!
//! Integer and string literals are interned: the same literal yields the
//! same cell while its scope is alive, so literal equalities short-circuit
//! to identity. String cells are constrained to distinct integer ids, the
//! same interning the solver-level encoding uses for the `Str` sort.

use crate::scoped::ScopedMap;
use crate::RwResult;
use opal_cells::{Arena, CellId, CellType};
use opal_ir::{Expr, ExprKind, IdGen};
use opal_smt::SmtGateway;

/// Cells holding integer literals.
#[derive(Debug, Default)]
pub struct IntCache {
    inner: ScopedMap<i64, CellId>,
}

impl IntCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(
        &mut self,
        arena: &mut Arena,
        smt: &mut SmtGateway,
        gen: &IdGen,
        n: i64,
    ) -> RwResult<CellId> {
        if let Some(c) = self.inner.get(&n) {
            return Ok(*c);
        }
        let c = arena.alloc(CellType::Int);
        let eq = Expr::new(
            gen,
            ExprKind::Eq(
                Box::new(Expr::new(gen, ExprKind::CellRef(c))),
                Box::new(Expr::new(gen, ExprKind::Int(n))),
            ),
        );
        smt.assert_ground(arena, &eq)?;
        self.inner.insert(n, c);
        Ok(c)
    }

    pub fn push(&mut self) {
        self.inner.push();
    }

    pub fn pop(&mut self) {
        self.inner.pop();
    }
}

/// Cells holding string literals, interned to distinct integer ids.
#[derive(Debug, Default)]
pub struct StrCache {
    inner: ScopedMap<String, (CellId, i64)>,
    // Ids are never reused, even across pops: distinctness of live cells
    // must not depend on scope history.
    next_id: i64,
}

impl StrCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(
        &mut self,
        arena: &mut Arena,
        smt: &mut SmtGateway,
        gen: &IdGen,
        s: &str,
    ) -> RwResult<CellId> {
        if let Some((c, _)) = self.inner.get(&s.to_string()) {
            return Ok(*c);
        }
        let c = arena.alloc(CellType::Str);
        let id = self.next_id;
        self.next_id += 1;
        let eq = Expr::new(
            gen,
            ExprKind::Eq(
                Box::new(Expr::new(gen, ExprKind::CellRef(c))),
                Box::new(Expr::new(gen, ExprKind::Int(id))),
            ),
        );
        smt.assert_ground(arena, &eq)?;
        self.inner.insert(s.to_string(), (c, id));
        Ok(c)
    }

    /// Reverse lookup of an interned id, for model decoding.
    pub fn resolve(&self, id: i64) -> Option<&str> {
        self.inner
            .iter()
            .find(|(_, (_, i))| *i == id)
            .map(|(s, _)| s.as_str())
    }

    pub fn push(&mut self) {
        self.inner.push();
    }

    pub fn pop(&mut self) {
        self.inner.pop();
    }
}
