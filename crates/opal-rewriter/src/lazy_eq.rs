//! Lazy structural equality over arena cells.
//!
//! Equality of structured cells is not a solver primitive: it holds exactly
//! when the structural constraints generated here say it does. The engine
//! builds those constraints at most once per cell pair, asserts them, and
//! records in the [`EqCache`](crate::cache::EqCache) how the pair may be
//! referred to afterwards: native solver equality when the cells share a
//! sort, a proxy boolean cell when they do not.

use crate::cache::EqEntry;
use crate::rewriter::Rewriter;
use crate::{RwResult, RewriterError};
use opal_cells::{CellId, CellType};
use opal_ir::{ArithOp, CmpOp, Expr, ExprKind};
use std::collections::BTreeMap;
use tracing::trace;

impl Rewriter {
    /// Boolean IR term asserting `a = b`.
    ///
    /// Preconditions: the cell types are comparable and the pair's
    /// constraints have been cached with [`Rewriter::cache_eq`]. Violations
    /// are programmer errors and fatal. Identity short-circuits to `true`
    /// without consulting the cache.
    pub fn safe_eq(&self, a: CellId, b: CellId) -> RwResult<Expr> {
        if a == b {
            return Ok(self.e_bool(true));
        }
        let ta = self.arena.ty(a);
        let tb = self.arena.ty(b);
        if !ta.comparable_to(tb) {
            return Err(RewriterError::IncomparableTypes {
                a,
                b,
                ta: ta.to_string(),
                tb: tb.to_string(),
            });
        }
        match self.eq_cache.get(a, b) {
            Some(EqEntry::True) => Ok(self.e_bool(true)),
            Some(EqEntry::False) => Ok(self.e_bool(false)),
            Some(EqEntry::Native) => Ok(self.e_eq_cells(a, b)),
            Some(EqEntry::Pred(p)) => Ok(self.e_ref(p)),
            None => Err(RewriterError::UncachedEquality { a, b }),
        }
    }

    /// Like [`Rewriter::safe_eq`], but incomparable types yield the literal
    /// `false` instead of an error. No cache entry is installed for them.
    pub fn cached_eq(&self, a: CellId, b: CellId) -> RwResult<Expr> {
        if a == b {
            return Ok(self.e_bool(true));
        }
        if !self.arena.ty(a).comparable_to(self.arena.ty(b)) {
            return Ok(self.e_bool(false));
        }
        self.safe_eq(a, b)
    }

    /// Generate and assert the structural equality constraints for a pair
    /// of comparable cells, installing the cache entry that makes
    /// [`Rewriter::safe_eq`] answerable. Idempotent.
    pub fn cache_eq(&mut self, a: CellId, b: CellId) -> RwResult<()> {
        if a == b || self.eq_cache.contains(a, b) {
            return Ok(());
        }
        let ta = self.arena.ty(a).clone();
        let tb = self.arena.ty(b).clone();
        if !ta.comparable_to(&tb) {
            return Err(RewriterError::IncomparableTypes {
                a,
                b,
                ta: ta.to_string(),
                tb: tb.to_string(),
            });
        }
        trace!(a = %a, b = %b, ty = %ta, "caching equality constraints");
        match (&ta, &tb) {
            _ if ta.is_scalar() && tb.is_scalar() => {
                // Native sorts; the solver decides scalar equality directly.
                self.eq_cache.put(a, b, EqEntry::Native);
                Ok(())
            }
            (CellType::FinSet(_), CellType::FinSet(_)) => self.cache_set_eq(a, b),
            (CellType::Fun(_, _), CellType::Fun(_, _)) => self.cache_fun_eq(a, b),
            (CellType::FinFunSet(_, _), CellType::FinFunSet(_, _)) => {
                self.cache_funset_eq(a, b)
            }
            (CellType::Record(fa), CellType::Record(fb)) => {
                let (fa, fb) = (fa.clone(), fb.clone());
                self.cache_record_eq(a, b, &fa, &fb)
            }
            (CellType::Tuple(_), CellType::Tuple(_)) => self.cache_tuple_eq(a, b),
            (CellType::Seq(_), CellType::Seq(_)) => self.cache_seq_eq(a, b),
            _ => Err(RewriterError::IncomparableTypes {
                a,
                b,
                ta: ta.to_string(),
                tb: tb.to_string(),
            }),
        }
    }

    /// Bulk form of [`Rewriter::cache_eq`]: caches every comparable,
    /// non-identical pair and skips the rest.
    pub fn cache_eq_all(
        &mut self,
        pairs: impl IntoIterator<Item = (CellId, CellId)>,
    ) -> RwResult<()> {
        for (a, b) in pairs {
            if a == b || self.eq_cache.contains(a, b) {
                continue;
            }
            if !self.arena.ty(a).comparable_to(self.arena.ty(b)) {
                continue;
            }
            self.cache_eq(a, b)?;
        }
        Ok(())
    }

    /// Declare a pair equal without generating constraints.
    ///
    /// Reserved for call sites that can prove the equality by construction,
    /// e.g. both cells were picked from the same already-constrained pool.
    /// Any other use makes the encoding unsound: the solver will happily
    /// equate cells whose structure was never related.
    pub fn assume_equal_unchecked(&mut self, a: CellId, b: CellId) {
        debug_assert_eq!(
            self.arena.ty(a).signature(),
            self.arena.ty(b).signature(),
            "by-construction equality requires a shared sort"
        );
        self.eq_cache.put(a, b, EqEntry::Native);
    }

    /// Boolean IR term for `L ⊆ R` over the stored members.
    ///
    /// Every per-element disjunct is materialised as a fresh boolean cell
    /// rather than inlined, which keeps the formula linear in the number of
    /// elements instead of quadratic once subset terms nest inside set
    /// equalities.
    pub fn subset_eq(&mut self, l: CellId, r: CellId) -> RwResult<Expr> {
        let elems_l = self.arena.has(l).to_vec();
        let elems_r = self.arena.has(r).to_vec();
        if elems_l.is_empty() {
            return Ok(self.e_bool(true));
        }
        if elems_r.is_empty() {
            let conj: Vec<Expr> = elems_l
                .iter()
                .map(|&e| self.e_not(self.e_in(e, l)))
                .collect();
            return Ok(self.e_and(conj));
        }
        let cross = elems_l
            .iter()
            .flat_map(|&x| elems_r.iter().map(move |&y| (x, y)))
            .collect::<Vec<_>>();
        self.cache_eq_all(cross)?;

        let mut conj = Vec::with_capacity(elems_l.len());
        for &e in &elems_l {
            let mut disj = vec![self.e_not(self.e_in(e, l))];
            for &m in &elems_r {
                let eq = self.cached_eq(e, m)?;
                if matches!(eq.kind, ExprKind::Bool(false)) {
                    continue;
                }
                disj.push(self.e_and(vec![self.e_in(m, r), eq]));
            }
            let or = self.e_or(disj);
            let p = self.materialize(or)?;
            conj.push(self.e_ref(p));
        }
        Ok(self.e_and(conj))
    }

    /// Bind a non-constant boolean expression to a fresh cell via an
    /// equivalence assertion; constants and cell references pass through.
    pub fn materialize(&mut self, ex: Expr) -> RwResult<CellId> {
        match ex.kind {
            ExprKind::Bool(true) => Ok(self.arena.cell_true()),
            ExprKind::Bool(false) => Ok(self.arena.cell_false()),
            ExprKind::CellRef(c) => Ok(c),
            _ => {
                let p = self.mk_bool_cell();
                let iff = self.e_iff(self.e_ref(p), ex);
                self.smt.assert_ground(&self.arena, &iff)?;
                Ok(p)
            }
        }
    }

    // === Per-family constraint generators ===

    /// Assert `(a = b) ⇔ phi` and install the entry. Pairs with a shared
    /// sort get `Native`: after the equivalence is asserted, native solver
    /// equality is sound and every later reference short-circuits. Pairs
    /// without a shared sort get a `Pred` proxy cell instead.
    fn install_eq(&mut self, a: CellId, b: CellId, phi: Expr) -> RwResult<()> {
        if self.arena.ty(a).signature() == self.arena.ty(b).signature() {
            let eq = self.e_eq_cells(a, b);
            let iff = self.e_iff(eq, phi);
            self.smt.assert_ground(&self.arena, &iff)?;
            self.eq_cache.put(a, b, EqEntry::Native);
        } else {
            let p = self.materialize(phi)?;
            self.eq_cache.put(a, b, EqEntry::Pred(p));
        }
        Ok(())
    }

    fn cache_set_eq(&mut self, a: CellId, b: CellId) -> RwResult<()> {
        let empty_a = self.arena.has(a).is_empty();
        let empty_b = self.arena.has(b).is_empty();
        if empty_a && empty_b {
            self.eq_cache.put(a, b, EqEntry::True);
            return Ok(());
        }
        let ab = self.subset_eq(a, b)?;
        let ba = self.subset_eq(b, a)?;
        let phi = self.e_and(vec![ab, ba]);
        self.install_eq(a, b, phi)
    }

    fn cache_fun_eq(&mut self, a: CellId, b: CellId) -> RwResult<()> {
        let ra = self.arena.cdm(a).ok_or(RewriterError::MalformedCell {
            cell: a,
            detail: "function without a relation edge".into(),
        })?;
        let rb = self.arena.cdm(b).ok_or(RewriterError::MalformedCell {
            cell: b,
            detail: "function without a relation edge".into(),
        })?;
        // A function is its relation: equality reduces to set equality of
        // the two graphs.
        self.cache_eq(ra, rb)?;
        let phi = self.safe_eq(ra, rb)?;
        self.install_eq(a, b, phi)
    }

    fn cache_funset_eq(&mut self, a: CellId, b: CellId) -> RwResult<()> {
        let da = self.dom_of(a)?;
        let db = self.dom_of(b)?;
        let ca = self.cdm_of(a)?;
        let cb = self.cdm_of(b)?;
        self.cache_eq(da, db)?;
        self.cache_eq(ca, cb)?;
        let dom_eq = self.safe_eq(da, db)?;
        let cdm_eq = self.safe_eq(ca, cb)?;
        let phi = self.e_and(vec![dom_eq, cdm_eq]);
        self.install_eq(a, b, phi)
    }

    fn cache_record_eq(
        &mut self,
        a: CellId,
        b: CellId,
        fields_a: &BTreeMap<String, CellType>,
        fields_b: &BTreeMap<String, CellType>,
    ) -> RwResult<()> {
        let da = self.dom_of(a)?;
        let db = self.dom_of(b)?;
        self.check_record_shape(a, fields_a, da)?;
        self.check_record_shape(b, fields_b, db)?;
        self.cache_eq(da, db)?;

        let mut conj = vec![self.safe_eq(da, db)?];
        let keys_a: Vec<&String> = fields_a.keys().collect();
        let keys_b: Vec<&String> = fields_b.keys().collect();

        for (idx_a, name) in keys_a.iter().enumerate() {
            let key_a = self.arena.has(da)[idx_a];
            match keys_b.iter().position(|k| k == name) {
                Some(idx_b) => {
                    let va = self.arena.has(a)[idx_a];
                    let vb = self.arena.has(b)[idx_b];
                    self.cache_eq(va, vb)?;
                    let field_eq = self.safe_eq(va, vb)?;
                    let guard = self.e_in(key_a, da);
                    conj.push(self.e_implies(guard, field_eq));
                }
                None => {
                    // Field only on one side: the records can only be equal
                    // if the instance does not actually carry it.
                    conj.push(self.e_not(self.e_in(key_a, da)));
                }
            }
        }
        for (idx_b, name) in keys_b.iter().enumerate() {
            if !keys_a.iter().any(|k| k == name) {
                let key_b = self.arena.has(db)[idx_b];
                conj.push(self.e_not(self.e_in(key_b, db)));
            }
        }

        let phi = self.e_and(conj);
        self.install_eq(a, b, phi)
    }

    fn cache_tuple_eq(&mut self, a: CellId, b: CellId) -> RwResult<()> {
        let elems_a = self.arena.has(a).to_vec();
        let elems_b = self.arena.has(b).to_vec();
        if elems_a.len() != elems_b.len() {
            return Err(RewriterError::MalformedCell {
                cell: a,
                detail: format!(
                    "tuple arity mismatch: {} vs {}",
                    elems_a.len(),
                    elems_b.len()
                ),
            });
        }
        let mut conj = Vec::with_capacity(elems_a.len());
        for (&x, &y) in elems_a.iter().zip(&elems_b) {
            self.cache_eq(x, y)?;
            conj.push(self.safe_eq(x, y)?);
        }
        let phi = self.e_and(conj);
        self.install_eq(a, b, phi)
    }

    fn cache_seq_eq(&mut self, a: CellId, b: CellId) -> RwResult<()> {
        let (start_a, end_a, xs) = self.seq_layout(a)?;
        let (start_b, end_b, ys) = self.seq_layout(b)?;

        let cross = xs
            .iter()
            .flat_map(|&x| ys.iter().map(move |&y| (x, y)))
            .collect::<Vec<_>>();
        self.cache_eq_all(cross)?;

        // Equal logical lengths.
        let len_a = self.seq_len_expr(start_a, end_a);
        let len_b = self.seq_len_expr(start_b, end_b);
        let mut conj = vec![self.e_eq(len_a, len_b)];

        // Elements aligned at the same logical position must agree. The
        // windows are symbolic, so alignment is guarded per physical pair.
        for (i, &x) in xs.iter().enumerate() {
            for (j, &y) in ys.iter().enumerate() {
                let eq = self.cached_eq(x, y)?;
                if matches!(eq.kind, ExprKind::Bool(true)) {
                    continue;
                }
                let pos_a = self.offset_expr(i as i64, start_a);
                let pos_b = self.offset_expr(j as i64, start_b);
                let aligned = self.e_eq(pos_a, pos_b);
                let after_start = self.expr(ExprKind::Cmp {
                    op: CmpOp::Ge,
                    left: Box::new(self.e_int(i as i64)),
                    right: Box::new(self.e_ref(start_a)),
                });
                let before_end = self.expr(ExprKind::Cmp {
                    op: CmpOp::Lt,
                    left: Box::new(self.e_int(i as i64)),
                    right: Box::new(self.e_ref(end_a)),
                });
                let guard = self.e_and(vec![aligned, after_start, before_end]);
                let imp = self.e_implies(guard, eq);
                let p = self.materialize(imp)?;
                conj.push(self.e_ref(p));
            }
        }

        let phi = self.e_and(conj);
        self.install_eq(a, b, phi)
    }

    // === Shape accessors ===

    fn dom_of(&self, c: CellId) -> RwResult<CellId> {
        self.arena.dom(c).ok_or(RewriterError::MalformedCell {
            cell: c,
            detail: "missing domain edge".into(),
        })
    }

    fn cdm_of(&self, c: CellId) -> RwResult<CellId> {
        self.arena.cdm(c).ok_or(RewriterError::MalformedCell {
            cell: c,
            detail: "missing codomain edge".into(),
        })
    }

    fn check_record_shape(
        &self,
        rec: CellId,
        fields: &BTreeMap<String, CellType>,
        dom: CellId,
    ) -> RwResult<()> {
        if self.arena.has(rec).len() != fields.len() || self.arena.has(dom).len() != fields.len()
        {
            return Err(RewriterError::MalformedCell {
                cell: rec,
                detail: "record edges do not match its field schema".into(),
            });
        }
        Ok(())
    }

    /// `(start, end, contents)` of a sequence cell.
    fn seq_layout(&self, c: CellId) -> RwResult<(CellId, CellId, Vec<CellId>)> {
        let edges = self.arena.has(c);
        if edges.len() < 2 {
            return Err(RewriterError::MalformedCell {
                cell: c,
                detail: "sequence without start/end markers".into(),
            });
        }
        Ok((edges[0], edges[1], edges[2..].to_vec()))
    }

    fn seq_len_expr(&self, start: CellId, end: CellId) -> Expr {
        self.expr(ExprKind::Arith {
            op: ArithOp::Sub,
            left: Box::new(self.e_ref(end)),
            right: Box::new(self.e_ref(start)),
        })
    }

    /// Logical position of physical index `i` relative to `start`.
    fn offset_expr(&self, i: i64, start: CellId) -> Expr {
        self.expr(ExprKind::Arith {
            op: ArithOp::Sub,
            left: Box::new(self.e_int(i)),
            right: Box::new(self.e_ref(start)),
        })
    }
}
