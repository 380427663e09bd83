//! Rewrite rules, one per IR operator.
//!
//! Dispatch is a tagged match over the focused operator: applicability is
//! decided by the operator alone, so rules are mutually exclusive by
//! construction and the driver takes the single match. Each rule rewrites
//! its sub-expressions left to right (threading the binding environment),
//! allocates cells for its result, wires edges, asserts the constraints
//! linking inputs to the result, and leaves the result cell in focus.
//! Rules never retract or rewrite previously asserted constraints.

use crate::rewriter::Rewriter;
use crate::state::SymbState;
use crate::{RwResult, RewriterError};
use opal_cells::{CellId, CellType};
use opal_ir::{Expr, ExprKind};

impl Rewriter {
    pub(crate) fn apply_rule(&mut self, state: SymbState) -> RwResult<SymbState> {
        let focus = state.focus.clone();
        match focus.kind {
            // Terminal forms never reach this point via the driver.
            ExprKind::Bool(_) | ExprKind::CellRef(_) => Ok(state),

            ExprKind::Int(n) => {
                let c = self.intern_int(n)?;
                Ok(state.with_focus(self.e_ref(c)))
            }
            ExprKind::Str(ref s) => {
                let c = self.intern_str(s)?;
                Ok(state.with_focus(self.e_ref(c)))
            }

            ExprKind::Name(ref name) => match state.lookup(name) {
                Some(c) => Ok(state.with_focus(self.e_ref(c))),
                None => Err(RewriterError::UnboundName {
                    name: name.clone(),
                    node: focus.id,
                }),
            },
            ExprKind::Prime(ref name) => {
                let key = SymbState::primed_key(name);
                match state.lookup(&key) {
                    Some(c) => Ok(state.with_focus(self.e_ref(c))),
                    None => Err(RewriterError::UnboundName {
                        name: key,
                        node: focus.id,
                    }),
                }
            }

            ExprKind::InSet(_, _) => {
                let p = self.materialize(focus)?;
                Ok(state.with_focus(self.e_ref(p)))
            }

            ExprKind::And(args) => self.rule_junction(state, args, true),
            ExprKind::Or(args) => self.rule_junction(state, args, false),

            ExprKind::Not(arg) => {
                let st = self.rewrite_until_done(state.with_focus(*arg))?;
                let c = self.focus_cell(&st)?;
                let p = self.materialize(self.e_not(self.e_ref(c)))?;
                Ok(st.with_focus(self.e_ref(p)))
            }
            ExprKind::Implies(lhs, rhs) => {
                let st = self.rewrite_until_done(state.with_focus(*lhs))?;
                let lc = self.focus_cell(&st)?;
                let st = self.rewrite_until_done(st.with_focus(*rhs))?;
                let rc = self.focus_cell(&st)?;
                let p = self.materialize(self.e_implies(self.e_ref(lc), self.e_ref(rc)))?;
                Ok(st.with_focus(self.e_ref(p)))
            }
            ExprKind::Iff(lhs, rhs) => {
                let st = self.rewrite_until_done(state.with_focus(*lhs))?;
                let lc = self.focus_cell(&st)?;
                let st = self.rewrite_until_done(st.with_focus(*rhs))?;
                let rc = self.focus_cell(&st)?;
                let p = self.materialize(self.e_iff(self.e_ref(lc), self.e_ref(rc)))?;
                Ok(st.with_focus(self.e_ref(p)))
            }

            ExprKind::Eq(lhs, rhs) => {
                let st = self.rewrite_until_done(state.with_focus(*lhs))?;
                let lc = self.focus_cell(&st)?;
                let st = self.rewrite_until_done(st.with_focus(*rhs))?;
                let rc = self.focus_cell(&st)?;
                self.cache_eq(lc, rc)?;
                let eq = self.safe_eq(lc, rc)?;
                let p = self.materialize(eq)?;
                Ok(st.with_focus(self.e_ref(p)))
            }
            ExprKind::Ne(lhs, rhs) => {
                let st = self.rewrite_until_done(state.with_focus(*lhs))?;
                let lc = self.focus_cell(&st)?;
                let st = self.rewrite_until_done(st.with_focus(*rhs))?;
                let rc = self.focus_cell(&st)?;
                self.cache_eq(lc, rc)?;
                let eq = self.safe_eq(lc, rc)?;
                let p = self.materialize(self.e_not(eq))?;
                Ok(st.with_focus(self.e_ref(p)))
            }

            ExprKind::Enum(args) => self.rule_set_enum(state, args),

            ExprKind::Mem { elem, set } => self.rule_mem(state, *elem, *set, focus.id),
            ExprKind::NotMem { elem, set } => {
                let mem = self.expr(ExprKind::Mem { elem, set });
                let not = self.e_not(mem);
                Ok(state.with_focus(not))
            }
            ExprKind::Subseteq { left, right } => {
                let st = self.rewrite_until_done(state.with_focus(*left))?;
                let lc = self.focus_cell(&st)?;
                let st = self.rewrite_until_done(st.with_focus(*right))?;
                let rc = self.focus_cell(&st)?;
                self.expect_set(lc, focus.id)?;
                self.expect_set(rc, focus.id)?;
                let phi = self.subset_eq(lc, rc)?;
                let p = self.materialize(phi)?;
                Ok(st.with_focus(self.e_ref(p)))
            }

            ExprKind::Exists { var, set, pred } => {
                self.rule_quantifier(state, var, *set, *pred, false)
            }
            ExprKind::Forall { var, set, pred } => {
                self.rule_quantifier(state, var, *set, *pred, true)
            }

            ExprKind::Arith { op, left, right } => {
                let st = self.rewrite_until_done(state.with_focus(*left))?;
                let lc = self.focus_cell(&st)?;
                let st = self.rewrite_until_done(st.with_focus(*right))?;
                let rc = self.focus_cell(&st)?;
                self.expect_int(lc, focus.id)?;
                self.expect_int(rc, focus.id)?;
                let res = self.arena.alloc(CellType::Int);
                let rhs = self.expr(ExprKind::Arith {
                    op,
                    left: Box::new(self.e_ref(lc)),
                    right: Box::new(self.e_ref(rc)),
                });
                let link = self.e_eq(self.e_ref(res), rhs);
                self.smt.assert_ground(&self.arena, &link)?;
                Ok(st.with_focus(self.e_ref(res)))
            }
            ExprKind::Neg(arg) => {
                let st = self.rewrite_until_done(state.with_focus(*arg))?;
                let c = self.focus_cell(&st)?;
                self.expect_int(c, focus.id)?;
                let res = self.arena.alloc(CellType::Int);
                let rhs = self.expr(ExprKind::Neg(Box::new(self.e_ref(c))));
                let link = self.e_eq(self.e_ref(res), rhs);
                self.smt.assert_ground(&self.arena, &link)?;
                Ok(st.with_focus(self.e_ref(res)))
            }
            ExprKind::Cmp { op, left, right } => {
                let st = self.rewrite_until_done(state.with_focus(*left))?;
                let lc = self.focus_cell(&st)?;
                let st = self.rewrite_until_done(st.with_focus(*right))?;
                let rc = self.focus_cell(&st)?;
                self.expect_int(lc, focus.id)?;
                self.expect_int(rc, focus.id)?;
                let cmp = self.expr(ExprKind::Cmp {
                    op,
                    left: Box::new(self.e_ref(lc)),
                    right: Box::new(self.e_ref(rc)),
                });
                let p = self.materialize(cmp)?;
                Ok(st.with_focus(self.e_ref(p)))
            }

            ExprKind::Ite {
                cond,
                then_branch,
                else_branch,
            } => self.rule_ite(state, *cond, *then_branch, *else_branch, focus.id),

            ExprKind::Tuple(args) => {
                let (st, cells) = self.rewrite_args(state, args)?;
                let tys: Vec<CellType> =
                    cells.iter().map(|&c| self.arena.ty(c).clone()).collect();
                let tup = self.arena.alloc(CellType::Tuple(tys));
                for c in cells {
                    self.arena.append_has(tup, c);
                }
                Ok(st.with_focus(self.e_ref(tup)))
            }

            ExprKind::Record(fields) => self.rule_record(state, fields),

            ExprKind::SeqLit(args) => {
                let (st, cells) = self.rewrite_args(state, args)?;
                let elem_ty = match cells.first() {
                    Some(&c) => self.arena.ty(c).clone(),
                    None => CellType::Unknown,
                };
                let n = cells.len() as i64;
                let start = self.intern_int(0)?;
                let end = self.intern_int(n)?;
                let seq = self.arena.alloc(CellType::Seq(Box::new(elem_ty)));
                self.arena.append_has(seq, start);
                self.arena.append_has(seq, end);
                for c in cells {
                    self.arena.append_has(seq, c);
                }
                Ok(st.with_focus(self.e_ref(seq)))
            }

            ExprKind::Field { base, field } => {
                let st = self.rewrite_until_done(state.with_focus(*base))?;
                let rec = self.focus_cell(&st)?;
                let idx = match self.arena.ty(rec) {
                    CellType::Record(fields) => {
                        fields.keys().position(|k| *k == field).ok_or_else(|| {
                            RewriterError::MalformedIr {
                                node: focus.id,
                                detail: format!("record has no field `{}`", field),
                                expr: format!("{}", self.arena.ty(rec)),
                            }
                        })?
                    }
                    other => {
                        return Err(RewriterError::MalformedIr {
                            node: focus.id,
                            detail: format!("field access on non-record type {}", other),
                            expr: field,
                        })
                    }
                };
                let cell = self.arena.has(rec)[idx];
                Ok(st.with_focus(self.e_ref(cell)))
            }

            ExprKind::Proj { base, index } => {
                let st = self.rewrite_until_done(state.with_focus(*base))?;
                let tup = self.focus_cell(&st)?;
                match self.arena.ty(tup) {
                    CellType::Tuple(tys) => {
                        if index == 0 || index > tys.len() {
                            return Err(RewriterError::MalformedIr {
                                node: focus.id,
                                detail: format!(
                                    "projection index {} out of range 1..={}",
                                    index,
                                    tys.len()
                                ),
                                expr: format!("{}", self.arena.ty(tup)),
                            });
                        }
                    }
                    other => {
                        return Err(RewriterError::MalformedIr {
                            node: focus.id,
                            detail: format!("projection on non-tuple type {}", other),
                            expr: format!("{}", other),
                        })
                    }
                }
                let cell = self.arena.has(tup)[index - 1];
                Ok(st.with_focus(self.e_ref(cell)))
            }

            ExprKind::FunCtor { var, domain, body } => {
                self.rule_fun_ctor(state, var, *domain, *body)
            }
            ExprKind::App { fun, arg } => self.rule_app(state, *fun, *arg, focus.id),
            ExprKind::FunSet { domain, codomain } => {
                let st = self.rewrite_until_done(state.with_focus(*domain))?;
                let dc = self.focus_cell(&st)?;
                let st = self.rewrite_until_done(st.with_focus(*codomain))?;
                let cc = self.focus_cell(&st)?;
                self.expect_set(dc, focus.id)?;
                self.expect_set(cc, focus.id)?;
                let fs = self.arena.alloc(CellType::FinFunSet(
                    Box::new(self.arena.ty(dc).clone()),
                    Box::new(self.arena.ty(cc).clone()),
                ));
                self.arena.set_dom(fs, dc);
                self.arena.set_cdm(fs, cc);
                Ok(st.with_focus(self.e_ref(fs)))
            }
        }
    }

    /// Rewrite a list of sub-expressions left to right, threading bindings.
    fn rewrite_args(
        &mut self,
        state: SymbState,
        args: Vec<Expr>,
    ) -> RwResult<(SymbState, Vec<CellId>)> {
        let mut st = state;
        let mut cells = Vec::with_capacity(args.len());
        for arg in args {
            st = self.rewrite_until_done(st.with_focus(arg))?;
            cells.push(self.focus_cell(&st)?);
        }
        Ok((st, cells))
    }

    /// Conjunction and disjunction. Conjuncts thread their bindings left to
    /// right (assignments inside a conjunction are visible to later
    /// conjuncts); disjuncts must not bind at all, since no single branch is
    /// chosen at rewrite time.
    fn rule_junction(
        &mut self,
        state: SymbState,
        args: Vec<Expr>,
        conjunction: bool,
    ) -> RwResult<SymbState> {
        if args.is_empty() {
            let c = if conjunction {
                self.arena.cell_true()
            } else {
                self.arena.cell_false()
            };
            return Ok(state.with_focus(self.e_ref(c)));
        }
        if conjunction {
            let (st, cells) = self.rewrite_args(state, args)?;
            let refs = cells.iter().map(|&c| self.e_ref(c)).collect();
            let p = self.materialize(self.e_and(refs))?;
            Ok(st.with_focus(self.e_ref(p)))
        } else {
            let n_bound = state.bindings.len();
            let mut refs = Vec::with_capacity(args.len());
            for arg in args {
                let node = arg.id;
                let branch = self.rewrite_until_done(state.with_focus(arg))?;
                if branch.bindings.len() != n_bound {
                    return Err(RewriterError::MalformedIr {
                        node,
                        detail: "assignment inside a disjunction".into(),
                        expr: branch.focus.to_string(),
                    });
                }
                refs.push(self.e_ref(self.focus_cell(&branch)?));
            }
            let p = self.materialize(self.e_or(refs))?;
            Ok(state.with_focus(self.e_ref(p)))
        }
    }

    fn rule_set_enum(&mut self, state: SymbState, args: Vec<Expr>) -> RwResult<SymbState> {
        let (st, cells) = self.rewrite_args(state, args)?;
        let elem_ty = match cells.first() {
            Some(&c) => self.arena.ty(c).clone(),
            None => CellType::Unknown,
        };
        let set = self.arena.alloc(CellType::FinSet(Box::new(elem_ty)));
        for &c in &cells {
            self.arena.append_has(set, c);
            // Enumerated members are definitely in.
            let sel = self.e_in(c, set);
            self.smt.assert_ground(&self.arena, &sel)?;
        }
        Ok(st.with_focus(self.e_ref(set)))
    }

    fn rule_mem(
        &mut self,
        state: SymbState,
        elem: Expr,
        set: Expr,
        node: opal_ir::NodeId,
    ) -> RwResult<SymbState> {
        // An unbound (primed) variable on the left is an assignment
        // candidate: pick a fresh cell constrained to be a member and bind
        // the name to it.
        match &elem.kind {
            ExprKind::Prime(name) if state.lookup(&SymbState::primed_key(name)).is_none() => {
                let key = SymbState::primed_key(name);
                return self.rule_assign(state, key, set, node);
            }
            ExprKind::Name(name) if state.lookup(name).is_none() => {
                let key = name.clone();
                return self.rule_assign(state, key, set, node);
            }
            _ => {}
        }

        let st = self.rewrite_until_done(state.with_focus(elem))?;
        let e = self.focus_cell(&st)?;
        let st = self.rewrite_until_done(st.with_focus(set))?;
        let s = self.focus_cell(&st)?;
        self.expect_set(s, node)?;

        let members = self.arena.has(s).to_vec();
        if members.is_empty() {
            return Ok(st.with_focus(self.e_ref(self.arena.cell_false())));
        }
        self.cache_eq_all(members.iter().map(|&m| (e, m)))?;
        let mut disj = Vec::with_capacity(members.len());
        for &m in &members {
            let eq = self.cached_eq(e, m)?;
            if matches!(eq.kind, ExprKind::Bool(false)) {
                continue;
            }
            disj.push(self.e_and(vec![self.e_in(m, s), eq]));
        }
        if disj.is_empty() {
            return Ok(st.with_focus(self.e_ref(self.arena.cell_false())));
        }
        let p = self.materialize(self.e_or(disj))?;
        Ok(st.with_focus(self.e_ref(p)))
    }

    /// Assignment `x ∈ B` with `x` unbound: allocate a fresh cell of the
    /// element type, constrain it to equal one of the stored members, and
    /// bind the name. The membership itself becomes the rule's boolean
    /// result, so an enclosing transition conjunction carries it.
    fn rule_assign(
        &mut self,
        state: SymbState,
        key: String,
        set: Expr,
        node: opal_ir::NodeId,
    ) -> RwResult<SymbState> {
        let st = self.rewrite_until_done(state.with_focus(set))?;
        let s = self.focus_cell(&st)?;
        let elem_ty = match self.arena.ty(s) {
            CellType::FinSet(elem) => (**elem).clone(),
            other => {
                return Err(RewriterError::MalformedIr {
                    node,
                    detail: format!("assignment from non-set type {}", other),
                    expr: format!("{}", other),
                })
            }
        };
        if !elem_ty.is_scalar() {
            // Copying structure out of a set needs dedicated pick support.
            return Err(RewriterError::NoRuleApplies {
                node,
                expr: format!("assignment picking from Set[{}]", elem_ty),
            });
        }

        let members = self.arena.has(s).to_vec();
        let x = self.arena.alloc(elem_ty);
        if members.is_empty() {
            // Nothing to pick: bind an unconstrained cell so later uses
            // still typecheck, and report the candidate as never enabled.
            return Ok(st
                .bind(key, x)
                .with_focus(self.e_ref(self.arena.cell_false())));
        }

        self.cache_eq_all(members.iter().map(|&m| (x, m)))?;
        let mut disj = Vec::with_capacity(members.len());
        for &m in &members {
            let eq = self.safe_eq(x, m)?;
            disj.push(self.e_and(vec![self.e_in(m, s), eq]));
        }
        let p = self.materialize(self.e_or(disj))?;
        Ok(st.bind(key, x).with_focus(self.e_ref(p)))
    }

    fn rule_quantifier(
        &mut self,
        state: SymbState,
        var: String,
        set: Expr,
        pred: Expr,
        universal: bool,
    ) -> RwResult<SymbState> {
        let node = set.id;
        let st = self.rewrite_until_done(state.with_focus(set))?;
        let s = self.focus_cell(&st)?;
        self.expect_set(s, node)?;

        let members = self.arena.has(s).to_vec();
        if members.is_empty() {
            let c = if universal {
                self.arena.cell_true()
            } else {
                self.arena.cell_false()
            };
            return Ok(st.with_focus(self.e_ref(c)));
        }

        let mut parts = Vec::with_capacity(members.len());
        for &m in &members {
            // The bound name shadows inside the branch and does not leak.
            let branch = st.with_focus(pred.clone()).bind(var.clone(), m);
            let branch = self.rewrite_until_done(branch)?;
            let p = self.focus_cell(&branch)?;
            let guard = self.e_in(m, s);
            parts.push(if universal {
                self.e_implies(guard, self.e_ref(p))
            } else {
                self.e_and(vec![guard, self.e_ref(p)])
            });
        }
        let body = if universal {
            self.e_and(parts)
        } else {
            self.e_or(parts)
        };
        let p = self.materialize(body)?;
        Ok(st.with_focus(self.e_ref(p)))
    }

    fn rule_ite(
        &mut self,
        state: SymbState,
        cond: Expr,
        then_branch: Expr,
        else_branch: Expr,
        node: opal_ir::NodeId,
    ) -> RwResult<SymbState> {
        let st = self.rewrite_until_done(state.with_focus(cond))?;
        let c = self.focus_cell(&st)?;
        let st = self.rewrite_until_done(st.with_focus(then_branch))?;
        let t = self.focus_cell(&st)?;
        let st = self.rewrite_until_done(st.with_focus(else_branch))?;
        let e = self.focus_cell(&st)?;

        let ty = self.arena.ty(t).clone();
        if !ty.is_scalar() || !ty.comparable_to(self.arena.ty(e)) {
            return Err(RewriterError::NoRuleApplies {
                node,
                expr: format!(
                    "if-then-else over {} / {}",
                    self.arena.ty(t),
                    self.arena.ty(e)
                ),
            });
        }
        let res = self.arena.alloc(ty);
        self.cache_eq(res, t)?;
        self.cache_eq(res, e)?;
        let eq_t = self.safe_eq(res, t)?;
        let eq_e = self.safe_eq(res, e)?;
        let pos = self.e_implies(self.e_ref(c), eq_t);
        let neg = self.e_implies(self.e_not(self.e_ref(c)), eq_e);
        let link = self.e_and(vec![pos, neg]);
        self.smt.assert_ground(&self.arena, &link)?;
        Ok(st.with_focus(self.e_ref(res)))
    }

    fn rule_record(
        &mut self,
        state: SymbState,
        fields: Vec<(String, Expr)>,
    ) -> RwResult<SymbState> {
        // Normalise to field-name order; schema order and edge order must
        // agree for the equality engine.
        let mut fields = fields;
        fields.sort_by(|a, b| a.0.cmp(&b.0));
        if fields.windows(2).any(|w| w[0].0 == w[1].0) {
            let node = fields[0].1.id;
            return Err(RewriterError::MalformedIr {
                node,
                detail: "duplicate record field".into(),
                expr: fields
                    .iter()
                    .map(|(n, _)| n.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
            });
        }

        let mut st = state;
        let mut value_cells = Vec::with_capacity(fields.len());
        for (_, value) in &fields {
            st = self.rewrite_until_done(st.with_focus(value.clone()))?;
            value_cells.push(self.focus_cell(&st)?);
        }

        let dom = self
            .arena
            .alloc(CellType::FinSet(Box::new(CellType::Str)));
        for (name, _) in &fields {
            let key = self.intern_str(name)?;
            self.arena.append_has(dom, key);
            let sel = self.e_in(key, dom);
            self.smt.assert_ground(&self.arena, &sel)?;
        }

        let schema: std::collections::BTreeMap<String, CellType> = fields
            .iter()
            .zip(&value_cells)
            .map(|((name, _), &c)| (name.clone(), self.arena.ty(c).clone()))
            .collect();
        let rec = self.arena.alloc(CellType::Record(schema));
        for &c in &value_cells {
            self.arena.append_has(rec, c);
        }
        self.arena.set_dom(rec, dom);
        Ok(st.with_focus(self.e_ref(rec)))
    }

    fn rule_fun_ctor(
        &mut self,
        state: SymbState,
        var: String,
        domain: Expr,
        body: Expr,
    ) -> RwResult<SymbState> {
        let node = domain.id;
        let st = self.rewrite_until_done(state.with_focus(domain))?;
        let d = self.focus_cell(&st)?;
        let arg_ty = match self.arena.ty(d) {
            CellType::FinSet(elem) => (**elem).clone(),
            other => {
                return Err(RewriterError::MalformedIr {
                    node,
                    detail: format!("function domain is not a set: {}", other),
                    expr: format!("{}", other),
                })
            }
        };

        let members = self.arena.has(d).to_vec();
        let mut results = Vec::with_capacity(members.len());
        for &m in &members {
            let branch = st.with_focus(body.clone()).bind(var.clone(), m);
            let branch = self.rewrite_until_done(branch)?;
            results.push(self.focus_cell(&branch)?);
        }
        let res_ty = match results.first() {
            Some(&c) => self.arena.ty(c).clone(),
            None => CellType::Unknown,
        };

        let pair_ty = CellType::Tuple(vec![arg_ty.clone(), res_ty.clone()]);
        let rel = self
            .arena
            .alloc(CellType::FinSet(Box::new(pair_ty.clone())));
        for (&m, &r) in members.iter().zip(&results) {
            let pair = self.arena.alloc(pair_ty.clone());
            self.arena.append_has(pair, m);
            self.arena.append_has(pair, r);
            self.arena.append_has(rel, pair);
            // The graph holds a pair exactly when the domain holds its key.
            let link = self.e_iff(self.e_in(pair, rel), self.e_in(m, d));
            self.smt.assert_ground(&self.arena, &link)?;
        }

        let fun = self
            .arena
            .alloc(CellType::Fun(Box::new(arg_ty), Box::new(res_ty)));
        self.arena.set_dom(fun, d);
        self.arena.set_cdm(fun, rel);
        Ok(st.with_focus(self.e_ref(fun)))
    }

    fn rule_app(
        &mut self,
        state: SymbState,
        fun: Expr,
        arg: Expr,
        node: opal_ir::NodeId,
    ) -> RwResult<SymbState> {
        let st = self.rewrite_until_done(state.with_focus(fun))?;
        let f = self.focus_cell(&st)?;
        let st = self.rewrite_until_done(st.with_focus(arg))?;
        let a = self.focus_cell(&st)?;

        let res_ty = match self.arena.ty(f) {
            CellType::Fun(_, res) => (**res).clone(),
            other => {
                return Err(RewriterError::MalformedIr {
                    node,
                    detail: format!("application of non-function type {}", other),
                    expr: format!("{}", other),
                })
            }
        };
        if !res_ty.is_scalar() {
            return Err(RewriterError::NoRuleApplies {
                node,
                expr: format!("application producing {}", res_ty),
            });
        }
        let rel = self.arena.cdm(f).ok_or(RewriterError::MalformedCell {
            cell: f,
            detail: "function without a relation edge".into(),
        })?;

        let res = self.arena.alloc(res_ty);
        let pairs = self.arena.has(rel).to_vec();
        for &pair in &pairs {
            let edges = self.arena.has(pair);
            if edges.len() != 2 {
                return Err(RewriterError::MalformedCell {
                    cell: pair,
                    detail: "function graph entry is not a pair".into(),
                });
            }
            let (key, val) = (edges[0], edges[1]);
            self.cache_eq(a, key)?;
            self.cache_eq(res, val)?;
            let arg_eq = self.safe_eq(a, key)?;
            let res_eq = self.safe_eq(res, val)?;
            let guard = self.e_and(vec![self.e_in(pair, rel), arg_eq]);
            let link = self.e_implies(guard, res_eq);
            self.smt.assert_ground(&self.arena, &link)?;
        }
        // Outside the stored graph the result stays unconstrained; callers
        // are expected to guard applications with domain membership.
        Ok(st.with_focus(self.e_ref(res)))
    }

    // === Shape expectations ===

    fn expect_set(&self, c: CellId, node: opal_ir::NodeId) -> RwResult<()> {
        match self.arena.ty(c) {
            CellType::FinSet(_) => Ok(()),
            other => Err(RewriterError::MalformedIr {
                node,
                detail: format!("expected a finite set, found {}", other),
                expr: format!("{}", other),
            }),
        }
    }

    fn expect_int(&self, c: CellId, node: opal_ir::NodeId) -> RwResult<()> {
        match self.arena.ty(c) {
            CellType::Int => Ok(()),
            other => Err(RewriterError::MalformedIr {
                node,
                detail: format!("expected an integer, found {}", other),
                expr: format!("{}", other),
            }),
        }
    }
}
