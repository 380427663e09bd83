//! Depth-first bounded unrolling of the extracted transitions.

use crate::{
    CheckConfig, CheckError, CheckOutcome, CheckResult, Module, TraceState,
};
use opal_assign::{extract_transitions, AssignError, Transition};
use opal_cells::CellId;
use opal_ir::{Expr, ExprKind, IdGen};
use opal_rewriter::{Rewriter, SymbState};
use opal_smt::{SatOutcome, SmtGateway};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info};

/// Run a bounded safety check of the module.
///
/// Transitions are explored one at a time, depth first, with the engine's
/// scope stack rewinding the solver, the arena and the caches between
/// branches. Invariants are checked at every reached depth by asserting
/// their negation under a scope of their own.
pub fn check(
    module: &Module,
    idgen: &Rc<IdGen>,
    config: &CheckConfig,
) -> CheckResult<CheckOutcome> {
    info!(depth = config.depth, vars = module.vars.len(), "starting bounded check");

    let var_names: Vec<String> = module.vars.iter().map(|v| v.name.clone()).collect();
    let dump = config.dump_dir.as_deref();
    let init_transitions =
        match extract_transitions(&module.init, &var_names, "Init", false, idgen, dump) {
            Ok(ts) => ts,
            Err(AssignError::Indeterminate { reason }) => {
                return Ok(CheckOutcome::Unknown { reason })
            }
            Err(e) => return Err(e.into()),
        };
    let next_transitions =
        match extract_transitions(&module.next, &var_names, "Next", true, idgen, dump) {
            Ok(ts) => ts,
            Err(AssignError::Indeterminate { reason }) => {
                return Ok(CheckOutcome::Unknown { reason })
            }
            Err(e) => return Err(e.into()),
        };

    if init_transitions.is_empty() {
        return Ok(CheckOutcome::Unknown {
            reason: "no initial transition admits an assignment strategy".into(),
        });
    }

    let mut gateway = SmtGateway::new();
    if let Some(ms) = config.solver_timeout_ms {
        gateway.set_timeout_ms(ms);
    }
    let rw = Rewriter::with_gateway(idgen.clone(), gateway)?;

    let mut checker = Checker {
        rw,
        module,
        next_transitions,
        depth: config.depth,
    };

    for t in &init_transitions {
        checker.rw.push();
        let (enabled, state0) = checker.apply_transition(t, &HashMap::new(), false)?;
        checker
            .rw
            .smt
            .assert_ground(&checker.rw.arena, &cell_ref(idgen, enabled))?;
        match checker.rw.smt.sat() {
            SatOutcome::Unsat => {
                debug!(transition = t.name, "initial transition infeasible");
                checker.rw.pop()?;
                continue;
            }
            SatOutcome::Unknown => {
                checker.rw.pop()?;
                return Ok(CheckOutcome::Unknown {
                    reason: format!("solver unknown on initial transition {}", t.name),
                });
            }
            SatOutcome::Sat => {}
        }
        checker.check_init_types(&state0)?;

        let mut path = vec![state0];
        let found = checker.explore(0, &mut path)?;
        checker.rw.pop()?;
        if let Some(outcome) = found {
            return Ok(outcome);
        }
    }

    info!(depth = config.depth, "bounded check complete, no violations");
    Ok(CheckOutcome::Ok {
        depth: config.depth,
    })
}

struct Checker<'a> {
    rw: Rewriter,
    module: &'a Module,
    next_transitions: Vec<Transition>,
    depth: usize,
}

impl Checker<'_> {
    /// Check all invariants in the current state, then recurse into every
    /// feasible transition. Returns the first violation or unknown.
    fn explore(
        &mut self,
        step: usize,
        path: &mut Vec<HashMap<String, CellId>>,
    ) -> CheckResult<Option<CheckOutcome>> {
        let current = path.last().cloned().unwrap_or_default();

        for inv in &self.module.invariants {
            self.rw.push();
            let mut st = SymbState::new(inv.body.clone());
            st.bindings = current.clone();
            let st = self.rw.rewrite_until_done(st)?;
            let c = self.rw.focus_cell(&st)?;
            let idgen = self.rw.idgen().clone();
            let negated = Expr::new(
                &idgen,
                ExprKind::Not(Box::new(cell_ref(&idgen, c))),
            );
            self.rw.smt.assert_ground(&self.rw.arena, &negated)?;
            match self.rw.smt.sat() {
                SatOutcome::Sat => {
                    info!(invariant = inv.name, step, "invariant violation found");
                    let trace = self.decode_trace(path)?;
                    self.rw.pop()?;
                    return Ok(Some(CheckOutcome::InvariantViolation {
                        invariant: inv.name.clone(),
                        trace,
                    }));
                }
                SatOutcome::Unsat => {
                    self.rw.pop()?;
                }
                SatOutcome::Unknown => {
                    self.rw.pop()?;
                    return Ok(Some(CheckOutcome::Unknown {
                        reason: format!(
                            "solver unknown on invariant {} at step {}",
                            inv.name, step
                        ),
                    }));
                }
            }
        }

        if step >= self.depth {
            return Ok(None);
        }

        let transitions = self.next_transitions.clone();
        for t in &transitions {
            self.rw.push();
            let (enabled, next_state) = self.apply_transition(t, &current, true)?;
            let idgen = self.rw.idgen().clone();
            self.rw
                .smt
                .assert_ground(&self.rw.arena, &cell_ref(&idgen, enabled))?;
            match self.rw.smt.sat() {
                SatOutcome::Unsat => {
                    debug!(transition = t.name, step, "transition infeasible");
                    self.rw.pop()?;
                    continue;
                }
                SatOutcome::Unknown => {
                    self.rw.pop()?;
                    return Ok(Some(CheckOutcome::Unknown {
                        reason: format!(
                            "solver unknown on transition {} at step {}",
                            t.name, step
                        ),
                    }));
                }
                SatOutcome::Sat => {}
            }
            path.push(next_state);
            let found = self.explore(step + 1, path)?;
            path.pop();
            self.rw.pop()?;
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }

    /// Rewrite one transition in strategy order and produce its enabling
    /// cell plus the state bindings it assigns.
    ///
    /// The disjunct is a flat conjunction of leaves after extraction, so
    /// each conjunct holds at most one strategy candidate; ordering the
    /// conjuncts by their candidate's strategy position puts every
    /// assignment before each of its uses.
    fn apply_transition(
        &mut self,
        t: &Transition,
        current: &HashMap<String, CellId>,
        primed: bool,
    ) -> CheckResult<(CellId, HashMap<String, CellId>)> {
        let mut conjuncts: Vec<Expr> = match &t.action.kind {
            ExprKind::And(args) => args.clone(),
            _ => vec![t.action.clone()],
        };
        conjuncts.sort_by_key(|c| {
            (
                candidate_position(t, c).unwrap_or(usize::MAX),
                c.id,
            )
        });

        let mut st = SymbState::new(t.action.clone());
        st.bindings = current.clone();
        let mut parts: Vec<CellId> = Vec::with_capacity(conjuncts.len());
        for conjunct in conjuncts {
            st = self.rw.rewrite_until_done(st.with_focus(conjunct))?;
            parts.push(self.rw.focus_cell(&st)?);
        }

        let idgen = self.rw.idgen().clone();
        let refs: Vec<Expr> = parts.iter().map(|&c| cell_ref(&idgen, c)).collect();
        let conj = Expr::new(&idgen, ExprKind::And(refs));
        let enabled = self.rw.materialize(conj)?;

        let mut next_state = HashMap::new();
        for var in &self.module.vars {
            let key = if primed {
                SymbState::primed_key(&var.name)
            } else {
                var.name.clone()
            };
            let cell = st.lookup(&key).ok_or_else(|| CheckError::MissingAssignment {
                transition: t.name.clone(),
                var: var.name.clone(),
            })?;
            next_state.insert(var.name.clone(), cell);
        }
        Ok((enabled, next_state))
    }

    /// Declared types must match what the initial assignments produced.
    fn check_init_types(&self, state0: &HashMap<String, CellId>) -> CheckResult<()> {
        for var in &self.module.vars {
            if let Some(&cell) = state0.get(&var.name) {
                let found = self.rw.arena.ty(cell);
                if !found.comparable_to(&var.ty) {
                    return Err(CheckError::InitTypeMismatch {
                        var: var.name.clone(),
                        found: found.to_string(),
                        declared: var.ty.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Decode every state on the path under the current model.
    fn decode_trace(
        &self,
        path: &[HashMap<String, CellId>],
    ) -> CheckResult<Vec<TraceState>> {
        let mut trace = Vec::with_capacity(path.len());
        for state in path {
            let mut decoded = Vec::with_capacity(self.module.vars.len());
            for var in &self.module.vars {
                if let Some(&cell) = state.get(&var.name) {
                    decoded.push((var.name.clone(), self.rw.decode(cell)?));
                }
            }
            trace.push(decoded);
        }
        Ok(trace)
    }
}

fn cell_ref(gen: &IdGen, c: CellId) -> Expr {
    Expr::new(gen, ExprKind::CellRef(c))
}

/// Strategy position of the candidate contained in this conjunct, if any.
fn candidate_position(t: &Transition, conjunct: &Expr) -> Option<usize> {
    t.strategy
        .order
        .iter()
        .position(|c| contains_node(conjunct, c.node))
}

fn contains_node(ex: &Expr, node: opal_ir::NodeId) -> bool {
    if ex.id == node {
        return true;
    }
    let mut found = false;
    ex.for_each_child(&mut |child| {
        if !found && contains_node(child, node) {
            found = true;
        }
    });
    found
}
