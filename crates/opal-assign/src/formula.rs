//! The assignment problem as a propositional + ranking structure.

use crate::candidates::{as_candidate, collect_candidates};
use crate::Candidate;
use opal_ir::{Expr, ExprKind, NodeId};
use std::collections::BTreeSet;

/// Per-variable coverage formula δ over candidate booleans.
///
/// The connectives invert relative to the source formula: across a
/// conjunction any one conjunct may provide the assignment (disjunction),
/// while across a disjunction every branch must provide it (conjunction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    False,
    /// The candidate boolean `A_i`.
    Cand(NodeId),
    /// At least one child covers the variable.
    AnyOf(Vec<Delta>),
    /// Every child covers the variable.
    AllOf(Vec<Delta>),
}

/// Compute δ_var over the formula, simplifying eagerly: a conjunction with
/// a `False` child collapses, a disjunction drops `False` children.
pub fn delta(formula: &Expr, var: &str, primed: bool) -> Delta {
    match &formula.kind {
        ExprKind::And(args) => {
            let mut children = Vec::new();
            for a in args {
                match delta(a, var, primed) {
                    Delta::False => {}
                    d => children.push(d),
                }
            }
            match children.len() {
                0 => Delta::False,
                1 => children.pop().unwrap_or(Delta::False),
                _ => Delta::AnyOf(children),
            }
        }
        ExprKind::Or(args) => {
            let mut children = Vec::new();
            for a in args {
                match delta(a, var, primed) {
                    Delta::False => return Delta::False,
                    d => children.push(d),
                }
            }
            match children.len() {
                0 => Delta::False,
                1 => children.pop().unwrap_or(Delta::False),
                _ => Delta::AllOf(children),
            }
        }
        _ => match as_candidate(formula, primed) {
            Some(c) if c.var == var => Delta::Cand(formula.id),
            _ => Delta::False,
        },
    }
}

/// The full problem handed to the auxiliary solver and the script printer.
#[derive(Debug, Clone)]
pub struct Problem {
    pub candidates: Vec<Candidate>,
    /// One coverage formula per state variable, in input order.
    pub deltas: Vec<(String, Delta)>,
    /// Dependent unordered pairs `(i, j)` with `i < j`: candidates whose
    /// nearest common ancestor is a conjunction.
    pub dep_pairs: BTreeSet<(NodeId, NodeId)>,
}

impl Problem {
    pub fn build(formula: &Expr, vars: &[String], primed: bool) -> Problem {
        let candidates = collect_candidates(formula, primed);
        let deltas = vars
            .iter()
            .map(|v| (v.clone(), delta(formula, v, primed)))
            .collect();
        let mut dep_pairs = BTreeSet::new();
        collect_dependent(formula, primed, &mut dep_pairs);
        Problem {
            candidates,
            deltas,
            dep_pairs,
        }
    }

    fn candidate(&self, node: NodeId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.node == node)
    }

    /// Ordered pairs `(i, j)` that must satisfy `R(i) < R(j)`: dependent
    /// pairs where the assignment of `i` feeds the right-hand side of `j`.
    pub fn order_pairs(&self) -> Vec<(NodeId, NodeId)> {
        let mut out = Vec::new();
        for &(i, j) in &self.dep_pairs {
            for (x, y) in [(i, j), (j, i)] {
                let (Some(cx), Some(cy)) = (self.candidate(x), self.candidate(y)) else {
                    continue;
                };
                if cy.rhs_vars.contains(&cx.var) {
                    out.push((x, y));
                }
            }
        }
        out
    }

    /// Dependent pairs assigning the same variable: at most one may be
    /// chosen.
    pub fn uniq_pairs(&self) -> Vec<(NodeId, NodeId)> {
        self.dep_pairs
            .iter()
            .filter(|(i, j)| {
                matches!(
                    (self.candidate(*i), self.candidate(*j)),
                    (Some(a), Some(b)) if a.var == b.var
                )
            })
            .copied()
            .collect()
    }
}

/// Pairs of candidates are independent when their nearest common ancestor
/// is a disjunction; every other pair that shares a formula is dependent.
/// Returned pairs are normalised `(min, max)`.
fn collect_dependent(
    ex: &Expr,
    primed: bool,
    deps: &mut BTreeSet<(NodeId, NodeId)>,
) -> Vec<NodeId> {
    match &ex.kind {
        ExprKind::And(args) => {
            let child_sets: Vec<Vec<NodeId>> = args
                .iter()
                .map(|a| collect_dependent(a, primed, deps))
                .collect();
            for (ci, left) in child_sets.iter().enumerate() {
                for right in child_sets.iter().skip(ci + 1) {
                    for &i in left {
                        for &j in right {
                            deps.insert(if i < j { (i, j) } else { (j, i) });
                        }
                    }
                }
            }
            child_sets.into_iter().flatten().collect()
        }
        ExprKind::Or(args) => args
            .iter()
            .flat_map(|a| collect_dependent(a, primed, deps))
            .collect(),
        _ => match as_candidate(ex, primed) {
            Some(_) => vec![ex.id],
            None => Vec::new(),
        },
    }
}
