//! Candidate collection over the ∧/∨ skeleton of a transition formula.

use crate::Candidate;
use opal_ir::{Expr, ExprKind};

/// Whether `ex` is an assignment candidate leaf. In next-state formulas the
/// left-hand side is a primed variable; in initial-state predicates it is a
/// plain one.
pub(crate) fn as_candidate(ex: &Expr, primed: bool) -> Option<Candidate> {
    let ExprKind::Mem { elem, set } = &ex.kind else {
        return None;
    };
    let var = match (&elem.kind, primed) {
        (ExprKind::Prime(v), true) => v.clone(),
        (ExprKind::Name(v), false) => v.clone(),
        _ => return None,
    };
    let rhs_vars = if primed {
        set.primed_names()
    } else {
        set.plain_names()
    };
    Some(Candidate {
        node: ex.id,
        var,
        rhs_vars,
    })
}

/// Collect every candidate leaf, walking only through conjunctions and
/// disjunctions; all other operators are opaque leaves.
pub fn collect_candidates(formula: &Expr, primed: bool) -> Vec<Candidate> {
    let mut out = Vec::new();
    walk(formula, primed, &mut out);
    out
}

fn walk(ex: &Expr, primed: bool, out: &mut Vec<Candidate>) {
    match &ex.kind {
        ExprKind::And(args) | ExprKind::Or(args) => {
            for a in args {
                walk(a, primed, out);
            }
        }
        _ => {
            if let Some(c) = as_candidate(ex, primed) {
                out.push(c);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_ir::{Expr, ExprKind, IdGen};

    fn assign(gen: &IdGen, var: &str, rhs: Expr) -> Expr {
        Expr::new(
            gen,
            ExprKind::Mem {
                elem: Box::new(Expr::new(gen, ExprKind::Prime(var.into()))),
                set: Box::new(rhs),
            },
        )
    }

    #[test]
    fn test_collects_primed_membership_leaves() {
        let gen = IdGen::new();
        let a1 = assign(&gen, "x", Expr::new(&gen, ExprKind::Enum(vec![])));
        let rhs = Expr::new(
            &gen,
            ExprKind::Enum(vec![Expr::new(&gen, ExprKind::Prime("x".into()))]),
        );
        let a2 = assign(&gen, "y", rhs);
        let guard = Expr::new(&gen, ExprKind::Bool(true));
        let formula = Expr::new(&gen, ExprKind::And(vec![a1, guard, a2]));

        let cands = collect_candidates(&formula, true);
        assert_eq!(cands.len(), 2);
        assert_eq!(cands[0].var, "x");
        assert!(cands[0].rhs_vars.is_empty());
        assert_eq!(cands[1].var, "y");
        assert!(cands[1].rhs_vars.contains("x"));
    }

    #[test]
    fn test_plain_membership_only_counts_for_init() {
        let gen = IdGen::new();
        let mem = Expr::new(
            &gen,
            ExprKind::Mem {
                elem: Box::new(Expr::new(&gen, ExprKind::Name("x".into()))),
                set: Box::new(Expr::new(&gen, ExprKind::Enum(vec![]))),
            },
        );
        assert!(collect_candidates(&mem, true).is_empty());
        assert_eq!(collect_candidates(&mem, false).len(), 1);
    }
}
