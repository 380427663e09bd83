//! Splitting the next-state relation into planned symbolic transitions.

use crate::formula::Problem;
use crate::script;
use crate::solver::solve_problem;
use crate::{AssignOutcome, AssignResult, Transition};
use opal_ir::{Expr, ExprKind, IdGen, NodeId};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Flatten the formula into top-level disjuncts, distributing disjunctions
/// outward over the conjunctions that dominate them. Leaves other than
/// `And`/`Or` are opaque.
pub fn normalize_disjuncts(ex: &Expr, gen: &IdGen) -> Vec<Expr> {
    clauses(ex)
        .into_iter()
        .map(|mut conjuncts| {
            if conjuncts.len() == 1 {
                conjuncts.pop().unwrap_or_else(|| ex.clone())
            } else {
                Expr::new(gen, ExprKind::And(conjuncts))
            }
        })
        .collect()
}

/// Disjunctive normal form over the ∧/∨ skeleton, as lists of conjuncts.
fn clauses(ex: &Expr) -> Vec<Vec<Expr>> {
    match &ex.kind {
        ExprKind::Or(args) => args.iter().flat_map(clauses).collect(),
        ExprKind::And(args) => {
            let mut acc: Vec<Vec<Expr>> = vec![Vec::new()];
            for arg in args {
                let arg_clauses = clauses(arg);
                let mut next = Vec::with_capacity(acc.len() * arg_clauses.len());
                for prefix in &acc {
                    for clause in &arg_clauses {
                        let mut merged = prefix.clone();
                        merged.extend(clause.iter().cloned());
                        next.push(merged);
                    }
                }
                acc = next;
            }
            acc
        }
        _ => vec![vec![ex.clone()]],
    }
}

/// Smallest node id inside a disjunct; the sort key that makes extraction
/// deterministic.
fn representative_id(ex: &Expr) -> NodeId {
    let mut min = ex.id;
    ex.for_each_child(&mut |child| {
        let m = representative_id(child);
        if m < min {
            min = m;
        }
    });
    min
}

/// Split a next-state (or initial-state) formula into transitions: one
/// strategy query per disjunct, rejected disjuncts discarded, the rest
/// keyed by the prefix and an index.
///
/// When `dump_dir` is given, the QF_UFLIA script of every disjunct is
/// written there as a standalone `.smt2` file.
pub fn extract_transitions(
    formula: &Expr,
    vars: &[String],
    prefix: &str,
    primed: bool,
    gen: &IdGen,
    dump_dir: Option<&Path>,
) -> AssignResult<Vec<Transition>> {
    let mut disjuncts: Vec<(NodeId, Expr)> = normalize_disjuncts(formula, gen)
        .into_iter()
        .map(|d| (representative_id(&d), d))
        .collect();
    disjuncts.sort_by_key(|(id, _)| *id);

    let mut out = Vec::new();
    for (disjunct_idx, (node, action)) in disjuncts.into_iter().enumerate() {
        let problem = Problem::build(&action, vars, primed);
        if let Some(dir) = dump_dir {
            fs::create_dir_all(dir)?;
            let path = dir.join(format!("{}_{}.smt2", prefix, disjunct_idx));
            fs::write(&path, script::render_file(&problem))?;
            debug!(path = %path.display(), "wrote assignment script");
        }
        match solve_problem(&problem)? {
            AssignOutcome::Strategy(strategy) => {
                let name = format!("{}{}", prefix, out.len());
                out.push(Transition {
                    name,
                    node,
                    action,
                    strategy,
                });
            }
            AssignOutcome::Rejected => {
                debug!(disjunct = disjunct_idx, "disjunct admits no strategy");
            }
        }
    }
    info!(
        prefix,
        transitions = out.len(),
        "transition extraction complete"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(gen: &IdGen, kind: ExprKind) -> Expr {
        Expr::new(gen, kind)
    }

    #[test]
    fn test_disjunctions_distribute_over_conjunctions() {
        let gen = IdGen::new();
        // p /\ (q \/ r)  →  [p /\ q, p /\ r]
        let p = b(&gen, ExprKind::Name("p".into()));
        let q = b(&gen, ExprKind::Name("q".into()));
        let r = b(&gen, ExprKind::Name("r".into()));
        let or = b(&gen, ExprKind::Or(vec![q, r]));
        let top = b(&gen, ExprKind::And(vec![p, or]));

        let ds = normalize_disjuncts(&top, &gen);
        assert_eq!(ds.len(), 2);
        for d in &ds {
            match &d.kind {
                ExprKind::And(args) => assert_eq!(args.len(), 2),
                other => panic!("expected a conjunction, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_single_leaf_is_its_own_disjunct() {
        let gen = IdGen::new();
        let p = b(&gen, ExprKind::Name("p".into()));
        let ds = normalize_disjuncts(&p, &gen);
        assert_eq!(ds.len(), 1);
        assert_eq!(ds[0].kind, p.kind);
    }
}
