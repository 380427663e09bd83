//! Solving the assignment problem on an auxiliary solver instance.

use crate::formula::{Delta, Problem};
use crate::{AssignError, AssignOutcome, AssignResult, Strategy};
use opal_ir::{Expr, NodeId};
use std::collections::HashMap;
use tracing::debug;
use z3::ast::{Bool, Int};
use z3::{FuncDecl, SatResult, Solver, Sort};

/// Search for an assignment strategy for one transition formula.
///
/// On `sat`, the chosen candidates ordered by the model value of the
/// ranking function form the strategy. `unsat` means the transition admits
/// no assignment order and is rejected.
pub fn solve_strategy(
    formula: &Expr,
    vars: &[String],
    primed: bool,
) -> AssignResult<AssignOutcome> {
    let problem = Problem::build(formula, vars, primed);
    solve_problem(&problem)
}

pub(crate) fn solve_problem(problem: &Problem) -> AssignResult<AssignOutcome> {
    let solver = Solver::new();

    let a: HashMap<NodeId, Bool> = problem
        .candidates
        .iter()
        .map(|c| (c.node, Bool::new_const(format!("A_{}", c.node.0))))
        .collect();
    let r = FuncDecl::new("R", &[&Sort::int()], &Sort::int());
    let rank = |id: NodeId| -> AssignResult<Int> {
        r.apply(&[&Int::from_i64(id.0 as i64)])
            .as_int()
            .ok_or_else(|| AssignError::Encoding("ranking application is not an integer".into()))
    };

    // Coverage: every variable assigned along every branch.
    for (_, d) in &problem.deltas {
        let encoded = encode_delta(d, &a)?;
        solver.assert(&encoded);
    }
    // Ordering respects data dependencies. The rank constraint is kept
    // unconditional: a candidate that ends up unchosen is still evaluated
    // as a membership test at its rank, so a dependency cycle between
    // candidates rules the disjunct out even if a covering subset exists.
    for (i, j) in problem.order_pairs() {
        let lt = rank(i)?.lt(&rank(j)?);
        solver.assert(&lt);
    }
    // Injective ranking.
    let nodes: Vec<NodeId> = problem.candidates.iter().map(|c| c.node).collect();
    for (idx, &i) in nodes.iter().enumerate() {
        for &j in nodes.iter().skip(idx + 1) {
            solver.assert(&rank(i)?.eq(&rank(j)?).not());
        }
    }
    // One chosen assignment per variable along a dependent path.
    for (i, j) in problem.uniq_pairs() {
        solver.assert(&Bool::and(&[a[&i].clone(), a[&j].clone()]).not());
    }

    match solver.check() {
        SatResult::Sat => {
            let model = solver
                .get_model()
                .ok_or_else(|| AssignError::Encoding("sat without a model".into()))?;
            let mut chosen: Vec<(i64, usize)> = Vec::new();
            for (idx, c) in problem.candidates.iter().enumerate() {
                let picked = model
                    .eval(&a[&c.node], true)
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                if !picked {
                    continue;
                }
                let pos = model
                    .eval(&rank(c.node)?, true)
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| {
                        AssignError::Encoding("ranking has no integer interpretation".into())
                    })?;
                chosen.push((pos, idx));
            }
            chosen.sort();
            let order = chosen
                .into_iter()
                .map(|(_, idx)| problem.candidates[idx].clone())
                .collect::<Vec<_>>();
            debug!(chosen = order.len(), "assignment strategy found");
            Ok(AssignOutcome::Strategy(Strategy { order }))
        }
        SatResult::Unsat => {
            debug!("assignment problem unsat, transition rejected");
            Ok(AssignOutcome::Rejected)
        }
        SatResult::Unknown => Err(AssignError::Indeterminate {
            reason: "auxiliary solver returned unknown".into(),
        }),
    }
}

fn encode_delta(d: &Delta, a: &HashMap<NodeId, Bool>) -> AssignResult<Bool> {
    match d {
        Delta::False => Ok(Bool::from_bool(false)),
        Delta::Cand(i) => a
            .get(i)
            .cloned()
            .ok_or_else(|| AssignError::Encoding(format!("unknown candidate {}", i))),
        Delta::AnyOf(children) => {
            let encoded = children
                .iter()
                .map(|c| encode_delta(c, a))
                .collect::<AssignResult<Vec<_>>>()?;
            Ok(Bool::or(&encoded))
        }
        Delta::AllOf(children) => {
            let encoded = children
                .iter()
                .map(|c| encode_delta(c, a))
                .collect::<AssignResult<Vec<_>>>()?;
            Ok(Bool::and(&encoded))
        }
    }
}
