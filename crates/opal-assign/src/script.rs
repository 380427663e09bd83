//! SMT-LIB2 rendering of the assignment problem.

use crate::formula::{Delta, Problem};
use opal_ir::NodeId;
use std::fmt::Write;

fn a_name(id: NodeId) -> String {
    format!("A_{}", id.0)
}

fn r_app(id: NodeId) -> String {
    format!("(R {})", id.0)
}

fn delta_sexpr(d: &Delta) -> String {
    match d {
        Delta::False => "false".to_string(),
        Delta::Cand(i) => a_name(*i),
        Delta::AnyOf(children) => {
            let inner: Vec<String> = children.iter().map(delta_sexpr).collect();
            format!("(or {})", inner.join(" "))
        }
        Delta::AllOf(children) => {
            let inner: Vec<String> = children.iter().map(delta_sexpr).collect();
            format!("(and {})", inner.join(" "))
        }
    }
}

/// Render the problem as an SMT-LIB2 script in QF_UFLIA: one boolean
/// constant per candidate, one uninterpreted ranking function `R`.
pub fn render(problem: &Problem) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "(set-logic QF_UFLIA)");
    for c in &problem.candidates {
        let _ = writeln!(out, "(declare-const {} Bool)", a_name(c.node));
    }
    let _ = writeln!(out, "(declare-fun R (Int) Int)");

    let _ = writeln!(out, "; coverage: one assignment per variable on every branch");
    for (var, d) in &problem.deltas {
        let _ = writeln!(out, "; var {}", var);
        let _ = writeln!(out, "(assert {})", delta_sexpr(d));
    }

    let _ = writeln!(out, "; ordering respects data dependencies");
    for (i, j) in problem.order_pairs() {
        let _ = writeln!(out, "(assert (< {} {}))", r_app(i), r_app(j));
    }

    let _ = writeln!(out, "; ranking is injective");
    let nodes: Vec<NodeId> = problem.candidates.iter().map(|c| c.node).collect();
    for (idx, &i) in nodes.iter().enumerate() {
        for &j in nodes.iter().skip(idx + 1) {
            let _ = writeln!(out, "(assert (not (= {} {})))", r_app(i), r_app(j));
        }
    }

    let _ = writeln!(out, "; at most one chosen assignment per variable per path");
    for (i, j) in problem.uniq_pairs() {
        let _ = writeln!(out, "(assert (not (and {} {})))", a_name(i), a_name(j));
    }
    out
}

/// Script variant for standalone solving from a file.
pub fn render_file(problem: &Problem) -> String {
    let mut out = render(problem);
    out.push_str("(check-sat)\n(get-model)\n(exit)\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_ir::{Expr, ExprKind, IdGen};

    #[test]
    fn test_script_shape() {
        let gen = IdGen::new();
        let ax = Expr::new(
            &gen,
            ExprKind::Mem {
                elem: Box::new(Expr::new(&gen, ExprKind::Prime("x".into()))),
                set: Box::new(Expr::new(
                    &gen,
                    ExprKind::Enum(vec![Expr::new(&gen, ExprKind::Int(0))]),
                )),
            },
        );
        let ay = Expr::new(
            &gen,
            ExprKind::Mem {
                elem: Box::new(Expr::new(&gen, ExprKind::Prime("y".into()))),
                set: Box::new(Expr::new(
                    &gen,
                    ExprKind::Enum(vec![Expr::new(&gen, ExprKind::Prime("x".into()))]),
                )),
            },
        );
        let (ix, iy) = (ax.id, ay.id);
        let top = Expr::new(&gen, ExprKind::And(vec![ax, ay]));
        let problem = Problem::build(&top, &["x".into(), "y".into()], true);

        let script = render_file(&problem);
        assert!(script.starts_with("(set-logic QF_UFLIA)"));
        assert!(script.contains(&format!("(declare-const A_{} Bool)", ix.0)));
        assert!(script.contains("(declare-fun R (Int) Int)"));
        assert!(script.contains(&format!("(assert (< (R {}) (R {})))", ix.0, iy.0)));
        assert!(script.contains(&format!(
            "(assert (not (= (R {}) (R {}))))",
            ix.0, iy.0
        )));
        assert!(script.ends_with("(check-sat)\n(get-model)\n(exit)\n"));
    }
}
