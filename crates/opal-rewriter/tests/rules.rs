//! Rewrite rules end to end: rewriting produces cells whose constraints
//! pin the expected values.

use opal_cells::{CellId, CellType, Value};
use opal_ir::{ArithOp, CmpOp, Expr, ExprKind, IdGen};
use opal_rewriter::{Rewriter, RewriterError, SymbState};
use opal_smt::SatOutcome;
use std::rc::Rc;

fn new_rewriter() -> (Rc<IdGen>, Rewriter) {
    let gen = Rc::new(IdGen::new());
    let rw = Rewriter::new(gen.clone()).unwrap();
    (gen, rw)
}

fn e(gen: &IdGen, kind: ExprKind) -> Expr {
    Expr::new(gen, kind)
}

fn int(gen: &IdGen, n: i64) -> Expr {
    e(gen, ExprKind::Int(n))
}

fn set(gen: &IdGen, elems: Vec<Expr>) -> Expr {
    e(gen, ExprKind::Enum(elems))
}

fn rewrite(rw: &mut Rewriter, ex: Expr) -> CellId {
    let st = rw.rewrite_until_done(SymbState::new(ex)).unwrap();
    rw.focus_cell(&st).unwrap()
}

/// A boolean result cell must be pinned to the expected truth value.
fn assert_bool_cell(rw: &mut Rewriter, gen: &IdGen, c: CellId, expected: bool) {
    let cell_ref = e(gen, ExprKind::CellRef(c));
    let claim = if expected {
        e(gen, ExprKind::Not(Box::new(cell_ref)))
    } else {
        cell_ref
    };
    rw.push();
    rw.smt.assert_ground(&rw.arena, &claim).unwrap();
    assert_eq!(rw.smt.sat(), SatOutcome::Unsat, "cell not pinned to {}", expected);
    rw.pop().unwrap();
}

#[test]
fn logic_rules_evaluate_literals() {
    let (gen, mut rw) = new_rewriter();
    let tf = e(
        &gen,
        ExprKind::And(vec![e(&gen, ExprKind::Bool(true)), e(&gen, ExprKind::Bool(false))]),
    );
    let c = rewrite(&mut rw, tf);
    assert_bool_cell(&mut rw, &gen, c, false);

    let or = e(
        &gen,
        ExprKind::Or(vec![e(&gen, ExprKind::Bool(false)), e(&gen, ExprKind::Bool(true))]),
    );
    let c = rewrite(&mut rw, or);
    assert_bool_cell(&mut rw, &gen, c, true);

    let neg = e(
        &gen,
        ExprKind::Not(Box::new(e(&gen, ExprKind::Bool(true)))),
    );
    let c = rewrite(&mut rw, neg);
    assert_bool_cell(&mut rw, &gen, c, false);
}

#[test]
fn membership_over_enumerated_set() {
    let (gen, mut rw) = new_rewriter();
    let mem = e(
        &gen,
        ExprKind::Mem {
            elem: Box::new(int(&gen, 2)),
            set: Box::new(set(&gen, vec![int(&gen, 1), int(&gen, 2), int(&gen, 3)])),
        },
    );
    let c = rewrite(&mut rw, mem);
    assert_bool_cell(&mut rw, &gen, c, true);

    let absent = e(
        &gen,
        ExprKind::Mem {
            elem: Box::new(int(&gen, 5)),
            set: Box::new(set(&gen, vec![int(&gen, 1), int(&gen, 2)])),
        },
    );
    let c = rewrite(&mut rw, absent);
    assert_bool_cell(&mut rw, &gen, c, false);
}

#[test]
fn quantifiers_expand_over_members() {
    let (gen, mut rw) = new_rewriter();
    let exists = e(
        &gen,
        ExprKind::Exists {
            var: "x".into(),
            set: Box::new(set(&gen, vec![int(&gen, 1), int(&gen, 2)])),
            pred: Box::new(e(
                &gen,
                ExprKind::Eq(
                    Box::new(e(&gen, ExprKind::Name("x".into()))),
                    Box::new(int(&gen, 2)),
                ),
            )),
        },
    );
    let c = rewrite(&mut rw, exists);
    assert_bool_cell(&mut rw, &gen, c, true);

    let forall = e(
        &gen,
        ExprKind::Forall {
            var: "x".into(),
            set: Box::new(set(&gen, vec![int(&gen, 1), int(&gen, 2)])),
            pred: Box::new(e(
                &gen,
                ExprKind::Cmp {
                    op: CmpOp::Ge,
                    left: Box::new(e(&gen, ExprKind::Name("x".into()))),
                    right: Box::new(int(&gen, 1)),
                },
            )),
        },
    );
    let c = rewrite(&mut rw, forall);
    assert_bool_cell(&mut rw, &gen, c, true);
}

#[test]
fn arithmetic_and_comparison() {
    let (gen, mut rw) = new_rewriter();
    let sum_lt = e(
        &gen,
        ExprKind::Cmp {
            op: CmpOp::Lt,
            left: Box::new(e(
                &gen,
                ExprKind::Arith {
                    op: ArithOp::Add,
                    left: Box::new(int(&gen, 1)),
                    right: Box::new(int(&gen, 2)),
                },
            )),
            right: Box::new(int(&gen, 4)),
        },
    );
    let c = rewrite(&mut rw, sum_lt);
    assert_bool_cell(&mut rw, &gen, c, true);
}

#[test]
fn record_field_access() {
    let (gen, mut rw) = new_rewriter();
    let field_eq = e(
        &gen,
        ExprKind::Eq(
            Box::new(e(
                &gen,
                ExprKind::Field {
                    base: Box::new(e(
                        &gen,
                        ExprKind::Record(vec![
                            ("a".to_string(), int(&gen, 1)),
                            ("b".to_string(), e(&gen, ExprKind::Bool(true))),
                        ]),
                    )),
                    field: "a".to_string(),
                },
            )),
            Box::new(int(&gen, 1)),
        ),
    );
    let c = rewrite(&mut rw, field_eq);
    assert_bool_cell(&mut rw, &gen, c, true);
}

#[test]
fn tuple_projection_is_one_based() {
    let (gen, mut rw) = new_rewriter();
    let proj_eq = e(
        &gen,
        ExprKind::Eq(
            Box::new(e(
                &gen,
                ExprKind::Proj {
                    base: Box::new(e(
                        &gen,
                        ExprKind::Tuple(vec![int(&gen, 7), int(&gen, 9)]),
                    )),
                    index: 2,
                },
            )),
            Box::new(int(&gen, 9)),
        ),
    );
    let c = rewrite(&mut rw, proj_eq);
    assert_bool_cell(&mut rw, &gen, c, true);
}

#[test]
fn function_application() {
    let (gen, mut rw) = new_rewriter();
    // [x \in {1,2} |-> x + 10][2] = 12
    let app_eq = e(
        &gen,
        ExprKind::Eq(
            Box::new(e(
                &gen,
                ExprKind::App {
                    fun: Box::new(e(
                        &gen,
                        ExprKind::FunCtor {
                            var: "x".into(),
                            domain: Box::new(set(&gen, vec![int(&gen, 1), int(&gen, 2)])),
                            body: Box::new(e(
                                &gen,
                                ExprKind::Arith {
                                    op: ArithOp::Add,
                                    left: Box::new(e(&gen, ExprKind::Name("x".into()))),
                                    right: Box::new(int(&gen, 10)),
                                },
                            )),
                        },
                    )),
                    arg: Box::new(int(&gen, 2)),
                },
            )),
            Box::new(int(&gen, 12)),
        ),
    );
    let c = rewrite(&mut rw, app_eq);
    assert_bool_cell(&mut rw, &gen, c, true);
}

#[test]
fn scalar_if_then_else() {
    let (gen, mut rw) = new_rewriter();
    let ite_eq = e(
        &gen,
        ExprKind::Eq(
            Box::new(e(
                &gen,
                ExprKind::Ite {
                    cond: Box::new(e(&gen, ExprKind::Bool(true))),
                    then_branch: Box::new(int(&gen, 1)),
                    else_branch: Box::new(int(&gen, 2)),
                },
            )),
            Box::new(int(&gen, 1)),
        ),
    );
    let c = rewrite(&mut rw, ite_eq);
    assert_bool_cell(&mut rw, &gen, c, true);
}

#[test]
fn structured_if_then_else_has_no_rule() {
    let (gen, mut rw) = new_rewriter();
    let ite = e(
        &gen,
        ExprKind::Ite {
            cond: Box::new(e(&gen, ExprKind::Bool(true))),
            then_branch: Box::new(set(&gen, vec![int(&gen, 1)])),
            else_branch: Box::new(set(&gen, vec![int(&gen, 2)])),
        },
    );
    let err = rw.rewrite_until_done(SymbState::new(ite)).unwrap_err();
    assert!(matches!(err, RewriterError::NoRuleApplies { .. }));
}

#[test]
fn unbound_name_is_fatal() {
    let (gen, mut rw) = new_rewriter();
    let ex = e(&gen, ExprKind::Name("ghost".into()));
    let err = rw.rewrite_until_done(SymbState::new(ex)).unwrap_err();
    assert!(matches!(err, RewriterError::UnboundName { .. }));
}

#[test]
fn assignment_binds_picked_member() {
    let (gen, mut rw) = new_rewriter();
    // v' \in {1, 2}
    let assign = e(
        &gen,
        ExprKind::Mem {
            elem: Box::new(e(&gen, ExprKind::Prime("v".into()))),
            set: Box::new(set(&gen, vec![int(&gen, 1), int(&gen, 2)])),
        },
    );
    let st = rw.rewrite_until_done(SymbState::new(assign)).unwrap();
    let enabled = rw.focus_cell(&st).unwrap();
    let picked = st.lookup(&SymbState::primed_key("v")).expect("v' bound");

    // The transition predicate is satisfiable and the picked value is one
    // of the members.
    rw.smt
        .assert_ground(&rw.arena, &e(&gen, ExprKind::CellRef(enabled)))
        .unwrap();
    assert_eq!(rw.smt.sat(), SatOutcome::Sat);
    let v = rw.decode(picked).unwrap();
    assert!(v == Value::Int(1) || v == Value::Int(2));
}

#[test]
fn assignment_already_bound_is_a_membership_test() {
    let (gen, mut rw) = new_rewriter();
    let first = e(
        &gen,
        ExprKind::Mem {
            elem: Box::new(e(&gen, ExprKind::Prime("v".into()))),
            set: Box::new(set(&gen, vec![int(&gen, 1)])),
        },
    );
    let st = rw.rewrite_until_done(SymbState::new(first)).unwrap();
    let bound_before = st.lookup(&SymbState::primed_key("v")).unwrap();

    // Second occurrence reads the binding instead of re-assigning.
    let second = e(
        &gen,
        ExprKind::Mem {
            elem: Box::new(e(&gen, ExprKind::Prime("v".into()))),
            set: Box::new(set(&gen, vec![int(&gen, 1), int(&gen, 2)])),
        },
    );
    let st = rw.rewrite_until_done(st.with_focus(second)).unwrap();
    assert_eq!(st.lookup(&SymbState::primed_key("v")), Some(bound_before));
}

#[test]
fn assignment_inside_disjunction_is_malformed() {
    let (gen, mut rw) = new_rewriter();
    let assign = e(
        &gen,
        ExprKind::Mem {
            elem: Box::new(e(&gen, ExprKind::Prime("v".into()))),
            set: Box::new(set(&gen, vec![int(&gen, 1)])),
        },
    );
    let or = e(&gen, ExprKind::Or(vec![assign, e(&gen, ExprKind::Bool(true))]));
    let err = rw.rewrite_until_done(SymbState::new(or)).unwrap_err();
    assert!(matches!(err, RewriterError::MalformedIr { .. }));
}

#[test]
fn decode_set_and_seq_values() {
    let (gen, mut rw) = new_rewriter();
    let s = rewrite(
        &mut rw,
        set(&gen, vec![int(&gen, 1), int(&gen, 2)]),
    );
    let q = rewrite(
        &mut rw,
        e(
            &gen,
            ExprKind::SeqLit(vec![int(&gen, 4), int(&gen, 5)]),
        ),
    );
    assert_eq!(rw.smt.sat(), SatOutcome::Sat);
    assert_eq!(
        rw.decode(s).unwrap(),
        Value::Set(vec![Value::Int(1), Value::Int(2)])
    );
    assert_eq!(
        rw.decode(q).unwrap(),
        Value::Seq(vec![Value::Int(4), Value::Int(5)])
    );
}
