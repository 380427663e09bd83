//! Ground expression encoder: IR over cells → Z3 AST.

use crate::{SmtError, SmtResult};
use opal_cells::{Arena, CellId, CellType};
use opal_ir::{ArithOp, CmpOp, Expr, ExprKind};
use z3::ast::{Bool, Dynamic, Int};
use z3::{FuncDecl, Sort, Symbol};

/// Z3 constant standing for a cell. Scalar cells map to native sorts
/// (strings and uninterpreted constants are interned to integers by the
/// value caches); every structural signature gets its own uninterpreted
/// sort, so native equality is only expressible between cells whose types
/// share a signature.
pub fn cell_const(arena: &Arena, c: CellId) -> Dynamic {
    let name = format!("c{}", c.0);
    match arena.ty(c) {
        CellType::Bool => Dynamic::from_ast(&Bool::new_const(name)),
        CellType::Int | CellType::Str | CellType::Constant(_) => {
            Dynamic::from_ast(&Int::new_const(name))
        }
        ty => {
            let sort = Sort::uninterpreted(Symbol::String(format!("T_{}", ty.signature())));
            FuncDecl::new(name, &[], &sort).apply(&[])
        }
    }
}

/// Z3 boolean selector for a recorded membership edge.
pub fn mem_selector(e: CellId, s: CellId) -> Bool {
    Bool::new_const(format!("in_{}_{}", e.0, s.0))
}

/// Encode a ground expression as a Z3 value.
pub fn encode(arena: &Arena, ex: &Expr) -> SmtResult<Dynamic> {
    match &ex.kind {
        ExprKind::Bool(b) => Ok(Dynamic::from_ast(&Bool::from_bool(*b))),
        ExprKind::Int(n) => Ok(Dynamic::from_ast(&Int::from_i64(*n))),

        ExprKind::CellRef(c) => Ok(cell_const(arena, *c)),

        // A selector for an edge that was never recorded is statically false;
        // the rules and the equality engine only emit selectors for real
        // edges, but rolled-back speculative expressions may still mention
        // them.
        ExprKind::InSet(e, s) => {
            if arena.has_edge(*s, *e) {
                Ok(Dynamic::from_ast(&mem_selector(*e, *s)))
            } else {
                Ok(Dynamic::from_ast(&Bool::from_bool(false)))
            }
        }

        ExprKind::And(args) => {
            if args.is_empty() {
                return Ok(Dynamic::from_ast(&Bool::from_bool(true)));
            }
            let encoded = encode_bools(arena, args)?;
            Ok(Dynamic::from_ast(&Bool::and(&encoded)))
        }
        ExprKind::Or(args) => {
            if args.is_empty() {
                return Ok(Dynamic::from_ast(&Bool::from_bool(false)));
            }
            let encoded = encode_bools(arena, args)?;
            Ok(Dynamic::from_ast(&Bool::or(&encoded)))
        }
        ExprKind::Not(a) => {
            let v = encode_bool(arena, a)?;
            Ok(Dynamic::from_ast(&v.not()))
        }
        ExprKind::Implies(a, b) => {
            let l = encode_bool(arena, a)?;
            let r = encode_bool(arena, b)?;
            Ok(Dynamic::from_ast(&l.implies(&r)))
        }
        ExprKind::Iff(a, b) => {
            let l = encode_bool(arena, a)?;
            let r = encode_bool(arena, b)?;
            Ok(Dynamic::from_ast(&l.iff(&r)))
        }

        ExprKind::Eq(a, b) => encode_eq(arena, ex, a, b),
        ExprKind::Ne(a, b) => {
            let eq = encode_eq(arena, ex, a, b)?;
            let eq_bool = eq.as_bool().ok_or_else(|| SmtError::SortMismatch {
                node: ex.id,
                detail: "equality did not encode to a boolean".into(),
            })?;
            Ok(Dynamic::from_ast(&eq_bool.not()))
        }

        ExprKind::Cmp { op, left, right } => {
            let l = encode_int(arena, left)?;
            let r = encode_int(arena, right)?;
            let b = match op {
                CmpOp::Lt => l.lt(&r),
                CmpOp::Le => l.le(&r),
                CmpOp::Gt => l.gt(&r),
                CmpOp::Ge => l.ge(&r),
            };
            Ok(Dynamic::from_ast(&b))
        }
        ExprKind::Arith { op, left, right } => {
            let l = encode_int(arena, left)?;
            let r = encode_int(arena, right)?;
            let v = match op {
                ArithOp::Add => Int::add(&[l, r]),
                ArithOp::Sub => Int::sub(&[l, r]),
                ArithOp::Mul => Int::mul(&[l, r]),
                ArithOp::Div => l.div(&r),
                ArithOp::Mod => l.modulo(&r),
            };
            Ok(Dynamic::from_ast(&v))
        }
        ExprKind::Neg(a) => {
            let v = encode_int(arena, a)?;
            Ok(Dynamic::from_ast(&v.unary_minus()))
        }

        ExprKind::Ite {
            cond,
            then_branch,
            else_branch,
        } => {
            let c = encode_bool(arena, cond)?;
            let t = encode(arena, then_branch)?;
            let e = encode(arena, else_branch)?;
            if let (Some(ti), Some(ei)) = (t.as_int(), e.as_int()) {
                Ok(Dynamic::from_ast(&c.ite(&ti, &ei)))
            } else if let (Some(tb), Some(eb)) = (t.as_bool(), e.as_bool()) {
                Ok(Dynamic::from_ast(&c.ite(&tb, &eb)))
            } else {
                Err(SmtError::SortMismatch {
                    node: ex.id,
                    detail: "if-then-else branches have incompatible sorts".into(),
                })
            }
        }

        other => Err(SmtError::NotGround {
            node: ex.id,
            detail: format!("operator not ground: {:?}", std::mem::discriminant(other)),
        }),
    }
}

/// Encode a ground expression that must be boolean.
pub fn encode_bool(arena: &Arena, ex: &Expr) -> SmtResult<Bool> {
    let v = encode(arena, ex)?;
    v.as_bool().ok_or_else(|| SmtError::SortMismatch {
        node: ex.id,
        detail: "expected a boolean expression".into(),
    })
}

/// Encode a ground expression that must be an integer.
pub fn encode_int(arena: &Arena, ex: &Expr) -> SmtResult<Int> {
    let v = encode(arena, ex)?;
    v.as_int().ok_or_else(|| SmtError::SortMismatch {
        node: ex.id,
        detail: "expected an integer expression".into(),
    })
}

fn encode_bools(arena: &Arena, args: &[Expr]) -> SmtResult<Vec<Bool>> {
    args.iter().map(|a| encode_bool(arena, a)).collect()
}

/// The solver sort a cell constant lives in. Strings and uninterpreted
/// constants share the integer sort through interning.
fn sort_class(ty: &CellType) -> String {
    match ty {
        CellType::Bool => "Bool".to_string(),
        CellType::Int | CellType::Str | CellType::Constant(_) => "Int".to_string(),
        other => format!("T_{}", other.signature()),
    }
}

fn encode_eq(arena: &Arena, parent: &Expr, a: &Expr, b: &Expr) -> SmtResult<Dynamic> {
    // Native equality between cells requires a shared solver sort; a
    // mismatch here means the equality engine skipped its comparability
    // check, which is a bug upstream, not something to paper over.
    if let (ExprKind::CellRef(ca), ExprKind::CellRef(cb)) = (&a.kind, &b.kind) {
        let class_a = sort_class(arena.ty(*ca));
        let class_b = sort_class(arena.ty(*cb));
        if class_a != class_b {
            return Err(SmtError::SortMismatch {
                node: parent.id,
                detail: format!("native equality between sorts {} and {}", class_a, class_b),
            });
        }
    }
    let l = encode(arena, a)?;
    let r = encode(arena, b)?;
    if let (Some(li), Some(ri)) = (l.as_int(), r.as_int()) {
        Ok(Dynamic::from_ast(&li.eq(&ri)))
    } else if let (Some(lb), Some(rb)) = (l.as_bool(), r.as_bool()) {
        Ok(Dynamic::from_ast(&lb.eq(&rb)))
    } else {
        Ok(Dynamic::from_ast(&l.eq(&r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_ir::IdGen;

    fn cell_ref(gen: &IdGen, c: CellId) -> Expr {
        Expr::new(gen, ExprKind::CellRef(c))
    }

    #[test]
    fn test_unrecorded_selector_is_false() {
        let mut arena = Arena::new();
        let s = arena.alloc(CellType::FinSet(Box::new(CellType::Int)));
        let e = arena.alloc(CellType::Int);
        let gen = IdGen::new();
        let ex = Expr::new(&gen, ExprKind::InSet(e, s));
        let v = encode(&arena, &ex).unwrap();
        assert_eq!(v.as_bool().unwrap().as_bool(), Some(false));
    }

    #[test]
    fn test_non_ground_rejected() {
        let arena = Arena::new();
        let gen = IdGen::new();
        let ex = Expr::new(&gen, ExprKind::Name("x".into()));
        assert!(matches!(
            encode(&arena, &ex),
            Err(SmtError::NotGround { .. })
        ));
    }

    #[test]
    fn test_scalar_equality_encodes() {
        let mut arena = Arena::new();
        let a = arena.alloc(CellType::Int);
        let b = arena.alloc(CellType::Int);
        let gen = IdGen::new();
        let eq = Expr::new(
            &gen,
            ExprKind::Eq(
                Box::new(cell_ref(&gen, a)),
                Box::new(cell_ref(&gen, b)),
            ),
        );
        assert!(encode_bool(&arena, &eq).is_ok());
    }

    #[test]
    fn test_mismatched_structural_sorts_rejected() {
        let mut arena = Arena::new();
        let a = arena.alloc(CellType::FinSet(Box::new(CellType::Int)));
        let b = arena.alloc(CellType::FinSet(Box::new(CellType::Bool)));
        let gen = IdGen::new();
        let eq = Expr::new(
            &gen,
            ExprKind::Eq(
                Box::new(cell_ref(&gen, a)),
                Box::new(cell_ref(&gen, b)),
            ),
        );
        assert!(matches!(
            encode(&arena, &eq),
            Err(SmtError::SortMismatch { .. })
        ));
    }
}
