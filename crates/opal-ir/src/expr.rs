//! Expression tree with unique node ids.

use opal_cells::CellId;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique id of an IR node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Generator of unique node ids. One per run.
#[derive(Debug, Default)]
pub struct IdGen {
    next: AtomicU64,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&self) -> NodeId {
        NodeId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Binary arithmetic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Integer comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
}

/// An IR expression: a unique id plus the operator node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
}

/// Operator nodes of the IR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    // === Literals ===
    Bool(bool),
    Int(i64),
    Str(String),

    // === Names ===
    /// Reference to a bound name (state variable or quantified variable).
    Name(String),
    /// Next-state reference to a state variable.
    Prime(String),

    // === Arena-level terms (produced by the engine, ground for the solver) ===
    /// Reference to an arena cell.
    CellRef(CellId),
    /// Membership selector for a recorded `has` edge `(element, collection)`.
    InSet(CellId, CellId),

    // === Logic ===
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Iff(Box<Expr>, Box<Expr>),

    // === Equality ===
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),

    // === Sets ===
    /// Set enumeration `{e1, ..., en}`.
    Enum(Vec<Expr>),
    /// Language-level membership `elem ∈ set`.
    Mem { elem: Box<Expr>, set: Box<Expr> },
    NotMem { elem: Box<Expr>, set: Box<Expr> },
    Subseteq { left: Box<Expr>, right: Box<Expr> },

    // === Quantifiers over finite sets ===
    Exists {
        var: String,
        set: Box<Expr>,
        pred: Box<Expr>,
    },
    Forall {
        var: String,
        set: Box<Expr>,
        pred: Box<Expr>,
    },

    // === Integers ===
    Arith {
        op: ArithOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Neg(Box<Expr>),
    Cmp {
        op: CmpOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    // === Control ===
    Ite {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    // === Structures ===
    Tuple(Vec<Expr>),
    /// Record constructor; fields are kept in source order and normalised by
    /// the record rule.
    Record(Vec<(String, Expr)>),
    /// Sequence literal `<<e1, ..., en>>`.
    SeqLit(Vec<Expr>),
    /// Record field access.
    Field { base: Box<Expr>, field: String },
    /// Tuple projection, 1-based as in the surface language.
    Proj { base: Box<Expr>, index: usize },

    // === Functions ===
    /// Function constructor `[var ∈ domain ↦ body]`.
    FunCtor {
        var: String,
        domain: Box<Expr>,
        body: Box<Expr>,
    },
    /// Function application.
    App { fun: Box<Expr>, arg: Box<Expr> },
    /// The set of all functions `[domain → codomain]`.
    FunSet {
        domain: Box<Expr>,
        codomain: Box<Expr>,
    },
}

impl Expr {
    pub fn new(gen: &IdGen, kind: ExprKind) -> Self {
        Expr {
            id: gen.fresh(),
            kind,
        }
    }

    /// Whether the focus is terminal for the rewriting driver.
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, ExprKind::CellRef(_) | ExprKind::Bool(_))
    }

    /// The cell behind a terminal cell reference.
    pub fn as_cell(&self) -> Option<CellId> {
        match self.kind {
            ExprKind::CellRef(c) => Some(c),
            _ => None,
        }
    }

    /// Names referenced in next-state position anywhere below this node.
    pub fn primed_names(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_primed(&mut out);
        out
    }

    fn collect_primed(&self, out: &mut BTreeSet<String>) {
        if let ExprKind::Prime(name) = &self.kind {
            out.insert(name.clone());
        }
        self.for_each_child(&mut |child| child.collect_primed(out));
    }

    /// Plain name references anywhere below this node. Quantifier-bound
    /// names are included; callers filter against their variable set.
    pub fn plain_names(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_plain(&mut out);
        out
    }

    fn collect_plain(&self, out: &mut BTreeSet<String>) {
        if let ExprKind::Name(name) = &self.kind {
            out.insert(name.clone());
        }
        self.for_each_child(&mut |child| child.collect_plain(out));
    }

    /// Apply `f` to each direct child expression.
    pub fn for_each_child(&self, f: &mut impl FnMut(&Expr)) {
        use ExprKind::*;
        match &self.kind {
            Bool(_) | Int(_) | Str(_) | Name(_) | Prime(_) | CellRef(_) | InSet(_, _) => {}
            And(args) | Or(args) | Enum(args) | Tuple(args) | SeqLit(args) => {
                args.iter().for_each(&mut *f)
            }
            Not(a) | Neg(a) => f(a),
            Implies(a, b) | Iff(a, b) | Eq(a, b) | Ne(a, b) => {
                f(a);
                f(b);
            }
            Mem { elem, set } | NotMem { elem, set } => {
                f(elem);
                f(set);
            }
            Subseteq { left, right } => {
                f(left);
                f(right);
            }
            Exists { set, pred, .. } | Forall { set, pred, .. } => {
                f(set);
                f(pred);
            }
            Arith { left, right, .. } | Cmp { left, right, .. } => {
                f(left);
                f(right);
            }
            Ite {
                cond,
                then_branch,
                else_branch,
            } => {
                f(cond);
                f(then_branch);
                f(else_branch);
            }
            Record(fields) => fields.iter().for_each(|(_, e)| f(e)),
            Field { base, .. } | Proj { base, .. } => f(base),
            FunCtor { domain, body, .. } => {
                f(domain);
                f(body);
            }
            App { fun, arg } => {
                f(fun);
                f(arg);
            }
            FunSet { domain, codomain } => {
                f(domain);
                f(codomain);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ExprKind::*;
        match &self.kind {
            Bool(b) => write!(f, "{}", b),
            Int(n) => write!(f, "{}", n),
            Str(s) => write!(f, "\"{}\"", s),
            Name(n) => write!(f, "{}", n),
            Prime(n) => write!(f, "{}'", n),
            CellRef(c) => write!(f, "{}", c),
            InSet(e, s) => write!(f, "in({}, {})", e, s),
            And(args) => join_op(f, "/\\", args),
            Or(args) => join_op(f, "\\/", args),
            Not(a) => write!(f, "~{}", a),
            Implies(a, b) => write!(f, "({} => {})", a, b),
            Iff(a, b) => write!(f, "({} <=> {})", a, b),
            Eq(a, b) => write!(f, "({} = {})", a, b),
            Ne(a, b) => write!(f, "({} /= {})", a, b),
            Enum(args) => {
                write!(f, "{{")?;
                join_comma(f, args)?;
                write!(f, "}}")
            }
            Mem { elem, set } => write!(f, "({} \\in {})", elem, set),
            NotMem { elem, set } => write!(f, "({} \\notin {})", elem, set),
            Subseteq { left, right } => write!(f, "({} \\subseteq {})", left, right),
            Exists { var, set, pred } => write!(f, "(\\E {} \\in {}: {})", var, set, pred),
            Forall { var, set, pred } => write!(f, "(\\A {} \\in {}: {})", var, set, pred),
            Arith { op, left, right } => {
                let sym = match op {
                    ArithOp::Add => "+",
                    ArithOp::Sub => "-",
                    ArithOp::Mul => "*",
                    ArithOp::Div => "div",
                    ArithOp::Mod => "mod",
                };
                write!(f, "({} {} {})", left, sym, right)
            }
            Neg(a) => write!(f, "-{}", a),
            Cmp { op, left, right } => {
                let sym = match op {
                    CmpOp::Lt => "<",
                    CmpOp::Le => "<=",
                    CmpOp::Gt => ">",
                    CmpOp::Ge => ">=",
                };
                write!(f, "({} {} {})", left, sym, right)
            }
            Ite {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "(IF {} THEN {} ELSE {})", cond, then_branch, else_branch),
            Tuple(args) => {
                write!(f, "<<")?;
                join_comma(f, args)?;
                write!(f, ">>")
            }
            Record(fields) => {
                write!(f, "[")?;
                for (i, (name, e)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} |-> {}", name, e)?;
                }
                write!(f, "]")
            }
            SeqLit(args) => {
                write!(f, "<<")?;
                join_comma(f, args)?;
                write!(f, ">>")
            }
            Field { base, field } => write!(f, "{}.{}", base, field),
            Proj { base, index } => write!(f, "{}[{}]", base, index),
            FunCtor { var, domain, body } => write!(f, "[{} \\in {} |-> {}]", var, domain, body),
            App { fun, arg } => write!(f, "{}[{}]", fun, arg),
            FunSet { domain, codomain } => write!(f, "[{} -> {}]", domain, codomain),
        }
    }
}

fn join_op(f: &mut fmt::Formatter<'_>, op: &str, args: &[Expr]) -> fmt::Result {
    write!(f, "(")?;
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", op)?;
        }
        write!(f, "{}", a)?;
    }
    write!(f, ")")
}

fn join_comma(f: &mut fmt::Formatter<'_>, args: &[Expr]) -> fmt::Result {
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", a)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(gen: &IdGen, kind: ExprKind) -> Expr {
        Expr::new(gen, kind)
    }

    #[test]
    fn test_ids_are_unique() {
        let gen = IdGen::new();
        let a = e(&gen, ExprKind::Int(1));
        let b = e(&gen, ExprKind::Int(1));
        assert_ne!(a.id, b.id);
        assert_eq!(a.kind, b.kind);
    }

    #[test]
    fn test_primed_names_collected_transitively() {
        let gen = IdGen::new();
        // v' \in { w' + 1 }
        let rhs = e(
            &gen,
            ExprKind::Enum(vec![e(
                &gen,
                ExprKind::Arith {
                    op: ArithOp::Add,
                    left: Box::new(e(&gen, ExprKind::Prime("w".into()))),
                    right: Box::new(e(&gen, ExprKind::Int(1))),
                },
            )]),
        );
        let mem = e(
            &gen,
            ExprKind::Mem {
                elem: Box::new(e(&gen, ExprKind::Prime("v".into()))),
                set: Box::new(rhs),
            },
        );
        let primed: Vec<String> = mem.primed_names().into_iter().collect();
        assert_eq!(primed, vec!["v".to_string(), "w".to_string()]);
    }

    #[test]
    fn test_display_roundtrip_shapes() {
        let gen = IdGen::new();
        let ex = e(
            &gen,
            ExprKind::And(vec![
                e(&gen, ExprKind::Bool(true)),
                e(&gen, ExprKind::Name("x".into())),
            ]),
        );
        assert_eq!(ex.to_string(), "(true /\\ x)");
    }
}
