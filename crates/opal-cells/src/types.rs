//! Types assignable to arena cells.

use std::collections::BTreeMap;
use std::fmt;

/// The type of an arena cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellType {
    /// Placeholder element type, used only by the statically empty set.
    Unknown,
    /// Boolean.
    Bool,
    /// Integer.
    Int,
    /// String constant (interned to an integer id at the solver level).
    Str,
    /// Uninterpreted constant of a named sort.
    Constant(String),
    /// Finite set of cells of the element type.
    FinSet(Box<CellType>),
    /// Function, described by its argument and result element types.
    Fun(Box<CellType>, Box<CellType>),
    /// The set of all functions between two given sets. The components are
    /// the set types of the domain and codomain.
    FinFunSet(Box<CellType>, Box<CellType>),
    /// Record with named fields, ordered by field name.
    Record(BTreeMap<String, CellType>),
    /// Tuple with per-position element types.
    Tuple(Vec<CellType>),
    /// Sequence of cells of the element type.
    Seq(Box<CellType>),
}

impl CellType {
    /// A scalar type maps directly to a solver sort and needs no structural
    /// equality constraints.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            CellType::Bool | CellType::Int | CellType::Str | CellType::Constant(_)
        )
    }

    /// Whether the equality engine is permitted to relate two types.
    ///
    /// The relation is reflexive and symmetric: scalars compare to the same
    /// scalar kind, containers of the same shape compare componentwise, and
    /// `Unknown` compares to everything. Records with differing field sets
    /// remain comparable as long as their common fields are; the missing
    /// fields are resolved at constraint-generation time. Tuples of
    /// different lengths are not comparable.
    pub fn comparable_to(&self, other: &CellType) -> bool {
        use CellType::*;
        match (self, other) {
            (Unknown, _) | (_, Unknown) => true,
            (Bool, Bool) | (Int, Int) | (Str, Str) => true,
            (Constant(a), Constant(b)) => a == b,
            (FinSet(a), FinSet(b)) => a.comparable_to(b),
            (Fun(aa, ar), Fun(ba, br)) => aa.comparable_to(ba) && ar.comparable_to(br),
            (FinFunSet(ad, ac), FinFunSet(bd, bc)) => {
                ad.comparable_to(bd) && ac.comparable_to(bc)
            }
            (Record(af), Record(bf)) => af
                .iter()
                .filter_map(|(name, ta)| bf.get(name).map(|tb| (ta, tb)))
                .all(|(ta, tb)| ta.comparable_to(tb)),
            (Tuple(ae), Tuple(be)) => {
                ae.len() == be.len() && ae.iter().zip(be).all(|(ta, tb)| ta.comparable_to(tb))
            }
            (Seq(a), Seq(b)) => a.comparable_to(b),
            _ => false,
        }
    }

    /// Canonical solver sort signature. Scalar signatures are mapped onto
    /// native solver sorts by the gateway; every structural signature
    /// becomes a dedicated uninterpreted sort, so native equality is only
    /// well-sorted between cells that share a signature.
    pub fn signature(&self) -> String {
        use CellType::*;
        match self {
            Unknown => "u".to_string(),
            Bool => "b".to_string(),
            Int => "i".to_string(),
            Str => "s".to_string(),
            Constant(sort) => format!("C{}", sort),
            FinSet(e) => format!("S{}", e.signature()),
            Fun(a, r) => format!("f{}_{}", a.signature(), r.signature()),
            FinFunSet(d, c) => format!("F{}_{}", d.signature(), c.signature()),
            Record(fields) => {
                let inner: Vec<String> = fields
                    .iter()
                    .map(|(name, ty)| format!("{}:{}", name, ty.signature()))
                    .collect();
                format!("r[{}]", inner.join(","))
            }
            Tuple(elems) => {
                let inner: Vec<String> = elems.iter().map(|t| t.signature()).collect();
                format!("t[{}]", inner.join(","))
            }
            Seq(e) => format!("q{}", e.signature()),
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CellType::*;
        match self {
            Unknown => write!(f, "Unknown"),
            Bool => write!(f, "Bool"),
            Int => write!(f, "Int"),
            Str => write!(f, "Str"),
            Constant(sort) => write!(f, "{}", sort),
            FinSet(e) => write!(f, "Set[{}]", e),
            Fun(a, r) => write!(f, "Fun[{}, {}]", a, r),
            FinFunSet(d, c) => write!(f, "FunSet[{}, {}]", d, c),
            Record(fields) => {
                write!(f, "{{ ")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                write!(f, " }}")
            }
            Tuple(elems) => {
                write!(f, "(")?;
                for (i, ty) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", ty)?;
                }
                write!(f, ")")
            }
            Seq(e) => write!(f, "Seq[{}]", e),
        }
    }
}
