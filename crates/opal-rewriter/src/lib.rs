//! The symbolic rewriting engine.
//!
//! Rewrites specification expressions into arena cells plus solver
//! constraints. Equality between structured cells is generated lazily: a
//! constraint is built at most once per cell pair, cached in a scoped map
//! whose push/pop depth mirrors the solver's, and reused as native solver
//! equality from then on.

pub mod cache;
pub mod decode;
pub mod lazy_eq;
pub mod rewriter;
pub mod rules;
pub mod scoped;
pub mod state;
pub mod values;

use opal_cells::CellId;
use opal_ir::NodeId;
use opal_smt::SmtError;
use thiserror::Error;

/// Fatal engine error. None of these are caught inside the core; they
/// propagate to the top of the verification run.
#[derive(Debug, Error)]
pub enum RewriterError {
    #[error("cells {a}: {ta} and {b}: {tb} have incomparable types")]
    IncomparableTypes {
        a: CellId,
        b: CellId,
        ta: String,
        tb: String,
    },

    #[error("equality of {a} and {b} queried before its constraints were cached")]
    UncachedEquality { a: CellId, b: CellId },

    #[error("no rewriting rule applies at {node}: `{expr}`")]
    NoRuleApplies { node: NodeId, expr: String },

    #[error("malformed input at {node}: {detail} in `{expr}`")]
    MalformedIr {
        node: NodeId,
        detail: String,
        expr: String,
    },

    #[error("cell {cell} lacks the expected structure: {detail}")]
    MalformedCell { cell: CellId, detail: String },

    #[error("name `{name}` is not bound at {node}")]
    UnboundName { name: String, node: NodeId },

    #[error(transparent)]
    Smt(#[from] SmtError),
}

pub type RwResult<T> = Result<T, RewriterError>;

pub use cache::{EqCache, EqEntry};
pub use rewriter::Rewriter;
pub use scoped::{MapSnapshot, ScopedMap};
pub use state::SymbState;
