//! Bounded safety checking: unroll the next-state relation over the
//! symbolic rewriting engine and check invariants at every depth.

pub mod checker;

use opal_assign::AssignError;
use opal_cells::{CellType, Value};
use opal_ir::Expr;
use opal_rewriter::RewriterError;
use opal_smt::SmtError;
use std::path::PathBuf;
use thiserror::Error;

/// Checking error. Fatal engine errors pass through untouched.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Rewriter(#[from] RewriterError),

    #[error(transparent)]
    Assign(#[from] AssignError),

    #[error(transparent)]
    Smt(#[from] SmtError),

    #[error("transition `{transition}` left variable `{var}` unassigned")]
    MissingAssignment { transition: String, var: String },

    #[error("initial state binds `{var}` to {found}, declared as {declared}")]
    InitTypeMismatch {
        var: String,
        found: String,
        declared: String,
    },
}

pub type CheckResult<T> = Result<T, CheckError>;

/// A state variable declaration.
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub ty: CellType,
}

/// A named safety invariant.
#[derive(Debug, Clone)]
pub struct Invariant {
    pub name: String,
    pub body: Expr,
}

/// The typed input module: state variables, an initial-state predicate, a
/// next-state relation, and the invariants to check.
#[derive(Debug, Clone)]
pub struct Module {
    pub vars: Vec<VarDecl>,
    pub init: Expr,
    pub next: Expr,
    pub invariants: Vec<Invariant>,
}

/// Configuration for a bounded check.
#[derive(Debug, Clone, Default)]
pub struct CheckConfig {
    /// Number of next-state steps to unroll.
    pub depth: usize,
    /// Where to dump the per-transition QF_UFLIA assignment scripts.
    pub dump_dir: Option<PathBuf>,
    /// Soft wall-clock budget per solver call, if any.
    pub solver_timeout_ms: Option<u32>,
}

/// Variable name-value pairs of one concrete state.
pub type TraceState = Vec<(String, Value)>;

/// Result of a bounded check.
#[derive(Debug)]
pub enum CheckOutcome {
    /// All invariants hold up to the configured depth.
    Ok { depth: usize },
    /// A reachable state violates an invariant.
    InvariantViolation {
        invariant: String,
        trace: Vec<TraceState>,
    },
    /// Could not determine (solver unknown, no executable init).
    Unknown { reason: String },
}

pub use checker::check;
