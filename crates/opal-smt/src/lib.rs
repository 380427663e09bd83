//! SMT gateway for the symbolic rewriting engine.
//!
//! The gateway owns a single Z3 solver and exposes the minimal surface the
//! engine needs: assert a ground boolean expression over cells, manage the
//! scope stack, check satisfiability, and read interpretations back out of
//! the model. Ground expressions are IR terms whose leaves are cell
//! references, membership selectors, and literals; anything else is rejected
//! rather than silently mistranslated.

pub mod encode;
pub mod gateway;

use opal_ir::NodeId;
use thiserror::Error;

/// Gateway error.
#[derive(Debug, Error)]
pub enum SmtError {
    #[error("expression {node} is not ground: {detail}")]
    NotGround { node: NodeId, detail: String },

    #[error("sort mismatch at {node}: {detail}")]
    SortMismatch { node: NodeId, detail: String },

    #[error("no model available; call sat() first and require Sat")]
    NoModel,

    #[error("cannot pop below the bottom scope")]
    PopUnderflow,
}

pub type SmtResult<T> = Result<T, SmtError>;

/// Outcome of a satisfiability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatOutcome {
    Sat,
    Unsat,
    /// The solver gave up; propagated as an indeterminate result, never
    /// retried or masked here.
    Unknown,
}

pub use gateway::SmtGateway;
