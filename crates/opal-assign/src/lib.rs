//! Assignment-strategy planning for symbolic transitions.
//!
//! Before a transition can be rewritten symbolically, every state variable
//! must be assigned exactly once by a membership leaf `v' ∈ B`, and each
//! assignment must precede every use of the assigned variable. Finding such
//! an ordering is itself a constraint problem; it is delegated to an
//! auxiliary solver instance over one boolean per candidate and one
//! uninterpreted ranking function, in QF_UFLIA.

pub mod candidates;
pub mod formula;
pub mod script;
pub mod solver;
pub mod transitions;

use opal_ir::{Expr, NodeId};
use std::collections::BTreeSet;
use thiserror::Error;

/// Assignment-analysis error.
#[derive(Debug, Error)]
pub enum AssignError {
    #[error("strategy encoding error: {0}")]
    Encoding(String),

    #[error("strategy solver returned unknown: {reason}")]
    Indeterminate { reason: String },

    #[error("failed to write strategy script: {0}")]
    Io(#[from] std::io::Error),
}

pub type AssignResult<T> = Result<T, AssignError>;

/// A membership leaf `v' ∈ B` (or `v ∈ B` in an initial-state predicate),
/// identified by its IR node id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub node: NodeId,
    /// Assigned variable.
    pub var: String,
    /// Variables whose assigned value the right-hand side reads.
    pub rhs_vars: BTreeSet<String>,
}

/// An ordered choice of candidates covering every state variable once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub order: Vec<Candidate>,
}

impl Strategy {
    /// Position of a candidate in the order, if chosen.
    pub fn position(&self, node: NodeId) -> Option<usize> {
        self.order.iter().position(|c| c.node == node)
    }
}

/// Result of strategy search for one transition candidate.
#[derive(Debug, Clone)]
pub enum AssignOutcome {
    Strategy(Strategy),
    /// The assignment problem is unsatisfiable; the transition is ruled
    /// out. An expected outcome, not an error.
    Rejected,
}

/// A next-state disjunct paired with its assignment strategy.
#[derive(Debug, Clone)]
pub struct Transition {
    /// Key: the transition prefix concatenated with its index.
    pub name: String,
    /// Smallest IR node id of the underlying disjunct, used for ordering.
    pub node: NodeId,
    pub action: Expr,
    pub strategy: Strategy,
}

pub use solver::solve_strategy;
pub use transitions::{extract_transitions, normalize_disjuncts};
