//! Symbolic states threaded through the rewriting rules.

use opal_cells::CellId;
use opal_ir::Expr;
use std::collections::HashMap;

/// A symbolic state: the focused expression being rewritten (or the cell it
/// rewrote to) plus the name-to-cell binding environment.
///
/// States do not carry the arena; cells are referenced by id into the
/// rewriter-owned arena, which older states share for as long as no pop
/// truncates below their watermark.
#[derive(Debug, Clone)]
pub struct SymbState {
    pub focus: Expr,
    pub bindings: HashMap<String, CellId>,
}

impl SymbState {
    pub fn new(focus: Expr) -> Self {
        SymbState {
            focus,
            bindings: HashMap::new(),
        }
    }

    /// Same bindings, different focus.
    pub fn with_focus(&self, focus: Expr) -> Self {
        SymbState {
            focus,
            bindings: self.bindings.clone(),
        }
    }

    /// Extend the binding environment.
    pub fn bind(mut self, name: impl Into<String>, cell: CellId) -> Self {
        self.bindings.insert(name.into(), cell);
        self
    }

    pub fn lookup(&self, name: &str) -> Option<CellId> {
        self.bindings.get(name).copied()
    }

    /// Binding key used for next-state references to `name`.
    pub fn primed_key(name: &str) -> String {
        format!("{}'", name)
    }
}
