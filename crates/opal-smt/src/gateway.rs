//! The scoped solver gateway.

use crate::encode::{cell_const, encode_bool, mem_selector};
use crate::{SatOutcome, SmtError, SmtResult};
use opal_cells::{Arena, CellId};
use opal_ir::Expr;
use tracing::debug;
use z3::ast::Dynamic;
use z3::{Model, Params, SatResult, Solver};

/// Gateway over one Z3 solver instance.
///
/// Scope discipline: callers pair every `push`/`pop` here with identical
/// operations on the arena and the equality cache. Assertions made inside a
/// scope are gone after the matching pop, so nothing outside the solver may
/// retain a reference to them.
pub struct SmtGateway {
    solver: Solver,
    level: usize,
    num_asserts: usize,
    model: Option<Model>,
    script: Option<Vec<String>>,
}

impl SmtGateway {
    pub fn new() -> Self {
        SmtGateway {
            solver: Solver::new(),
            level: 0,
            num_asserts: 0,
            model: None,
            script: None,
        }
    }

    /// Mirror every assertion and scope operation as SMT-LIB text, kept in
    /// memory for debugging dumps.
    pub fn with_script_log() -> Self {
        let mut gw = Self::new();
        gw.script = Some(Vec::new());
        gw
    }

    /// Give the solver a soft wall-clock budget per `sat` call.
    pub fn set_timeout_ms(&mut self, ms: u32) {
        let mut params = Params::new();
        params.set_u32("timeout", ms);
        self.solver.set_params(&params);
    }

    /// Current scope depth.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Total assertions made over the lifetime of the gateway. Monotone;
    /// used by tests to observe that cached equalities assert nothing new.
    pub fn assertion_count(&self) -> usize {
        self.num_asserts
    }

    /// Assert a ground boolean expression.
    pub fn assert_ground(&mut self, arena: &Arena, ex: &Expr) -> SmtResult<()> {
        let encoded = encode_bool(arena, ex)?;
        if let Some(script) = &mut self.script {
            script.push(format!("(assert {})", encoded));
        }
        self.solver.assert(&encoded);
        self.num_asserts += 1;
        self.model = None;
        Ok(())
    }

    pub fn push(&mut self) {
        self.solver.push();
        self.level += 1;
        self.model = None;
        if let Some(script) = &mut self.script {
            script.push("(push 1)".to_string());
        }
    }

    pub fn pop(&mut self) -> SmtResult<()> {
        self.pop_n(1)
    }

    pub fn pop_n(&mut self, n: usize) -> SmtResult<()> {
        if n > self.level {
            return Err(SmtError::PopUnderflow);
        }
        self.solver.pop(n as u32);
        self.level -= n;
        self.model = None;
        if let Some(script) = &mut self.script {
            script.push(format!("(pop {})", n));
        }
        Ok(())
    }

    /// Check satisfiability of the current assertion set. Blocks until the
    /// solver answers; on `Sat` the model is retained for interpretation
    /// queries until the next assertion or scope change.
    pub fn sat(&mut self) -> SatOutcome {
        if let Some(script) = &mut self.script {
            script.push("(check-sat)".to_string());
        }
        match self.solver.check() {
            SatResult::Sat => {
                self.model = self.solver.get_model();
                debug!(asserts = self.num_asserts, level = self.level, "sat");
                SatOutcome::Sat
            }
            SatResult::Unsat => {
                self.model = None;
                debug!(asserts = self.num_asserts, level = self.level, "unsat");
                SatOutcome::Unsat
            }
            SatResult::Unknown => {
                self.model = None;
                debug!(asserts = self.num_asserts, level = self.level, "unknown");
                SatOutcome::Unknown
            }
        }
    }

    /// Interpretation of a boolean cell in the current model.
    pub fn interp_bool(&self, arena: &Arena, c: CellId) -> SmtResult<bool> {
        let model = self.model.as_ref().ok_or(SmtError::NoModel)?;
        Ok(model
            .eval(&cell_const(arena, c), true)
            .and_then(|v| v.as_bool())
            .and_then(|b| b.as_bool())
            .unwrap_or(false))
    }

    /// Interpretation of an integer-sorted cell in the current model.
    pub fn interp_int(&self, arena: &Arena, c: CellId) -> SmtResult<i64> {
        let model = self.model.as_ref().ok_or(SmtError::NoModel)?;
        Ok(model
            .eval(&cell_const(arena, c), true)
            .and_then(|v| v.as_int())
            .and_then(|i| i.as_i64())
            .unwrap_or(0))
    }

    /// Interpretation of the membership selector for a recorded edge.
    /// Edges that were never recorded are statically absent.
    pub fn interp_mem(&self, arena: &Arena, e: CellId, s: CellId) -> SmtResult<bool> {
        if !arena.has_edge(s, e) {
            return Ok(false);
        }
        let model = self.model.as_ref().ok_or(SmtError::NoModel)?;
        Ok(model
            .eval(&Dynamic::from_ast(&mem_selector(e, s)), true)
            .and_then(|v| v.as_bool())
            .and_then(|b| b.as_bool())
            .unwrap_or(false))
    }

    /// Feed raw SMT-LIB2 text into the solver's current scope.
    pub fn load_smtlib(&mut self, text: &str) {
        if let Some(script) = &mut self.script {
            script.push(text.to_string());
        }
        self.solver.from_string(text);
        self.num_asserts += 1;
        self.model = None;
    }

    /// Record a comment line in the assertion-stream log.
    pub fn comment(&mut self, message: &str) {
        debug!(target: "opal_smt::script", "{}", message);
        if let Some(script) = &mut self.script {
            script.push(format!("; {}", message));
        }
    }

    /// The SMT-LIB mirror of everything asserted so far, if logging was
    /// enabled at construction.
    pub fn script(&self) -> Option<String> {
        self.script.as_ref().map(|lines| lines.join("\n"))
    }
}

impl Default for SmtGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_cells::CellType;
    use opal_ir::{Expr, ExprKind, IdGen};

    fn cell_ref(gen: &IdGen, c: CellId) -> Expr {
        Expr::new(gen, ExprKind::CellRef(c))
    }

    #[test]
    fn test_assert_and_sat() {
        let mut arena = Arena::new();
        let gen = IdGen::new();
        let b = arena.alloc(CellType::Bool);
        let mut gw = SmtGateway::new();
        gw.assert_ground(&arena, &cell_ref(&gen, b)).unwrap();
        assert_eq!(gw.sat(), SatOutcome::Sat);
        assert!(gw.interp_bool(&arena, b).unwrap());
        assert_eq!(gw.assertion_count(), 1);
    }

    #[test]
    fn test_assertions_vanish_after_pop() {
        let mut arena = Arena::new();
        let gen = IdGen::new();
        let b = arena.alloc(CellType::Bool);
        let mut gw = SmtGateway::new();

        gw.push();
        gw.assert_ground(&arena, &cell_ref(&gen, b)).unwrap();
        assert_eq!(gw.sat(), SatOutcome::Sat);
        gw.pop().unwrap();

        // After the pop, the negation must be satisfiable again.
        let not_b = Expr::new(&gen, ExprKind::Not(Box::new(cell_ref(&gen, b))));
        gw.assert_ground(&arena, &not_b).unwrap();
        assert_eq!(gw.sat(), SatOutcome::Sat);
    }

    #[test]
    fn test_pop_underflow_is_an_error() {
        let mut gw = SmtGateway::new();
        assert!(matches!(gw.pop(), Err(SmtError::PopUnderflow)));
        gw.push();
        assert!(gw.pop().is_ok());
        assert_eq!(gw.level(), 0);
    }

    #[test]
    fn test_script_log_records_stream() {
        let mut arena = Arena::new();
        let gen = IdGen::new();
        let b = arena.alloc(CellType::Bool);
        let mut gw = SmtGateway::with_script_log();
        gw.comment("begin");
        gw.push();
        gw.assert_ground(&arena, &cell_ref(&gen, b)).unwrap();
        gw.pop().unwrap();
        let script = gw.script().unwrap();
        assert!(script.contains("; begin"));
        assert!(script.contains("(push 1)"));
        assert!(script.contains("(assert "));
        assert!(script.contains("(pop 1)"));
    }
}
