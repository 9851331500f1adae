//! A synchronous, single-threaded evaluation engine.
//!
//! One pass is a fold over the derived variables in `sequence` order. The
//! scope is threaded through the fold and only grows with successful results;
//! the recorded outcomes are written back to the variables in a single commit
//! once the fold is complete.

use crate::compute::evaluator::{Evaluator, MathEvaluator};
use crate::compute::ledger::{Failure, Ledger, Scope};
use crate::store::{Variable, VariableStore};
use tracing::{debug, warn};

/// Summary of one evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct EvaluationReport {
    /// Derived variables that received a fresh value.
    pub computed: usize,
    /// Derived variables without an expression, left untouched.
    pub skipped: usize,
    /// Derived variables whose evaluation failed, in evaluation order.
    pub failures: Vec<Failure>,
    /// The scope as it stood at the end of the pass.
    pub scope: Scope,
}

impl EvaluationReport {
    pub fn is_clean(&self) -> bool { self.failures.is_empty() }
}

pub struct Engine<'e, E: Evaluator + ?Sized = MathEvaluator> {
    evaluator: &'e E,
}

impl<'e, E: Evaluator + ?Sized> Engine<'e, E> {
    pub fn new(evaluator: &'e E) -> Self {
        Self { evaluator }
    }

    /// Indices of the output/io variables, stably sorted by `sequence`.
    /// Variables sharing a sequence keep their store order.
    pub fn plan(variables: &[Variable]) -> Vec<usize> {
        let mut order: Vec<usize> = variables
            .iter()
            .enumerate()
            .filter(|(_, v)| v.kind.is_derived())
            .map(|(i, _)| i)
            .collect();
        order.sort_by_key(|&i| variables[i].sequence);
        order
    }

    /// Runs the ordered fold without touching `variables`.
    /// Returns the outcomes ledger, the final scope and the skip count.
    pub fn run(&self, variables: &[Variable]) -> (Ledger, Scope, usize) {
        let plan = Self::plan(variables);
        let init = (Ledger::with_capacity(plan.len()), Scope::from_inputs(variables), 0usize);

        plan.into_iter().fold(init, |(mut ledger, mut scope, mut skipped), idx| {
            let var = &variables[idx];
            match var.expr.as_deref() {
                None => skipped += 1,
                Some(expr) => {
                    let result = self.evaluator.evaluate(expr, &scope);
                    match &result {
                        Ok(value) => scope.insert(var.id.as_str(), *value),
                        Err(e) => warn!(
                            variable = %var.id,
                            n_id = %var.n_id,
                            sequence = var.sequence,
                            error = %e,
                            "Error evaluating variable"
                        ),
                    }
                    ledger.record(idx, result);
                }
            }
            (ledger, scope, skipped)
        })
    }

    /// Recomputes every derived variable from the current inputs and writes
    /// the results into `variables`. Never fails: per-variable errors become
    /// `None` values and are listed in the report.
    pub fn evaluate_all(&self, variables: &mut [Variable]) -> EvaluationReport {
        let (ledger, scope, skipped) = self.run(variables);
        let attempted = ledger.len();
        let failures = ledger.commit(variables);

        let report = EvaluationReport {
            computed: attempted - failures.len(),
            skipped,
            failures,
            scope,
        };
        debug!(
            computed = report.computed,
            skipped = report.skipped,
            failed = report.failures.len(),
            "Evaluation pass complete"
        );
        report
    }

    pub fn evaluate_store(&self, store: &mut VariableStore) -> EvaluationReport {
        self.evaluate_all(store.variables_mut())
    }
}

/// Evaluates a store with the default [`MathEvaluator`].
pub fn evaluate_all(store: &mut VariableStore) -> EvaluationReport {
    Engine::new(&MathEvaluator).evaluate_store(store)
}
