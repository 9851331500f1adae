//! Parallel evaluation of independent input scenarios.
//!
//! Each scenario works on its own clone of the base store, so a single pass
//! stays single-threaded while separate scenarios run on the rayon pool.

use crate::compute::engine::{Engine, EvaluationReport};
use crate::compute::evaluator::Evaluator;
use crate::store::{EditError, VariableStore};
use rayon::prelude::*;
use serde::Deserialize;

/// A named batch of input edits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub edits: Vec<(String, f64)>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, edits: Vec<(String, f64)>) -> Self {
        Self { name: name.into(), edits }
    }
}

#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    /// The evaluated copy of the store, or the rejected edits.
    pub outcome: Result<(VariableStore, EvaluationReport), Vec<EditError>>,
}

/// Applies every scenario to a copy of `base` and evaluates it.
/// Results come back in the order of `scenarios`.
pub fn run_scenarios<E>(base: &VariableStore, scenarios: &[Scenario], evaluator: &E) -> Vec<ScenarioResult>
where
    E: Evaluator + Sync + ?Sized,
{
    scenarios
        .par_iter()
        .map(|scenario| {
            let mut store = base.clone();
            let outcome = store.apply_input_edits(&scenario.edits).map(|_| {
                let report = Engine::new(evaluator).evaluate_store(&mut store);
                (store, report)
            });
            if let Err(errors) = &outcome {
                tracing::warn!(scenario = %scenario.name, rejected = errors.len(), "Scenario edits rejected");
            }
            ScenarioResult { name: scenario.name.clone(), outcome }
        })
        .collect()
}
