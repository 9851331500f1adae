//! Working state of one evaluation pass: the scope of known values and the
//! ledger of per-variable outcomes awaiting commit.

use crate::compute::evaluator::EvaluationError;
use crate::store::{NId, Variable};
use std::collections::HashMap;

/// Mapping from variable id to its currently known value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    values: HashMap<String, f64>,
}

impl Scope {
    pub fn new() -> Self { Self::default() }

    /// Seeds a scope with every input variable that has a value.
    /// Inputs without a value stay unresolved.
    pub fn from_inputs<'a>(variables: impl IntoIterator<Item = &'a Variable>) -> Self {
        let values = variables
            .into_iter()
            .filter(|v| v.is_input())
            .filter_map(|v| v.value.map(|val| (v.id.clone(), val)))
            .collect();
        Self { values }
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<f64> { self.values.get(name).copied() }

    pub fn contains(&self, name: &str) -> bool { self.values.contains_key(name) }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for Scope {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        Self { values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect() }
    }
}

/// Outcome of one evaluated variable, recorded before anything is written back.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub index: usize,
    pub result: Result<f64, EvaluationError>,
}

/// A failed variable as reported to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub n_id: NId,
    pub id: String,
    pub error: EvaluationError,
}

/// Ordered outcomes of a pass. Committing writes them to the variables in one step.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    outcomes: Vec<Outcome>,
}

impl Ledger {
    pub fn new() -> Self { Self::default() }

    pub fn with_capacity(size: usize) -> Self {
        Self { outcomes: Vec::with_capacity(size) }
    }

    pub fn record(&mut self, index: usize, result: Result<f64, EvaluationError>) {
        self.outcomes.push(Outcome { index, result });
    }

    pub fn outcomes(&self) -> &[Outcome] { &self.outcomes }

    pub fn len(&self) -> usize { self.outcomes.len() }
    pub fn is_empty(&self) -> bool { self.outcomes.is_empty() }

    /// Writes every outcome into `variables`: successes as values, failures as `None`.
    /// Returns the failures, in evaluation order.
    pub fn commit(self, variables: &mut [Variable]) -> Vec<Failure> {
        let mut failures = Vec::new();
        for Outcome { index, result } in self.outcomes {
            let var = &mut variables[index];
            match result {
                Ok(value) => var.value = Some(value),
                Err(error) => {
                    var.value = None;
                    failures.push(Failure { n_id: var.n_id, id: var.id.clone(), error });
                }
            }
        }
        failures
    }
}
