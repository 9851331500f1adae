//! The `FlowModel` facade: one store, one configuration, and every entry
//! point a presentation layer needs.

use crate::analysis::{downstream_from, validate, DependencyGraph, ValidationError};
use crate::compute::{run_scenarios, Engine, EvaluationReport, MathEvaluator, Scenario, ScenarioResult};
use crate::config::{EngineConfig, ValidationPolicy};
use crate::display::trace;
use crate::flow::{aggregate_flows, parallel_edges, AggregatedEdge, FlowGraph, FlowKey, ParallelEdge};
use crate::store::{load_store, EditError, LoadError, Variable, VariableStore};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Evaluation refused: {} validation finding(s)", .0.len())]
    Rejected(Vec<ValidationError>),

    #[error("Edit batch rejected: {} invalid edit(s)", .0.len())]
    Edits(Vec<EditError>),
}

#[derive(Debug, Clone)]
pub struct FlowModel {
    store: VariableStore,
    config: EngineConfig,
}

impl FlowModel {
    pub fn new(store: VariableStore, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Loads the store from the paths named in `config.data`.
    pub fn open(config: EngineConfig) -> Result<Self, ModelError> {
        let store = load_store(&config.data.variables, config.data.display.as_deref())?;
        Ok(Self::new(store, config))
    }

    pub fn store(&self) -> &VariableStore { &self.store }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn into_store(self) -> VariableStore { self.store }

    /// Runs the sequence/dependency check regardless of the configured policy.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        validate(&self.store)
    }

    /// Recomputes every derived variable.
    ///
    /// With the `deny` policy a store with validation findings is left
    /// untouched and the findings are returned instead.
    pub fn evaluate_all(&mut self) -> Result<EvaluationReport, ModelError> {
        self.enforce_policy()?;
        Ok(self.run_pass())
    }

    fn run_pass(&mut self) -> EvaluationReport {
        let report = Engine::new(&MathEvaluator).evaluate_store(&mut self.store);
        info!(
            computed = report.computed,
            failed = report.failures.len(),
            "Model evaluated"
        );
        report
    }

    fn enforce_policy(&self) -> Result<(), ModelError> {
        let policy = self.config.validation.policy;
        if policy == ValidationPolicy::Off {
            return Ok(());
        }
        let Err(findings) = self.validate() else {
            return Ok(());
        };
        for finding in &findings {
            warn!(variable = %finding.variable, n_id = %finding.n_id, kind = ?finding.error_type, "{}", finding.message);
        }
        match policy {
            ValidationPolicy::Deny => Err(ModelError::Rejected(findings)),
            _ => Ok(()),
        }
    }

    /// Writes a batch of input values and re-evaluates. An invalid batch, or
    /// a store the validation policy refuses, leaves the store unchanged.
    pub fn apply_edits(&mut self, edits: &[(String, f64)]) -> Result<EvaluationReport, ModelError> {
        // Edits touch values only, so the policy verdict holds for the edited store too.
        self.enforce_policy()?;
        let touched = self.store.apply_input_edits(edits).map_err(ModelError::Edits)?;
        let affected = downstream_from(&DependencyGraph::build(&self.store), &touched);
        info!(edits = touched.len(), affected = affected.len(), "Applied input edits");
        Ok(self.run_pass())
    }

    pub fn display_variables(&self) -> Vec<&Variable> {
        self.store.display_variables()
    }

    /// Aggregated edges over the display-eligible variables.
    pub fn aggregate_flows(&self) -> BTreeMap<FlowKey, AggregatedEdge<'_>> {
        aggregate_flows(self.store.display_variables())
    }

    /// One edge per labelled display-eligible flow variable.
    pub fn parallel_edges(&self) -> Vec<ParallelEdge<'_>> {
        parallel_edges(self.store.display_variables())
    }

    pub fn flow_graph(&self) -> FlowGraph {
        FlowGraph::from_aggregated(self.aggregate_flows().values())
    }

    pub fn trace(&self, id: &str) -> String {
        trace::format_trace(&self.store, id)
    }

    /// Evaluates each scenario on its own copy of the current store.
    pub fn run_scenarios(&self, scenarios: &[Scenario]) -> Vec<ScenarioResult> {
        run_scenarios(&self.store, scenarios, &MathEvaluator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ValidationErrorType;
    use crate::store::{Department::*, NId};

    fn store() -> VariableStore {
        let mut store = VariableStore::from_variables([
            Variable::input(1, "rain_input", Atmosphere, Some(10.0)),
            Variable::derived(2, "deposition", SurfaceWater, 1, "rain_input * 0.5")
                .with_depends(["rain_input"])
                .with_flow(Atmosphere, SurfaceWater)
                .with_caption("Deposition"),
            Variable::derived(3, "runoff", SurfaceWater, 2, "deposition * 0.2")
                .with_depends(["deposition"])
                .with_flow(SurfaceWater, Ocean)
                .with_caption("Runoff"),
        ])
        .unwrap();
        store.set_display_ids([NId(2), NId(3)]);
        store
    }

    fn model(policy: ValidationPolicy) -> FlowModel {
        let mut config = EngineConfig::default();
        config.validation.policy = policy;
        FlowModel::new(store(), config)
    }

    #[test]
    fn test_evaluate_and_aggregate() {
        let mut model = model(ValidationPolicy::Off);
        let report = model.evaluate_all().unwrap();
        assert_eq!(report.computed, 2);

        let flows = model.aggregate_flows();
        assert_eq!(flows.len(), 2);
        let dep = &flows[&FlowKey::new(Atmosphere, SurfaceWater)];
        assert_eq!(dep.total_value, 5.0);
        assert_eq!(flows[&FlowKey::new(SurfaceWater, Ocean)].total_value, 1.0);

        let graph = model.flow_graph();
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.inflow(Ocean), 1.0);
    }

    #[test]
    fn test_apply_edits_reevaluates() {
        let mut model = model(ValidationPolicy::Off);
        model.evaluate_all().unwrap();
        model.apply_edits(&[("rain_input".to_string(), 20.0)]).unwrap();
        assert_eq!(model.store().value_of("deposition"), Some(10.0));
        assert_eq!(model.store().value_of("runoff"), Some(2.0));
    }

    #[test]
    fn test_rejected_edits_leave_store_untouched() {
        let mut model = model(ValidationPolicy::Off);
        model.evaluate_all().unwrap();
        let err = model
            .apply_edits(&[("rain_input".to_string(), 3.0), ("deposition".to_string(), 1.0)])
            .unwrap_err();
        assert!(matches!(err, ModelError::Edits(ref e) if e.len() == 1));
        assert_eq!(model.store().value_of("rain_input"), Some(10.0));
        assert_eq!(model.store().value_of("deposition"), Some(5.0));
    }

    #[test]
    fn test_deny_policy_refuses_inconsistent_store() {
        let mut store = store();
        store
            .insert(Variable::derived(4, "early", Ocean, 0, "runoff + 1").with_depends(["runoff"]))
            .unwrap();
        let mut config = EngineConfig::default();
        config.validation.policy = ValidationPolicy::Deny;
        let mut model = FlowModel::new(store, config);

        match model.evaluate_all() {
            Err(ModelError::Rejected(findings)) => {
                assert_eq!(findings[0].error_type, ValidationErrorType::SequenceOrder);
            }
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(model.store().value_of("deposition"), None);
    }

    #[test]
    fn test_deny_policy_rejects_edits_without_writing() {
        let mut store = store();
        store
            .insert(Variable::derived(4, "early", Ocean, 0, "runoff + 1").with_depends(["runoff"]))
            .unwrap();
        let mut config = EngineConfig::default();
        config.validation.policy = ValidationPolicy::Deny;
        let mut model = FlowModel::new(store, config);

        let err = model.apply_edits(&[("rain_input".to_string(), 7.0)]).unwrap_err();
        assert!(matches!(err, ModelError::Rejected(_)));
        assert_eq!(model.store().value_of("rain_input"), Some(10.0));
        assert_eq!(model.store().value_of("deposition"), None);
    }

    #[test]
    fn test_warn_policy_still_evaluates() {
        let mut store = store();
        store
            .insert(Variable::derived(4, "early", Ocean, 0, "runoff + 1").with_depends(["runoff"]))
            .unwrap();
        let mut config = EngineConfig::default();
        config.validation.policy = ValidationPolicy::Warn;
        let mut model = FlowModel::new(store, config);

        let report = model.evaluate_all().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(model.store().value_of("early"), None);
        assert_eq!(model.store().value_of("runoff"), Some(1.0));
    }

    #[test]
    fn test_parallel_edges_follow_display_set() {
        let mut model = model(ValidationPolicy::Off);
        model.evaluate_all().unwrap();
        let edges = model.parallel_edges();
        let labels: Vec<&str> = edges.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Deposition", "Runoff"]);
    }
}
