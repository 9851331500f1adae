use crate::compute::Scenario;
use crate::config::EngineConfig;
use crate::model::{FlowModel, ModelError};
use crate::store::parse_variables;
use crate::store::parse_display_ids;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::path::PathBuf;

fn to_py_err(e: ModelError) -> PyErr {
    match e {
        ModelError::Load(e) => PyValueError::new_err(e.to_string()),
        ModelError::Rejected(findings) => {
            let msg = findings.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("\n");
            PyRuntimeError::new_err(msg)
        }
        ModelError::Edits(errors) => {
            let msg = errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n");
            PyValueError::new_err(msg)
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

#[pyclass(name = "_FlowModel")]
#[derive(Debug, Clone)]
pub struct PyFlowModel {
    inner: FlowModel,
}

#[pymethods]
impl PyFlowModel {
    /// Builds a model from JSON text: the variable records and, optionally,
    /// the display `n_id` array.
    #[new]
    #[pyo3(signature = (variables_json, display_json=None, config_toml=None))]
    pub fn new(variables_json: &str, display_json: Option<&str>, config_toml: Option<&str>) -> PyResult<Self> {
        let mut store = parse_variables(variables_json).map_err(|e| PyValueError::new_err(e.to_string()))?;
        if let Some(json) = display_json {
            store.set_display_ids(parse_display_ids(json).map_err(|e| PyValueError::new_err(e.to_string()))?);
        }
        let config = match config_toml {
            Some(text) => EngineConfig::from_toml(text).map_err(|e| PyValueError::new_err(e.to_string()))?,
            None => EngineConfig::default(),
        };
        Ok(Self { inner: FlowModel::new(store, config) })
    }

    #[staticmethod]
    pub fn open(config_path: PathBuf) -> PyResult<Self> {
        let config = EngineConfig::load(&config_path).map_err(|e| PyValueError::new_err(e.to_string()))?;
        FlowModel::open(config).map(|inner| Self { inner }).map_err(to_py_err)
    }

    /// Returns the ids of the variables that failed to evaluate.
    pub fn evaluate_all(&mut self) -> PyResult<Vec<String>> {
        let report = self.inner.evaluate_all().map_err(to_py_err)?;
        Ok(report.failures.into_iter().map(|f| f.id).collect())
    }

    pub fn apply_edits(&mut self, edits: Vec<(String, f64)>) -> PyResult<Vec<String>> {
        let report = self.inner.apply_edits(&edits).map_err(to_py_err)?;
        Ok(report.failures.into_iter().map(|f| f.id).collect())
    }

    pub fn get_value(&self, id: &str) -> Option<f64> {
        self.inner.store().value_of(id)
    }

    pub fn display_variables_json(&self) -> PyResult<String> {
        to_json(&self.inner.display_variables())
    }

    /// `(from, to, total_value, variable_count)` per aggregated edge.
    pub fn aggregate_flows(&self) -> Vec<(String, String, f64, usize)> {
        self.inner
            .aggregate_flows()
            .values()
            .map(|e| (e.from.as_str().to_string(), e.to.as_str().to_string(), e.total_value, e.variable_count()))
            .collect()
    }

    pub fn parallel_edges_json(&self) -> PyResult<String> {
        to_json(&self.inner.parallel_edges())
    }

    pub fn validate(&self) -> PyResult<()> {
        self.inner.validate().map_err(|errs| {
            let msg = errs.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n");
            PyValueError::new_err(msg)
        })
    }

    pub fn trace(&self, id: &str) -> String {
        self.inner.trace(id)
    }

    /// Evaluates named edit batches in parallel. Returns, per scenario, its
    /// name and the resulting value of `target` (None if rejected or failed).
    pub fn run_scenarios(&self, scenarios: Vec<(String, Vec<(String, f64)>)>, target: &str) -> Vec<(String, Option<f64>)> {
        let scenarios: Vec<Scenario> = scenarios.into_iter().map(|(name, edits)| Scenario::new(name, edits)).collect();
        self.inner
            .run_scenarios(&scenarios)
            .into_iter()
            .map(|r| {
                let value = r.outcome.ok().and_then(|(store, _)| store.value_of(target));
                (r.name, value)
            })
            .collect()
    }

    pub fn variable_count(&self) -> usize { self.inner.store().len() }
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyFlowModel>()?;
    Ok(())
}
