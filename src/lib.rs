//! Nitrogen-flow evaluation core: variable store, sequenced expression
//! evaluation, and department-to-department flow projection.

pub mod analysis;
pub mod compute;
pub mod config;
pub mod display;
pub mod flow;
pub mod model;
pub mod store;

#[cfg(feature = "python")]
pub mod bindings;

pub use config::{ConfigError, EdgeMode, EngineConfig, ValidationPolicy};
pub use model::{FlowModel, ModelError};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Defines the `_core` Python module.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    bindings::python::register(m)
}
