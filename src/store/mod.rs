//! The variable store: data model, invariants, loading and input edits.
pub mod loader;
pub mod registry;
pub mod types;

pub use loader::{load_store, parse_display_ids, parse_variables, LoadError, VariableRecord};
pub use registry::{select_displayable, EditError, StoreError, VariableStore};
pub use types::{Department, Direction, FlowEndpoints, NId, Variable, VariableRole, VariableType};
