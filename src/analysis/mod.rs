//! Static checks over the dependency structure of the store.
pub mod error;
pub mod topology;
pub mod validation;

pub use error::{ValidationError, ValidationErrorType};
pub use topology::{downstream_from, DependencyGraph};
pub use validation::{validate, Validator};
