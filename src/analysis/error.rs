//! Defines the error types for the validation pass.
use crate::store::NId;
use std::fmt;

/// The specific category of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorType {
    /// A dependency names no variable in the store.
    UnknownDependency,
    /// A dependency is derived but not sequenced strictly earlier.
    SequenceOrder,
    /// The expression reads a variable its `depends` list does not declare.
    UndeclaredReference,
    /// The expression does not parse.
    Syntax,
    /// The declared dependencies form a cycle.
    Cycle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub n_id: NId,
    pub variable: String,
    pub error_type: ValidationErrorType,
    pub message: String,
}

impl ValidationError {
    pub fn new(n_id: NId, variable: impl Into<String>, error_type: ValidationErrorType, message: String) -> Self {
        Self { n_id, variable: variable.into(), error_type, message }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (n_id {}): {}", self.variable, self.n_id, self.message)
    }
}

impl std::error::Error for ValidationError {}
