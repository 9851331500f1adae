//! Optional pass checking that `sequence` order agrees with the declared
//! and referenced dependencies.
//!
//! The engine never runs this itself: a variable whose dependency is not
//! sequenced earlier simply evaluates to `None`. This pass makes such cases
//! visible before evaluation.

use super::error::{ValidationError, ValidationErrorType};
use super::topology::{self, DependencyGraph};
use crate::compute::evaluator::is_constant;
use crate::compute::expr::parse_expression;
use crate::store::{Variable, VariableStore};

/// Runs every rule over the store and collects all findings.
pub struct Validator<'a> {
    store: &'a VariableStore,
}

impl<'a> Validator<'a> {
    pub fn new(store: &'a VariableStore) -> Self {
        Self { store }
    }

    /// # Returns
    /// - `Ok(())` if no findings.
    /// - `Err(Vec<ValidationError>)` with every finding, cycles last.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        for var in self.store.iter().filter(|v| v.is_evaluable()) {
            self.check_dependencies(var, &mut errors);
            self.check_expression(var, &mut errors);
        }

        if let Err(cycle) = topology::sort(&DependencyGraph::build(self.store)) {
            let vars = self.store.variables();
            let names: Vec<&str> = cycle.iter().map(|&i| vars[i].id.as_str()).collect();
            let head = &vars[cycle[0]];
            errors.push(ValidationError::new(
                head.n_id,
                head.id.as_str(),
                ValidationErrorType::Cycle,
                format!("Dependency cycle: {}", names.join(" -> ")),
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn check_dependencies(&self, var: &Variable, errors: &mut Vec<ValidationError>) {
        for dep in &var.depends {
            match self.store.get(dep) {
                None => errors.push(ValidationError::new(
                    var.n_id,
                    var.id.as_str(),
                    ValidationErrorType::UnknownDependency,
                    format!("Depends on unknown variable '{}'", dep),
                )),
                Some(parent) if parent.kind.is_derived() && parent.sequence >= var.sequence => {
                    errors.push(ValidationError::new(
                        var.n_id,
                        var.id.as_str(),
                        ValidationErrorType::SequenceOrder,
                        format!(
                            "Depends on '{}' (sequence {}) which is not evaluated before sequence {}",
                            dep, parent.sequence, var.sequence
                        ),
                    ))
                }
                Some(_) => {}
            }
        }
    }

    fn check_expression(&self, var: &Variable, errors: &mut Vec<ValidationError>) {
        let Some(text) = var.expr.as_deref() else { return };
        let expr = match parse_expression(text) {
            Ok(expr) => expr,
            Err(e) => {
                errors.push(ValidationError::new(var.n_id, var.id.as_str(), ValidationErrorType::Syntax, e.to_string()));
                return;
            }
        };

        for name in expr.names() {
            if var.depends.iter().any(|d| d == name) {
                continue;
            }
            if self.store.get(name).is_some() {
                errors.push(ValidationError::new(
                    var.n_id,
                    var.id.as_str(),
                    ValidationErrorType::UndeclaredReference,
                    format!("Expression reads '{}' which is not listed in depends", name),
                ));
            } else if !is_constant(name) {
                errors.push(ValidationError::new(
                    var.n_id,
                    var.id.as_str(),
                    ValidationErrorType::UnknownDependency,
                    format!("Expression reads unknown variable '{}'", name),
                ));
            }
        }
    }
}

/// Convenience wrapper around [`Validator::validate`].
pub fn validate(store: &VariableStore) -> Result<(), Vec<ValidationError>> {
    Validator::new(store).validate()
}
