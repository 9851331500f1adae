use super::types::*;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Duplicate variable id '{0}'")]
    DuplicateId(String),
    #[error("Duplicate n_id {0}")]
    DuplicateNId(NId),
    #[error("Input variable '{0}' must not carry an expression")]
    InputWithExpression(String),
}

/// Rejected entry of an input edit batch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditError {
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("Variable '{0}' is not an input")]
    NotAnInput(String),
    #[error("Value {value} for '{id}' is not a finite number")]
    NotFinite { id: String, value: f64 },
    #[error("Value {value} for '{id}' must not be negative")]
    Negative { id: String, value: f64 },
}

/// The authoritative collection of variables and the display selection.
///
/// Variables keep their load order; every lookup goes through the id caches,
/// which are rebuilt whenever the store is reconstructed.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    variables: Vec<Variable>,
    by_id: HashMap<String, usize>,
    by_n_id: HashMap<NId, usize>,
    display_ids: HashSet<NId>,
}

impl VariableStore {
    pub fn new() -> Self { Self::default() }

    pub fn from_variables(variables: impl IntoIterator<Item = Variable>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for var in variables {
            store.insert(var)?;
        }
        Ok(store)
    }

    pub fn insert(&mut self, var: Variable) -> Result<usize, StoreError> {
        if self.by_id.contains_key(&var.id) {
            return Err(StoreError::DuplicateId(var.id));
        }
        if self.by_n_id.contains_key(&var.n_id) {
            return Err(StoreError::DuplicateNId(var.n_id));
        }
        if var.is_input() && var.expr.is_some() {
            return Err(StoreError::InputWithExpression(var.id));
        }

        let idx = self.variables.len();
        self.by_id.insert(var.id.clone(), idx);
        self.by_n_id.insert(var.n_id, idx);
        self.variables.push(var);
        Ok(idx)
    }

    pub fn len(&self) -> usize { self.variables.len() }
    pub fn is_empty(&self) -> bool { self.variables.is_empty() }

    pub fn variables(&self) -> &[Variable] { &self.variables }

    /// Mutable view for the evaluation engine. Identity fields must not be
    /// changed through it, the id caches are not refreshed.
    pub(crate) fn variables_mut(&mut self) -> &mut [Variable] { &mut self.variables }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> { self.variables.iter() }

    pub fn index_of(&self, id: &str) -> Option<usize> { self.by_id.get(id).copied() }

    pub fn get(&self, id: &str) -> Option<&Variable> {
        self.index_of(id).map(|i| &self.variables[i])
    }

    pub fn get_by_n_id(&self, n_id: NId) -> Option<&Variable> {
        self.by_n_id.get(&n_id).map(|&i| &self.variables[i])
    }

    pub fn value_of(&self, id: &str) -> Option<f64> {
        self.get(id).and_then(|v| v.value)
    }

    // --- Display selection ---

    /// Replaces the set of `n_id`s eligible for display and flow-graph derivation.
    pub fn set_display_ids(&mut self, ids: impl IntoIterator<Item = NId>) {
        self.display_ids = ids.into_iter().collect();
    }

    pub fn display_ids(&self) -> &HashSet<NId> { &self.display_ids }

    /// The display-eligible subset, in store order.
    pub fn display_variables(&self) -> Vec<&Variable> {
        select_displayable(&self.variables, &self.display_ids)
    }

    // --- Edits ---

    /// Writes a batch of input values. Either every edit is valid and applied,
    /// or nothing is written and all rejections are returned.
    pub fn apply_input_edits(&mut self, edits: &[(String, f64)]) -> Result<Vec<usize>, Vec<EditError>> {
        let mut errors = Vec::new();
        let mut targets = Vec::with_capacity(edits.len());

        for (id, value) in edits {
            match self.check_edit(id, *value) {
                Ok(idx) => targets.push((idx, *value)),
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let mut touched = Vec::with_capacity(targets.len());
        for (idx, value) in targets {
            self.variables[idx].value = Some(value);
            touched.push(idx);
        }
        Ok(touched)
    }

    fn check_edit(&self, id: &str, value: f64) -> Result<usize, EditError> {
        let idx = self.index_of(id).ok_or_else(|| EditError::UnknownVariable(id.to_string()))?;
        if !self.variables[idx].is_input() {
            return Err(EditError::NotAnInput(id.to_string()));
        }
        if !value.is_finite() {
            return Err(EditError::NotFinite { id: id.to_string(), value });
        }
        if value < 0.0 {
            return Err(EditError::Negative { id: id.to_string(), value });
        }
        Ok(idx)
    }
}

/// Filters `variables` down to those whose `n_id` is in `ids`, preserving order.
pub fn select_displayable<'a>(
    variables: impl IntoIterator<Item = &'a Variable>,
    ids: &HashSet<NId>,
) -> Vec<&'a Variable> {
    variables.into_iter().filter(|v| ids.contains(&v.n_id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample_store() -> VariableStore {
        VariableStore::from_variables([
            Variable::input(1, "rain_input", Department::Atmosphere, Some(10.0)),
            Variable::input(2, "fert_input", Department::Agriculture, None),
            Variable::derived(3, "runoff", Department::Agriculture, 1, "rain_input * 0.5"),
        ])
        .expect("store")
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let mut store = sample_store();
        let dup_id = Variable::input(9, "rain_input", Department::Ocean, None);
        assert_eq!(store.insert(dup_id), Err(StoreError::DuplicateId("rain_input".into())));

        let dup_nid = Variable::input(1, "other", Department::Ocean, None);
        assert_eq!(store.insert(dup_nid), Err(StoreError::DuplicateNId(NId(1))));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_input_with_expression_rejected() {
        let mut var = Variable::input(4, "bad", Department::Industry, Some(1.0));
        var.expr = Some("1 + 1".into());
        let err = VariableStore::from_variables([var]).unwrap_err();
        assert_eq!(err, StoreError::InputWithExpression("bad".into()));
    }

    #[test]
    fn test_edits_applied_together() {
        let mut store = sample_store();
        let touched = store
            .apply_input_edits(&[("rain_input".into(), 4.0), ("fert_input".into(), 0.0)])
            .unwrap();
        assert_eq!(touched, vec![0, 1]);
        assert_eq!(store.value_of("rain_input"), Some(4.0));
        assert_eq!(store.value_of("fert_input"), Some(0.0));
    }

    #[rstest]
    #[case("missing", 1.0, EditError::UnknownVariable("missing".into()))]
    #[case("runoff", 1.0, EditError::NotAnInput("runoff".into()))]
    #[case("fert_input", -2.0, EditError::Negative { id: "fert_input".into(), value: -2.0 })]
    fn test_invalid_edit_rejects_whole_batch(#[case] id: &str, #[case] value: f64, #[case] expected: EditError) {
        let mut store = sample_store();
        let errs = store
            .apply_input_edits(&[("rain_input".into(), 7.0), (id.to_string(), value)])
            .unwrap_err();
        assert_eq!(errs, vec![expected]);
        // The valid half of the batch was not written either.
        assert_eq!(store.value_of("rain_input"), Some(10.0));
    }

    #[test]
    fn test_non_finite_edit_rejected() {
        let mut store = sample_store();
        let errs = store.apply_input_edits(&[("rain_input".into(), f64::NAN)]).unwrap_err();
        assert!(matches!(errs[0], EditError::NotFinite { .. }));
    }

    #[test]
    fn test_display_selection_keeps_store_order() {
        let mut store = sample_store();
        store.set_display_ids([NId(3), NId(1)]);
        let ids: Vec<&str> = store.display_variables().iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["rain_input", "runoff"]);
    }
}
