//! Reads the static variable definitions and the display selection.

use super::registry::{StoreError, VariableStore};
use super::types::*;
use serde::Deserialize;
use smallvec::SmallVec;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("I/O error reading {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("Malformed variable records: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Variable '{id}': malformed depends list: {source}")]
    Depends { id: String, source: serde_json::Error },
    #[error("Variable '{id}': from_dept and to_dept must be set together")]
    HalfFlow { id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// `depends` arrives either as a list or as a JSON-encoded string of one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DependsField {
    List(Vec<String>),
    Encoded(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NeedShowField {
    Flag(bool),
    Text(String),
}

/// One entry of the variable definition file, before invariant checks.
#[derive(Debug, Deserialize)]
pub struct VariableRecord {
    pub n_id: u32,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: VariableType,
    pub role: VariableRole,
    pub dept: Department,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub cell: Option<String>,
    #[serde(default)]
    pub origin_expr: Option<String>,
    #[serde(default)]
    pub expr: Option<String>,
    #[serde(default)]
    depends: Option<DependsField>,
    pub sequence: i64,
    #[serde(default)]
    need_show: Option<NeedShowField>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub from_dept: Option<Department>,
    #[serde(default)]
    pub to_dept: Option<Department>,
    #[serde(default)]
    pub counterpart: Option<i64>,
}

impl VariableRecord {
    pub fn into_variable(self) -> Result<Variable, LoadError> {
        let depends: SmallVec<[String; 4]> = match self.depends {
            None => SmallVec::new(),
            Some(DependsField::List(list)) => list.into_iter().collect(),
            Some(DependsField::Encoded(text)) if text.trim().is_empty() => SmallVec::new(),
            Some(DependsField::Encoded(text)) => serde_json::from_str::<Vec<String>>(&text)
                .map_err(|source| LoadError::Depends { id: self.id.clone(), source })?
                .into_iter()
                .collect(),
        };

        let need_show = match self.need_show {
            None => None,
            Some(NeedShowField::Flag(b)) => Some(b),
            Some(NeedShowField::Text(t)) if t == "YES" => Some(true),
            Some(NeedShowField::Text(t)) if t == "NO" => Some(false),
            Some(NeedShowField::Text(t)) => {
                if !t.is_empty() {
                    tracing::warn!(variable = %self.id, value = %t, "Unrecognised need_show value, treating as unset");
                }
                None
            }
        };

        let flow = match (self.from_dept, self.to_dept) {
            (Some(from), Some(to)) => Some(FlowEndpoints { from, to }),
            (None, None) => None,
            _ => return Err(LoadError::HalfFlow { id: self.id }),
        };

        // Empty expression strings are treated as "no expression".
        let expr = self.expr.filter(|e| !e.trim().is_empty());

        Ok(Variable {
            n_id: NId(self.n_id),
            id: self.id,
            kind: self.kind,
            role: self.role,
            dept: self.dept,
            year: self.year,
            unit: self.unit.unwrap_or_default(),
            value: self.value,
            cell: self.cell.unwrap_or_default(),
            origin_expr: self.origin_expr,
            expr,
            depends,
            sequence: self.sequence,
            need_show,
            direction: self.direction,
            caption: self.caption,
            flow,
            counterpart: self.counterpart,
        })
    }
}

/// Parses a JSON array of variable records into a store.
pub fn parse_variables(json: &str) -> Result<VariableStore, LoadError> {
    let records: Vec<VariableRecord> = serde_json::from_str(json)?;
    let mut store = VariableStore::new();
    for record in records {
        store.insert(record.into_variable()?)?;
    }
    Ok(store)
}

/// Parses a JSON array of display `n_id`s.
pub fn parse_display_ids(json: &str) -> Result<Vec<NId>, LoadError> {
    Ok(serde_json::from_str(json)?)
}

fn read(path: &Path) -> Result<String, LoadError> {
    std::fs::read_to_string(path).map_err(|source| LoadError::Io { path: path.display().to_string(), source })
}

/// Loads the variable definitions and, when given, the display selection.
pub fn load_store(variables: &Path, display: Option<&Path>) -> Result<VariableStore, LoadError> {
    let mut store = parse_variables(&read(variables)?)?;
    if let Some(path) = display {
        store.set_display_ids(parse_display_ids(&read(path)?)?);
    }
    tracing::debug!(
        variables = store.len(),
        displayable = store.display_ids().len(),
        "Loaded variable store"
    );
    Ok(store)
}
