use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Stable numeric identity of a variable (`n_id` in the source records).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NId(pub u32);

impl fmt::Display for NId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An actor of the nitrogen network. Owns variables and anchors flow edges.
///
/// The declaration order is the canonical node order of the flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    SurfaceWater,
    Agriculture,
    Forestry,
    AnimalHusbandry,
    Fishery,
    HumanLife,
    Industry,
    WastewaterTreatment,
    WasteManagement,
    UrbanGreenSpace,
    Groundwater,
    Atmosphere,
    Ocean,
    OutsideImport,
    OutsideExport,
}

impl Department {
    pub const ALL: [Department; 15] = [
        Department::SurfaceWater,
        Department::Agriculture,
        Department::Forestry,
        Department::AnimalHusbandry,
        Department::Fishery,
        Department::HumanLife,
        Department::Industry,
        Department::WastewaterTreatment,
        Department::WasteManagement,
        Department::UrbanGreenSpace,
        Department::Groundwater,
        Department::Atmosphere,
        Department::Ocean,
        Department::OutsideImport,
        Department::OutsideExport,
    ];

    /// The wire name used in the variable records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::SurfaceWater => "surface_water",
            Department::Agriculture => "agriculture",
            Department::Forestry => "forestry",
            Department::AnimalHusbandry => "animal_husbandry",
            Department::Fishery => "fishery",
            Department::HumanLife => "human_life",
            Department::Industry => "industry",
            Department::WastewaterTreatment => "wastewater_treatment",
            Department::WasteManagement => "waste_management",
            Department::UrbanGreenSpace => "urban_green_space",
            Department::Groundwater => "groundwater",
            Department::Atmosphere => "atmosphere",
            Department::Ocean => "ocean",
            Department::OutsideImport => "outside_import",
            Department::OutsideExport => "outside_export",
        }
    }

    /// Display label shown on graph nodes.
    pub fn label(&self) -> &'static str {
        match self {
            Department::SurfaceWater => "地表水",
            Department::Agriculture => "农业",
            Department::Forestry => "林业",
            Department::AnimalHusbandry => "畜牧业",
            Department::Fishery => "渔业",
            Department::HumanLife => "人类生活",
            Department::Industry => "工业",
            Department::WastewaterTreatment => "废水处理",
            Department::WasteManagement => "废物处理",
            Department::UrbanGreenSpace => "城市绿地",
            Department::Groundwater => "地下水",
            Department::Atmosphere => "大气",
            Department::Ocean => "海洋",
            Department::OutsideImport => "外部(进口)",
            Department::OutsideExport => "外部(出口)",
        }
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a variable is user-supplied or derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Input,
    Output,
    Io,
}

impl VariableType {
    /// Output and io variables are candidates for evaluation.
    pub fn is_derived(&self) -> bool {
        matches!(self, VariableType::Output | VariableType::Io)
    }
}

/// Descriptive role; plays no part in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableRole {
    Variable,
    Parameter,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Output,
    Input,
}

/// Source and destination of a flow-carrying variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowEndpoints {
    pub from: Department,
    pub to: Department,
}

impl FlowEndpoints {
    pub fn new(from: Department, to: Department) -> Self {
        Self { from, to }
    }

    pub fn is_loop(&self) -> bool {
        self.from == self.to
    }
}

/// A named quantity of the model, either an input or derived from an expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub n_id: NId,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: VariableType,
    pub role: VariableRole,
    pub dept: Department,
    pub year: Option<String>,
    pub unit: String,
    /// `None` means "not computed yet" or "computation failed"; never a sentinel zero.
    pub value: Option<f64>,
    pub cell: String,
    pub origin_expr: Option<String>,
    pub expr: Option<String>,
    pub depends: SmallVec<[String; 4]>,
    pub sequence: i64,
    pub need_show: Option<bool>,
    pub direction: Option<Direction>,
    pub caption: Option<String>,
    pub flow: Option<FlowEndpoints>,
    pub counterpart: Option<i64>,
}

impl Variable {
    /// Creates a bare variable with every optional attribute unset.
    pub fn new(n_id: u32, id: impl Into<String>, kind: VariableType, dept: Department) -> Self {
        Self {
            n_id: NId(n_id),
            id: id.into(),
            kind,
            role: VariableRole::Variable,
            dept,
            year: None,
            unit: String::new(),
            value: None,
            cell: String::new(),
            origin_expr: None,
            expr: None,
            depends: SmallVec::new(),
            sequence: 0,
            need_show: None,
            direction: None,
            caption: None,
            flow: None,
            counterpart: None,
        }
    }

    pub fn input(n_id: u32, id: impl Into<String>, dept: Department, value: Option<f64>) -> Self {
        Self { value, ..Self::new(n_id, id, VariableType::Input, dept) }
    }

    /// An output variable computed from `expr` at position `sequence`.
    pub fn derived(n_id: u32, id: impl Into<String>, dept: Department, sequence: i64, expr: &str) -> Self {
        Self {
            sequence,
            expr: Some(expr.to_string()),
            ..Self::new(n_id, id, VariableType::Output, dept)
        }
    }

    pub fn with_depends<I, S>(mut self, depends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends = depends.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_flow(mut self, from: Department, to: Department) -> Self {
        self.flow = Some(FlowEndpoints::new(from, to));
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_value(mut self, value: Option<f64>) -> Self {
        self.value = value;
        self
    }

    pub fn is_input(&self) -> bool {
        self.kind == VariableType::Input
    }

    /// True for output/io variables that carry an expression.
    pub fn is_evaluable(&self) -> bool {
        self.kind.is_derived() && self.expr.is_some()
    }

    pub fn is_flow(&self) -> bool {
        self.flow.is_some()
    }
}
