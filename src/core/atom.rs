//! Atom domain model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Parameters of one atom call, in call order
pub type Params = Map<String, Value>;

/// Closed set of atom categories a step's module name maps onto
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomType {
    Data,
    Transform,
    Filter,
    Aggregate,
    Metrics,
    Report,
    Alert,
    Budget,
    Investment,
    Forecast,
    Export,
    Validate,
    Merge,
    Split,
    Cache,
    View,
    Ui,
    Source,
    Sink,
    Deploy,
}

impl AtomType {
    pub const ALL: [AtomType; 20] = [
        AtomType::Data,
        AtomType::Transform,
        AtomType::Filter,
        AtomType::Aggregate,
        AtomType::Metrics,
        AtomType::Report,
        AtomType::Alert,
        AtomType::Budget,
        AtomType::Investment,
        AtomType::Forecast,
        AtomType::Export,
        AtomType::Validate,
        AtomType::Merge,
        AtomType::Split,
        AtomType::Cache,
        AtomType::View,
        AtomType::Ui,
        AtomType::Source,
        AtomType::Sink,
        AtomType::Deploy,
    ];

    /// The module name used in DSL text
    pub fn as_str(&self) -> &'static str {
        match self {
            AtomType::Data => "data",
            AtomType::Transform => "transform",
            AtomType::Filter => "filter",
            AtomType::Aggregate => "aggregate",
            AtomType::Metrics => "metrics",
            AtomType::Report => "report",
            AtomType::Alert => "alert",
            AtomType::Budget => "budget",
            AtomType::Investment => "investment",
            AtomType::Forecast => "forecast",
            AtomType::Export => "export",
            AtomType::Validate => "validate",
            AtomType::Merge => "merge",
            AtomType::Split => "split",
            AtomType::Cache => "cache",
            AtomType::View => "view",
            AtomType::Ui => "ui",
            AtomType::Source => "source",
            AtomType::Sink => "sink",
            AtomType::Deploy => "deploy",
        }
    }

    /// Exact, case-sensitive lookup by module name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for AtomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AtomType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown atom type '{}'", s))
    }
}

/// Single operation in a pipeline: `type.action(params)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    #[serde(rename = "type")]
    pub atom_type: AtomType,

    pub action: String,

    /// Named parameters plus positional ones under `_arg0`, `_arg1`, ...
    /// Variable references stay unresolved (`"$name"`) until execution.
    #[serde(default)]
    pub params: Params,
}

impl Atom {
    pub fn new(atom_type: AtomType, action: impl Into<String>) -> Self {
        Self {
            atom_type,
            action: action.into(),
            params: Params::new(),
        }
    }

    pub fn with_params(atom_type: AtomType, action: impl Into<String>, params: Params) -> Self {
        Self {
            atom_type,
            action: action.into(),
            params,
        }
    }

    /// Add or replace a parameter
    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// `type.action` without parameters, used in log lines and error records
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.atom_type, self.action)
    }

    /// Render as DSL call syntax
    pub fn to_dsl(&self) -> String {
        crate::dsl::format::atom_to_dsl(self)
    }
}
