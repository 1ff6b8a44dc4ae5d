//! Pipeline domain model

use crate::core::{
    atom::{Atom, AtomType, Params},
    error::DslError,
    step::PipelineStep,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_PIPELINE_NAME: &str = "anonymous";

fn default_name() -> String {
    DEFAULT_PIPELINE_NAME.to_string()
}

fn default_version() -> String {
    "1.0".to_string()
}

/// A parsed pipeline: declared variables and ordered steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub domain: Option<String>,

    /// Variables declared with `$name = value`, in declaration order
    #[serde(default)]
    pub variables: Map<String, Value>,

    /// Execution order is exactly this order
    #[serde(default)]
    pub steps: Vec<PipelineStep>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            description: String::new(),
            domain: None,
            variables: Map::new(),
            steps: Vec::new(),
        }
    }

    /// Normalized DSL text; parsing it yields an equivalent definition
    pub fn to_dsl(&self) -> String {
        crate::dsl::format::pipeline_to_dsl(self)
    }

    /// Structured tree form
    pub fn to_value(&self) -> Value {
        // Every field is a string, map or sequence with string keys
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_json(&self) -> Result<String, DslError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, DslError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_yaml(&self) -> Result<String, DslError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, DslError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// `(type, action, params)` triples in execution order
    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        self.steps.iter().map(|s| &s.atom)
    }
}

impl Default for PipelineDefinition {
    fn default() -> Self {
        Self::new(DEFAULT_PIPELINE_NAME)
    }
}

/// Fluent construction of a [`PipelineDefinition`] without DSL text
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    definition: PipelineDefinition,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            definition: PipelineDefinition::new("pipeline"),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.definition.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.definition.description = description.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.definition.domain = Some(domain.into());
        self
    }

    pub fn var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.definition.variables.insert(name.into(), value);
        self
    }

    /// Append an atom with the default step metadata
    pub fn atom(mut self, atom_type: AtomType, action: impl Into<String>, params: Params) -> Self {
        self.definition
            .steps
            .push(PipelineStep::new(Atom::with_params(atom_type, action, params)));
        self
    }

    pub fn step(mut self, step: PipelineStep) -> Self {
        self.definition.steps.push(step);
        self
    }

    pub fn build(self) -> PipelineDefinition {
        self.definition
    }

    pub fn to_dsl(&self) -> String {
        self.definition.to_dsl()
    }

    pub fn to_json(&self) -> Result<String, DslError> {
        self.definition.to_json()
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
