//! Declared atom parameters
//!
//! An atom that declares parameters gets its call normalized before the
//! handler sees it: positional `_argN` values are bound to declared names,
//! optional defaults are filled in, and missing or mistyped values are
//! rejected. Atoms without declarations receive their parameters untouched.

use crate::core::{atom::Params, error::AtomError};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Expected JSON type of a parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl ParamType {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
            ParamType::Any => true,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
            ParamType::Any => "any",
        };
        f.write_str(name)
    }
}

/// How a parameter is constrained
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamRule {
    /// Must be present, non-null and of the given type
    Required {
        #[serde(rename = "type")]
        param_type: ParamType,
    },
    /// Filled with `default` when absent; checked against the type when non-null
    Optional {
        #[serde(rename = "type")]
        param_type: ParamType,
        default: Value,
    },
    /// Must equal one of `values`
    OneOf { values: Vec<Value> },
}

/// One declared parameter of an atom
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(flatten)]
    pub rule: ParamRule,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, param_type: ParamType) -> Self {
        Self::with_rule(name, ParamRule::Required { param_type })
    }

    pub fn optional(name: impl Into<String>, param_type: ParamType, default: Value) -> Self {
        Self::with_rule(name, ParamRule::Optional { param_type, default })
    }

    pub fn one_of(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self::with_rule(name, ParamRule::OneOf { values })
    }

    fn with_rule(name: impl Into<String>, rule: ParamRule) -> Self {
        Self {
            name: name.into(),
            rule,
            description: String::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn is_required(&self) -> bool {
        matches!(self.rule, ParamRule::Required { .. })
    }

    /// Signature fragment for listings, e.g. `field: string` or `order?: string = "asc"`
    pub fn signature(&self) -> String {
        match &self.rule {
            ParamRule::Required { param_type } => format!("{}: {}", self.name, param_type),
            ParamRule::Optional {
                param_type,
                default: Value::Null,
            } => format!("{}?: {}", self.name, param_type),
            ParamRule::Optional { param_type, default } => {
                format!("{}?: {} = {}", self.name, param_type, default)
            }
            ParamRule::OneOf { values } => {
                let options: Vec<String> = values.iter().map(Value::to_string).collect();
                format!("{}: {}", self.name, options.join(" | "))
            }
        }
    }

    fn check(&self, value: Option<&Value>) -> Option<String> {
        match (&self.rule, value) {
            (ParamRule::Required { .. }, None | Some(Value::Null)) => {
                Some(format!("required parameter '{}' is missing", self.name))
            }
            (ParamRule::Required { param_type }, Some(value))
            | (ParamRule::Optional { param_type, .. }, Some(value))
                if !value.is_null() && !param_type.accepts(value) =>
            {
                Some(format!(
                    "parameter '{}' must be {}, got {}",
                    self.name, param_type, value
                ))
            }
            (ParamRule::OneOf { values }, value) => {
                let value = value.unwrap_or(&Value::Null);
                (!values.contains(value)).then(|| {
                    let options: Vec<String> = values.iter().map(Value::to_string).collect();
                    format!(
                        "parameter '{}' must be one of [{}], got {}",
                        self.name,
                        options.join(", "),
                        value
                    )
                })
            }
            _ => None,
        }
    }
}

/// Bind positional arguments, apply defaults and validate against `specs`.
///
/// Positional values fill the declared parameters in declaration order,
/// skipping names the call already gives. Positional values with no
/// parameter left to fill are dropped. Every problem is reported in one error.
pub fn normalize_params(specs: &[ParamSpec], params: &Params) -> Result<Params, AtomError> {
    if specs.is_empty() {
        return Ok(params.clone());
    }

    let mut positional: Vec<(usize, &Value)> = params
        .iter()
        .filter_map(|(key, value)| positional_index(key).map(|i| (i, value)))
        .collect();
    positional.sort_by_key(|(i, _)| *i);

    let mut normalized: Params = params
        .iter()
        .filter(|(key, _)| positional_index(key).is_none())
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let open: Vec<&ParamSpec> = specs
        .iter()
        .filter(|spec| normalized.get(&spec.name).map_or(true, Value::is_null))
        .collect();
    for (spec, (_, value)) in open.into_iter().zip(positional) {
        normalized.insert(spec.name.clone(), value.clone());
    }

    for spec in specs {
        if let ParamRule::Optional { default, .. } = &spec.rule {
            if !normalized.contains_key(&spec.name) {
                normalized.insert(spec.name.clone(), default.clone());
            }
        }
    }

    let problems: Vec<String> = specs
        .iter()
        .filter_map(|spec| spec.check(normalized.get(&spec.name)))
        .collect();
    if problems.is_empty() {
        Ok(normalized)
    } else {
        Err(AtomError::new(problems.join("; ")))
    }
}

fn positional_index(key: &str) -> Option<usize> {
    key.strip_prefix("_arg")?.parse().ok()
}
