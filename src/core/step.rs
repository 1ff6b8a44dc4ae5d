//! Step domain model

use crate::core::atom::Atom;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the executor does when a step's handler fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Propagate the failure and halt the pipeline
    #[default]
    Stop,
    /// Record the failure, keep the current data and continue
    Skip,
    /// Invoke the handler once more; propagate if that fails too
    Retry,
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorPolicy::Stop => "stop",
            ErrorPolicy::Skip => "skip",
            ErrorPolicy::Retry => "retry",
        };
        f.write_str(name)
    }
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stop" => Ok(ErrorPolicy::Stop),
            "skip" => Ok(ErrorPolicy::Skip),
            "retry" => Ok(ErrorPolicy::Retry),
            other => Err(format!("unknown error policy '{}'", other)),
        }
    }
}

/// An atom plus its execution metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub atom: Atom,

    /// Carried for the host application; not evaluated by the executor
    #[serde(default)]
    pub condition: Option<String>,

    #[serde(default)]
    pub on_error: ErrorPolicy,

    /// Milliseconds. Carried as metadata, not enforced.
    #[serde(default)]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub cache_key: Option<String>,
}

impl PipelineStep {
    pub fn new(atom: Atom) -> Self {
        Self {
            atom,
            condition: None,
            on_error: ErrorPolicy::Stop,
            timeout: None,
            cache_key: None,
        }
    }

    pub fn on_error(mut self, policy: ErrorPolicy) -> Self {
        self.on_error = policy;
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// Identifier used in error records and log lines
    pub fn identifier(&self) -> String {
        self.atom.to_dsl()
    }
}

impl From<Atom> for PipelineStep {
    fn from(atom: Atom) -> Self {
        PipelineStep::new(atom)
    }
}
