//! Runtime configuration from YAML

use crate::core::atom::AtomType;
use crate::dsl::parser::{ParserConfig, UnknownTypePolicy};
use crate::execution::{Executor, LoggingHook};
use crate::registry::AtomRegistry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn default_true() -> bool {
    true
}

fn default_fallback_type() -> AtomType {
    AtomType::Data
}

/// Settings shared by the parser, executor and CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DslConfig {
    /// What the parser does with a module name outside the atom type set
    #[serde(default)]
    pub unknown_atom_type: UnknownTypePolicy,

    /// Type assigned under the fallback policy
    #[serde(default = "default_fallback_type")]
    pub fallback_type: AtomType,

    /// Install a `LoggingHook` on executors built from this config
    #[serde(default = "default_true")]
    pub logging_hook: bool,

    /// Record run summaries
    #[serde(default = "default_true")]
    pub history: bool,

    /// Overrides the default history database location
    #[serde(default)]
    pub history_path: Option<PathBuf>,
}

impl Default for DslConfig {
    fn default() -> Self {
        Self {
            unknown_atom_type: UnknownTypePolicy::default(),
            fallback_type: default_fallback_type(),
            logging_hook: true,
            history: true,
            history_path: None,
        }
    }
}

impl DslConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse configuration from a YAML string; an empty document yields the defaults
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            unknown_type: self.unknown_atom_type,
            fallback_type: self.fallback_type,
        }
    }

    /// Executor over `registry` with this config's parser settings and hooks
    pub fn executor(&self, registry: Arc<AtomRegistry>) -> Executor {
        let mut executor = Executor::new(registry).with_parser_config(self.parser_config());
        if self.logging_hook {
            executor.add_hook(Box::new(LoggingHook));
        }
        executor
    }
}
