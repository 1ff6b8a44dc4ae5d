//! CLI command definitions

use crate::core::pipeline::PipelineDefinition;
use clap::Args;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Run a pipeline file
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Pipeline file; `.json`, `.yaml` and `.yml` load the tree form, anything else is DSL
    pub file: PathBuf,

    /// Variable overrides (name=value, value parsed as JSON when possible)
    #[arg(long, value_parser = parse_key_value)]
    pub var: Vec<(String, String)>,

    /// Initial data as JSON
    #[arg(long)]
    pub data: Option<String>,

    /// Domain name placed on the execution context
    #[arg(long)]
    pub domain: Option<String>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// Print the final context as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunCommand {
    /// Progress and status lines are printed only when stdout is not the JSON document
    pub fn status_lines(&self) -> bool {
        !self.json
    }
}

/// Run DSL text
#[derive(Debug, Args, Clone)]
pub struct ExecCommand {
    /// Pipeline DSL, or `-` to read it from stdin
    pub dsl: String,

    /// Variable overrides (name=value, value parsed as JSON when possible)
    #[arg(long, value_parser = parse_key_value)]
    pub var: Vec<(String, String)>,

    /// Initial data as JSON
    #[arg(long)]
    pub data: Option<String>,

    /// Domain name placed on the execution context
    #[arg(long)]
    pub domain: Option<String>,

    /// Print the final context as JSON
    #[arg(long)]
    pub json: bool,
}

impl ExecCommand {
    pub fn status_lines(&self) -> bool {
        !self.json
    }
}

/// Validate a pipeline
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    pub file: PathBuf,

    /// Reject module names outside the atom type set instead of falling back
    #[arg(long)]
    pub strict: bool,

    /// Output the parsed tree as JSON
    #[arg(long)]
    pub json: bool,
}

/// Convert a pipeline between representations
#[derive(Debug, Args, Clone)]
pub struct ConvertCommand {
    pub file: PathBuf,

    /// Output representation
    #[arg(long, value_enum, default_value_t = PipelineFormat::Dsl)]
    pub to: PipelineFormat,
}

/// List registered atoms
#[derive(Debug, Args, Clone)]
pub struct ListAtomsCommand {
    /// Show descriptions and examples
    #[arg(long)]
    pub details: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a single run
    #[arg(long)]
    pub execution_id: Option<String>,

    /// List the pipelines that have recorded runs instead of the runs
    #[arg(long, conflicts_with = "execution_id")]
    pub pipelines: bool,
}

/// Pipeline representation on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PipelineFormat {
    Dsl,
    Json,
    Yaml,
}

impl PipelineFormat {
    /// Guess the representation from a file extension, defaulting to DSL
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => PipelineFormat::Json,
            Some("yaml") | Some("yml") => PipelineFormat::Yaml,
            _ => PipelineFormat::Dsl,
        }
    }
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}

/// JSON when the text parses as JSON, otherwise the raw string
pub fn parse_var_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Write `--var` overrides into the definition's variables so they win over
/// its own declarations
pub fn apply_var_overrides(pipeline: &mut PipelineDefinition, vars: &[(String, String)]) {
    for (key, value) in vars {
        pipeline.variables.insert(key.clone(), parse_var_value(value));
    }
}
