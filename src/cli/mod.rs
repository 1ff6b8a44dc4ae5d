//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{
    ConvertCommand, ExecCommand, HistoryCommand, ListAtomsCommand, RunCommand, ValidateCommand,
};
use std::ffi::OsString;
use std::path::PathBuf;

/// Run atom pipelines written in the pipe DSL
#[derive(Debug, Parser, Clone)]
#[command(name = "atompipe")]
#[command(version)]
#[command(about = "Parse, validate and execute atom pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a YAML runtime configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline file (DSL, JSON or YAML)
    Run(RunCommand),

    /// Run DSL text given on the command line
    Exec(ExecCommand),

    /// Check that a pipeline parses and every atom is registered
    Validate(ValidateCommand),

    /// Convert a pipeline between DSL, JSON and YAML
    Convert(ConvertCommand),

    /// List registered atoms
    ListAtoms(ListAtomsCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
