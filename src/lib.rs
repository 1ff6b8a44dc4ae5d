//! atom-pipeline - a pipe-based DSL for chaining atom operations
//!
//! Text such as `data.load("sales") | transform.filter(status="active") | metrics.sum("amount")`
//! is parsed into a [`PipelineDefinition`], then run step by step by an
//! [`Executor`] against a shared [`ExecutionContext`]. Handlers are looked up
//! in an [`AtomRegistry`] by atom type and action.

pub mod cli;
pub mod core;
pub mod dsl;
pub mod execution;
pub mod persistence;
pub mod registry;

// Re-export commonly used types
pub use core::{
    Atom, AtomContext, AtomError, AtomType, DslConfig, DslError, ErrorKind, ErrorPolicy,
    ExecutionContext, ExecutionStatus, LogLevel, Params, PipelineBuilder, PipelineDefinition,
    PipelineStep,
};
pub use dsl::{parse, Parser, ParserConfig, UnknownTypePolicy};
pub use execution::{EventHook, ExecutionEvent, ExecutionHook, Executor, LoggingHook, TracingHook};
pub use persistence::{create_summary, HistoryBackend, InMemoryHistory, RunSummary};
pub use registry::{AsyncAtomHandler, AtomInfo, AtomRegistry, AtomResult, Handler};
