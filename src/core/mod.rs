//! Core domain models
//!
//! Atoms, steps and pipeline definitions, the execution context they run
//! against, variable resolution and the error taxonomy.

pub mod atom;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod resolve;
pub mod state;
pub mod step;

pub use atom::*;
pub use config::DslConfig;
pub use context::*;
pub use error::*;
pub use pipeline::*;
pub use state::*;
pub use step::*;
