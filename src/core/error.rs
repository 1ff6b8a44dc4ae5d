//! Error taxonomy for parsing and execution

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the tokenizer, parser, resolver and executor
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DslError {
    #[error("Syntax error at line {line}, column {column}: expected {expected}, found {found}")]
    Syntax {
        expected: String,
        found: String,
        line: usize,
        column: usize,
    },

    #[error("Unknown atom type '{name}' at line {line}, column {column}")]
    UnknownAtomType {
        name: String,
        line: usize,
        column: usize,
    },

    #[error("Unknown atom: {atom_type}.{action}")]
    UnknownAtom { atom_type: String, action: String },

    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("{atom} failed: {message}")]
    Handler { atom: String, message: String },

    #[error("Atom {0} only has an async handler; use execute_async")]
    AsyncOnly(String),

    #[error("Invalid pipeline document: {0}")]
    Serialization(String),
}

/// Coarse classification recorded with every error entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Syntax,
    UnknownAtom,
    UndefinedVariable,
    Handler,
    Serialization,
}

impl DslError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DslError::Syntax { .. } | DslError::UnknownAtomType { .. } => ErrorKind::Syntax,
            DslError::UnknownAtom { .. } | DslError::AsyncOnly(_) => ErrorKind::UnknownAtom,
            DslError::UndefinedVariable(_) => ErrorKind::UndefinedVariable,
            DslError::Handler { .. } => ErrorKind::Handler,
            DslError::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Whether a step's `on_error` policy may act on this error.
    ///
    /// Syntax and unknown-atom failures always propagate.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DslError::UndefinedVariable(_) | DslError::Handler { .. }
        )
    }
}

impl From<serde_json::Error> for DslError {
    fn from(err: serde_json::Error) -> Self {
        DslError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for DslError {
    fn from(err: serde_yaml::Error) -> Self {
        DslError::Serialization(err.to_string())
    }
}

/// Failure reported by an atom handler
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct AtomError(pub String);

impl AtomError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for AtomError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for AtomError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<serde_json::Error> for AtomError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

impl From<DslError> for AtomError {
    fn from(err: DslError) -> Self {
        Self(err.to_string())
    }
}
