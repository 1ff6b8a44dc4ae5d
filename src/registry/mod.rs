//! Atom registry: `(type, action)` to handler lookup
//!
//! Built once at start-up, then shared read-only (usually behind an `Arc`)
//! by every executor. Registering an existing key replaces the old entry.

pub mod builtin;
pub mod params;

use crate::core::{
    atom::{AtomType, Params},
    context::AtomContext,
    error::AtomError,
};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub use params::{normalize_params, ParamRule, ParamSpec, ParamType};

/// What a handler returns: `Some(value)` replaces the context data, `None` leaves it
pub type AtomResult = Result<Option<Value>, AtomError>;

/// Synchronous handler signature
pub type SyncHandlerFn = dyn Fn(&mut dyn AtomContext, &Params) -> AtomResult + Send + Sync;

/// A handler that may suspend on I/O
#[async_trait]
pub trait AsyncAtomHandler: Send + Sync {
    async fn call(&self, ctx: &mut dyn AtomContext, params: &Params) -> AtomResult;
}

#[derive(Clone)]
pub enum Handler {
    Sync(Arc<SyncHandlerFn>),
    Async(Arc<dyn AsyncAtomHandler>),
}

impl Handler {
    pub fn is_async(&self) -> bool {
        matches!(self, Handler::Async(_))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Sync(_) => f.write_str("Handler::Sync"),
            Handler::Async(_) => f.write_str("Handler::Async"),
        }
    }
}

/// Documentation and declared parameters of a registered atom
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AtomInfo {
    pub description: String,
    /// Declared parameters; empty means the handler takes whatever it is given
    pub params: Vec<ParamSpec>,
    /// Example DSL calls
    pub examples: Vec<String>,
}

impl AtomInfo {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            params: Vec::new(),
            examples: Vec::new(),
        }
    }

    pub fn with_param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    /// Bind, default and validate a call against the declared parameters
    pub fn normalize(&self, params: &Params) -> Result<Params, AtomError> {
        normalize_params(&self.params, params)
    }
}

/// A handler together with its documentation
#[derive(Debug, Clone)]
pub struct RegisteredAtom {
    pub handler: Handler,
    pub info: AtomInfo,
}

#[derive(Debug, Clone, Default)]
pub struct AtomRegistry {
    atoms: BTreeMap<AtomType, BTreeMap<String, RegisteredAtom>>,
}

impl AtomRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the generic data/transform/metrics atoms
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_builtins(&mut registry);
        registry
    }

    /// Register a synchronous handler
    pub fn register<F>(&mut self, atom_type: AtomType, action: &str, handler: F) -> &mut Self
    where
        F: Fn(&mut dyn AtomContext, &Params) -> AtomResult + Send + Sync + 'static,
    {
        self.register_handler(atom_type, action, Handler::Sync(Arc::new(handler)), AtomInfo::default())
    }

    /// Register a synchronous handler with documentation
    pub fn register_with_info<F>(
        &mut self,
        atom_type: AtomType,
        action: &str,
        info: AtomInfo,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(&mut dyn AtomContext, &Params) -> AtomResult + Send + Sync + 'static,
    {
        self.register_handler(atom_type, action, Handler::Sync(Arc::new(handler)), info)
    }

    /// Register an asynchronous handler
    pub fn register_async<H>(&mut self, atom_type: AtomType, action: &str, handler: H) -> &mut Self
    where
        H: AsyncAtomHandler + 'static,
    {
        self.register_handler(atom_type, action, Handler::Async(Arc::new(handler)), AtomInfo::default())
    }

    pub fn register_handler(
        &mut self,
        atom_type: AtomType,
        action: &str,
        handler: Handler,
        info: AtomInfo,
    ) -> &mut Self {
        let replaced = self
            .atoms
            .entry(atom_type)
            .or_default()
            .insert(action.to_string(), RegisteredAtom { handler, info })
            .is_some();

        if replaced {
            debug!("Re-registered atom {}.{}", atom_type, action);
        } else {
            debug!("Registered atom {}.{}", atom_type, action);
        }
        self
    }

    pub fn get(&self, atom_type: AtomType, action: &str) -> Option<&Handler> {
        self.entry(atom_type, action).map(|a| &a.handler)
    }

    /// Handler and info in one lookup
    pub fn lookup(&self, atom_type: AtomType, action: &str) -> Option<&RegisteredAtom> {
        self.entry(atom_type, action)
    }

    pub fn info(&self, atom_type: AtomType, action: &str) -> Option<&AtomInfo> {
        self.entry(atom_type, action).map(|a| &a.info)
    }

    pub fn contains(&self, atom_type: AtomType, action: &str) -> bool {
        self.entry(atom_type, action).is_some()
    }

    /// Registered actions grouped by type, both sorted
    pub fn list(&self) -> BTreeMap<AtomType, Vec<String>> {
        self.atoms
            .iter()
            .filter(|(_, actions)| !actions.is_empty())
            .map(|(atom_type, actions)| (*atom_type, actions.keys().cloned().collect()))
            .collect()
    }

    /// Every `(type, action, info)` in listing order
    pub fn describe(&self) -> Vec<(AtomType, &str, &AtomInfo)> {
        self.atoms
            .iter()
            .flat_map(|(atom_type, actions)| {
                actions
                    .iter()
                    .map(move |(action, atom)| (*atom_type, action.as_str(), &atom.info))
            })
            .collect()
    }

    /// Documentation tree, `{type: {action: {description, params, examples}}}`,
    /// optionally limited to one atom type
    pub fn docs(&self, only: Option<AtomType>) -> Value {
        let mut docs = Map::new();
        for (atom_type, actions) in &self.atoms {
            if only.is_some_and(|wanted| wanted != *atom_type) || actions.is_empty() {
                continue;
            }
            let entries: Map<String, Value> = actions
                .iter()
                .map(|(action, atom)| {
                    let entry = serde_json::to_value(&atom.info).unwrap_or_default();
                    (action.clone(), entry)
                })
                .collect();
            docs.insert(atom_type.to_string(), Value::Object(entries));
        }
        Value::Object(docs)
    }

    pub fn len(&self) -> usize {
        self.atoms.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, atom_type: AtomType, action: &str) -> Option<&RegisteredAtom> {
        self.atoms.get(&atom_type).and_then(|actions| actions.get(action))
    }
}
