//! Scenario-based tests for atom-pipeline

mod async_execution;
mod error_policies;
mod history;
mod hooks;
mod round_trip;
mod success_chain;
mod unknown_atoms;
mod variable_substitution;
