//! `$name` / `${name}` substitution in atom parameters

use crate::core::{atom::Params, error::DslError};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::OnceLock;

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("reference pattern is valid")
    })
}

fn exact_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*))$")
            .expect("exact reference pattern is valid")
    })
}

fn captured_name<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default()
}

/// Text used when a variable is interpolated into a larger string
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve one value against `variables`, recursing into containers.
///
/// A string that is exactly one reference becomes the bound value with its
/// own type. A string containing references is interpolated. Any unbound
/// name fails the whole resolution.
pub fn resolve_value<F>(value: &Value, lookup: &F) -> Result<Value, DslError>
where
    F: Fn(&str) -> Option<Value>,
{
    match value {
        Value::String(text) => resolve_str(text, lookup),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_value(item, lookup))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => resolve_map(map, lookup).map(Value::Object),
        other => Ok(other.clone()),
    }
}

/// Resolve every parameter of an atom call
pub fn resolve_params<F>(params: &Params, lookup: &F) -> Result<Params, DslError>
where
    F: Fn(&str) -> Option<Value>,
{
    resolve_map(params, lookup)
}

fn resolve_map<F>(map: &Map<String, Value>, lookup: &F) -> Result<Map<String, Value>, DslError>
where
    F: Fn(&str) -> Option<Value>,
{
    let mut resolved = Map::with_capacity(map.len());
    for (key, value) in map {
        resolved.insert(key.clone(), resolve_value(value, lookup)?);
    }
    Ok(resolved)
}

fn resolve_str<F>(text: &str, lookup: &F) -> Result<Value, DslError>
where
    F: Fn(&str) -> Option<Value>,
{
    if !text.contains('$') {
        return Ok(Value::String(text.to_string()));
    }

    if let Some(caps) = exact_pattern().captures(text) {
        let name = captured_name(&caps);
        return lookup(name).ok_or_else(|| DslError::UndefinedVariable(text.to_string()));
    }

    let pattern = reference_pattern();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in pattern.captures_iter(text) {
        let whole = caps.get(0).map(|m| (m.start(), m.end(), m.as_str()));
        let Some((start, end, token)) = whole else {
            continue;
        };
        let name = captured_name(&caps);
        let bound = lookup(name).ok_or_else(|| DslError::UndefinedVariable(token.to_string()))?;
        out.push_str(&text[last..start]);
        out.push_str(&display_value(&bound));
        last = end;
    }
    out.push_str(&text[last..]);

    Ok(Value::String(out))
}
