//! Normalized DSL text for atoms and pipeline definitions

use crate::core::{atom::Atom, pipeline::PipelineDefinition};
use serde_json::{Number, Value};
use std::fmt::Write;

/// `type.action(params)` with positional arguments first-class
pub fn atom_to_dsl(atom: &Atom) -> String {
    let mut out = format!("{}.{}(", atom.atom_type, atom.action);
    let mut positional = 0;

    for (i, (key, value)) in atom.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        if *key == format!("_arg{}", positional) {
            positional += 1;
        } else {
            let _ = write!(out, "{}=", key);
        }
        write_value(&mut out, value);
    }

    out.push(')');
    out
}

/// Header, description comments, variable declarations and the piped steps
pub fn pipeline_to_dsl(pipeline: &PipelineDefinition) -> String {
    let mut lines = vec![format!("@pipeline {}:", name_literal(&pipeline.name))];

    for line in pipeline.description.lines() {
        lines.push(format!("  # {}", line));
    }

    for (name, value) in &pipeline.variables {
        lines.push(format!("  ${} = {}", name, value_to_dsl(value)));
    }

    for (i, step) in pipeline.steps.iter().enumerate() {
        let prefix = if i == 0 { "  " } else { "  | " };
        lines.push(format!("{}{}", prefix, atom_to_dsl(&step.atom)));
    }

    lines.join("\n")
}

/// A single literal in DSL syntax
pub fn value_to_dsl(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&number_literal(n)),
        Value::String(s) if is_variable_reference(s) => out.push_str(s),
        Value::String(s) => out.push_str(&quote(s)),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                if is_bare_word(key) {
                    out.push_str(key);
                } else {
                    out.push_str(&quote(key));
                }
                out.push_str(": ");
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn number_literal(n: &Number) -> String {
    match n.as_f64() {
        // Plain decimal notation; floats must keep a '.' to reparse as floats
        Some(f) if n.is_f64() => {
            let text = f.to_string();
            if text.contains('.') {
                text
            } else {
                format!("{}.0", text)
            }
        }
        _ => n.to_string(),
    }
}

fn name_literal(name: &str) -> String {
    if is_bare_word(name) {
        name.to_string()
    } else {
        quote(name)
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Identifier that the tokenizer will not classify as a boolean
fn is_bare_word(s: &str) -> bool {
    is_identifier(s) && !matches!(s, "true" | "false" | "True" | "False")
}

/// `$name` that reparses as a reference; `$true` would tokenize as `$` then a bool
fn is_variable_reference(s: &str) -> bool {
    s.strip_prefix('$').is_some_and(is_bare_word)
}
