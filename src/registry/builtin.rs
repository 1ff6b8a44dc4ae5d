//! Generic data, transform and metrics atoms
//!
//! These work on the current context data as a list of JSON objects. Domain
//! atoms (reports, budgets, exports...) are registered by the embedding
//! application. `transform.filter` and `transform.rename` take free-form
//! named arguments and so declare no parameters.

use crate::core::{
    atom::{AtomType, Params},
    context::{AtomContext, LogLevel},
    error::AtomError,
};
use crate::registry::{AtomInfo, AtomRegistry, AtomResult, ParamSpec, ParamType};
use serde_json::{json, Map, Number, Value};
use std::cmp::Ordering;

const DEFAULT_LIMIT: u64 = 10;
const DEFAULT_METRICS: [&str; 3] = ["sum", "avg", "count"];

pub fn register_builtins(registry: &mut AtomRegistry) {
    registry
        .register_with_info(
            AtomType::Data,
            "from_input",
            AtomInfo::new("Use the `data` parameter, or the current context data, as input")
                .with_param(
                    ParamSpec::optional("data", ParamType::Any, Value::Null)
                        .describe("Literal input; empty values fall back to the context data"),
                )
                .with_example("data.from_input()")
                .with_example("data.from_input([1, 2, 3])"),
            data_from_input,
        )
        .register_with_info(
            AtomType::Transform,
            "filter",
            AtomInfo::new("Keep rows matching every condition; `field__op` selects eq, ne, gt, gte, lt, lte, in or contains")
                .with_example("transform.filter(year=2024)")
                .with_example("transform.filter(amount__gt=100, region__in=[\"EU\", \"US\"])"),
            transform_filter,
        )
        .register_with_info(
            AtomType::Transform,
            "sort",
            AtomInfo::new("Sort rows by a field")
                .with_param(ParamSpec::required("by", ParamType::String).describe("Field to sort on"))
                .with_param(
                    ParamSpec::optional("order", ParamType::String, json!("asc"))
                        .describe("asc or desc"),
                )
                .with_example("transform.sort(by=\"amount\", order=\"desc\")"),
            transform_sort,
        )
        .register_with_info(
            AtomType::Transform,
            "limit",
            AtomInfo::new("Keep the first n rows")
                .with_param(ParamSpec::optional("n", ParamType::Number, json!(DEFAULT_LIMIT)))
                .with_example("transform.limit(5)"),
            transform_limit,
        )
        .register_with_info(
            AtomType::Transform,
            "select",
            AtomInfo::new("Keep only the listed fields of each row")
                .with_param(
                    ParamSpec::optional("fields", ParamType::Any, json!([]))
                        .describe("Field name or list of field names"),
                )
                .with_example("transform.select(fields=[\"id\", \"amount\"])"),
            transform_select,
        )
        .register_with_info(
            AtomType::Transform,
            "rename",
            AtomInfo::new("Rename fields, `old=\"new\"`")
                .with_example("transform.rename(amt=\"amount\")"),
            transform_rename,
        )
        .register_with_info(
            AtomType::Metrics,
            "sum",
            AtomInfo::new("Sum a numeric field")
                .with_param(field_param())
                .with_example("metrics.sum(\"amount\")"),
            |ctx, params| aggregate(ctx, params, Aggregate::Sum),
        )
        .register_with_info(
            AtomType::Metrics,
            "avg",
            AtomInfo::new("Average of a numeric field")
                .with_param(field_param())
                .with_example("metrics.avg(\"amount\")"),
            |ctx, params| aggregate(ctx, params, Aggregate::Avg),
        )
        .register_with_info(
            AtomType::Metrics,
            "min",
            AtomInfo::new("Smallest value of a numeric field")
                .with_param(field_param())
                .with_example("metrics.min(\"amount\")"),
            |ctx, params| aggregate(ctx, params, Aggregate::Min),
        )
        .register_with_info(
            AtomType::Metrics,
            "max",
            AtomInfo::new("Largest value of a numeric field")
                .with_param(field_param())
                .with_example("metrics.max(\"amount\")"),
            |ctx, params| aggregate(ctx, params, Aggregate::Max),
        )
        .register_with_info(
            AtomType::Metrics,
            "count",
            AtomInfo::new("Number of rows").with_example("metrics.count()"),
            metrics_count,
        )
        .register_with_info(
            AtomType::Metrics,
            "calculate",
            AtomInfo::new("Several metrics at once (sum, avg, count, min, max)")
                .with_param(
                    ParamSpec::optional("metrics", ParamType::Any, json!(DEFAULT_METRICS))
                        .describe("Metric name or list of metric names"),
                )
                .with_param(field_param())
                .with_example("metrics.calculate([\"sum\", \"avg\"], field=\"amount\")"),
            metrics_calculate,
        );
}

fn field_param() -> ParamSpec {
    ParamSpec::optional("field", ParamType::String, Value::Null)
        .describe("Field to aggregate; bare numbers when omitted")
}

// Data

fn data_from_input(ctx: &mut dyn AtomContext, params: &Params) -> AtomResult {
    let provided = params.get("data").filter(|v| truthy(v)).cloned();
    Ok(Some(provided.unwrap_or_else(|| ctx.data().clone())))
}

// Transform

fn transform_filter(ctx: &mut dyn AtomContext, params: &Params) -> AtomResult {
    let conditions: Vec<(&String, &Value)> =
        params.iter().filter(|(k, _)| !k.starts_with('_')).collect();
    ctx.log(
        &format!("Filtering with {} condition(s)", conditions.len()),
        LogLevel::Debug,
    );

    let keep = |rows: &[Value]| -> Vec<Value> {
        rows.iter()
            .filter(|row| matches_conditions(row, &conditions))
            .cloned()
            .collect()
    };

    match ctx.data() {
        Value::Array(rows) => Ok(Some(Value::Array(keep(rows)))),
        Value::Object(map) => {
            let key = rows_key(map).ok_or_else(|| {
                AtomError::new("transform.filter: data object has no single list of rows")
            })?;
            let mut out = map.clone();
            if let Some(Value::Array(rows)) = map.get(&key) {
                out.insert(key, Value::Array(keep(rows)));
            }
            Ok(Some(Value::Object(out)))
        }
        other => Err(AtomError::new(format!(
            "transform.filter expects a list, got {}",
            type_name(other)
        ))),
    }
}

/// Field holding the rows when data is an envelope object
fn rows_key(map: &Map<String, Value>) -> Option<String> {
    const PREFERRED: [&str; 6] = ["data", "rows", "readings", "monthly", "items", "records"];
    if let Some(key) = PREFERRED
        .iter()
        .find(|k| matches!(map.get(**k), Some(Value::Array(_))))
    {
        return Some(key.to_string());
    }

    let mut lists = map.iter().filter(|(_, v)| v.is_array()).map(|(k, _)| k);
    match (lists.next(), lists.next()) {
        (Some(only), None) => Some(only.clone()),
        _ => None,
    }
}

fn matches_conditions(row: &Value, conditions: &[(&String, &Value)]) -> bool {
    let Some(row) = row.as_object() else {
        return false;
    };

    conditions.iter().all(|(key, expected)| {
        let (field, op) = key.split_once("__").unwrap_or((key.as_str(), "eq"));
        let Some(actual) = row.get(field) else {
            return false;
        };

        match op {
            "eq" => values_equal(actual, expected),
            "ne" => !values_equal(actual, expected),
            "gt" => compare(actual, expected) == Some(Ordering::Greater),
            "gte" => matches!(compare(actual, expected), Some(Ordering::Greater | Ordering::Equal)),
            "lt" => compare(actual, expected) == Some(Ordering::Less),
            "lte" => matches!(compare(actual, expected), Some(Ordering::Less | Ordering::Equal)),
            "in" => expected
                .as_array()
                .is_some_and(|options| options.iter().any(|o| values_equal(actual, o))),
            "contains" => match actual {
                Value::String(s) => s.contains(&display(expected)),
                Value::Array(items) => items.iter().any(|i| values_equal(i, expected)),
                _ => false,
            },
            _ => false,
        }
    })
}

fn transform_sort(ctx: &mut dyn AtomContext, params: &Params) -> AtomResult {
    let by = params
        .get("by")
        .and_then(Value::as_str)
        .ok_or_else(|| AtomError::new("transform.sort requires a 'by' field"))?
        .to_string();
    let descending = params
        .get("order")
        .and_then(Value::as_str)
        .is_some_and(|o| o.eq_ignore_ascii_case("desc"));
    ctx.log(
        &format!("Sorting by {} ({})", by, if descending { "desc" } else { "asc" }),
        LogLevel::Debug,
    );

    let mut rows = expect_rows(ctx.data(), "transform.sort")?.clone();
    let zero = json!(0);
    rows.sort_by(|a, b| {
        let a = a.get(&by).unwrap_or(&zero);
        let b = b.get(&by).unwrap_or(&zero);
        let ordering = sort_order(a, b);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
    Ok(Some(Value::Array(rows)))
}

fn transform_limit(ctx: &mut dyn AtomContext, params: &Params) -> AtomResult {
    let n = match params.get("n") {
        None | Some(Value::Null) => DEFAULT_LIMIT,
        Some(value) => value
            .as_u64()
            .ok_or_else(|| AtomError::new(format!("transform.limit: invalid n {}", value)))?,
    };
    let rows = expect_rows(ctx.data(), "transform.limit")?;
    let n = usize::try_from(n).unwrap_or(usize::MAX);
    Ok(Some(Value::Array(rows.iter().take(n).cloned().collect())))
}

fn transform_select(ctx: &mut dyn AtomContext, params: &Params) -> AtomResult {
    let fields: Vec<String> = params
        .get("fields")
        .map(string_list)
        .transpose()?
        .unwrap_or_default();
    let rows = expect_rows(ctx.data(), "transform.select")?;

    let selected = rows
        .iter()
        .map(|row| match row {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(k, _)| fields.iter().any(|f| f == *k))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            other => other.clone(),
        })
        .collect();
    Ok(Some(Value::Array(selected)))
}

fn transform_rename(ctx: &mut dyn AtomContext, params: &Params) -> AtomResult {
    let mapping: Vec<(String, String)> = match params.get("mapping") {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
            .collect(),
        _ => params
            .iter()
            .filter(|(k, _)| !k.starts_with('_'))
            .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
            .collect(),
    };
    let rows = expect_rows(ctx.data(), "transform.rename")?;

    let renamed = rows
        .iter()
        .map(|row| match row {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let key = mapping
                            .iter()
                            .find(|(old, _)| old == k)
                            .map(|(_, new)| new.clone())
                            .unwrap_or_else(|| k.clone());
                        (key, v.clone())
                    })
                    .collect(),
            ),
            other => other.clone(),
        })
        .collect();
    Ok(Some(Value::Array(renamed)))
}

// Metrics

#[derive(Debug, Clone, Copy)]
enum Aggregate {
    Sum,
    Avg,
    Min,
    Max,
}

fn aggregate(ctx: &mut dyn AtomContext, params: &Params, kind: Aggregate) -> AtomResult {
    let field = params.get("field").and_then(Value::as_str);
    let values = extract_values(ctx.data(), field)?;
    let result = match kind {
        Aggregate::Sum => sum(&values),
        Aggregate::Avg => average(&values),
        Aggregate::Min => extreme(&values, Ordering::Less),
        Aggregate::Max => extreme(&values, Ordering::Greater),
    };
    Ok(Some(result))
}

fn metrics_count(ctx: &mut dyn AtomContext, _params: &Params) -> AtomResult {
    let count = match ctx.data() {
        Value::Array(rows) => rows.len(),
        other if truthy(other) => 1,
        _ => 0,
    };
    Ok(Some(json!(count)))
}

fn metrics_calculate(ctx: &mut dyn AtomContext, params: &Params) -> AtomResult {
    let metrics: Vec<String> = match params.get("metrics") {
        Some(value) if !value.is_null() => string_list(value)?,
        _ => DEFAULT_METRICS.iter().map(|m| m.to_string()).collect(),
    };
    let field = params.get("field").and_then(Value::as_str);
    ctx.log(
        &format!("Calculating metrics: {}", metrics.join(", ")),
        LogLevel::Debug,
    );

    let values = extract_values(ctx.data(), field)?;
    let mut result = Map::new();
    for metric in &metrics {
        let value = match metric.as_str() {
            "sum" => sum(&values),
            "avg" => average(&values),
            "count" => json!(values.len()),
            "min" => extreme(&values, Ordering::Less),
            "max" => extreme(&values, Ordering::Greater),
            other => return Err(AtomError::new(format!("unknown metric '{}'", other))),
        };
        result.insert(metric.clone(), value);
    }
    Ok(Some(Value::Object(result)))
}

/// Numeric values of `field` in each row, or the bare numbers of the list
fn extract_values(data: &Value, field: Option<&str>) -> Result<Vec<Number>, AtomError> {
    let Value::Array(rows) = data else {
        return Ok(Vec::new());
    };

    match field {
        Some(field) => rows
            .iter()
            .filter_map(Value::as_object)
            .map(|row| match row.get(field) {
                None | Some(Value::Null) => Ok(Number::from(0)),
                Some(Value::Number(n)) => Ok(n.clone()),
                Some(Value::String(s)) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .ok_or_else(|| {
                        AtomError::new(format!("field '{}' is not numeric: {:?}", field, s))
                    }),
                Some(other) => Err(AtomError::new(format!(
                    "field '{}' is not numeric: {}",
                    field, other
                ))),
            })
            .collect(),
        None => Ok(rows
            .iter()
            .filter_map(|v| match v {
                Value::Number(n) => Some(n.clone()),
                _ => None,
            })
            .collect()),
    }
}

/// Integer sum while every value is an integer, float otherwise
fn sum(values: &[Number]) -> Value {
    let integers: Option<i64> = values
        .iter()
        .try_fold(0i64, |acc, n| n.as_i64().and_then(|v| acc.checked_add(v)));
    match integers {
        Some(total) => json!(total),
        None => json!(values.iter().filter_map(Number::as_f64).sum::<f64>()),
    }
}

fn average(values: &[Number]) -> Value {
    if values.is_empty() {
        return json!(0);
    }
    let total: f64 = values.iter().filter_map(Number::as_f64).sum();
    json!(total / values.len() as f64)
}

fn extreme(values: &[Number], wanted: Ordering) -> Value {
    values
        .iter()
        .cloned()
        .reduce(|best, n| {
            let ordering = n
                .as_f64()
                .zip(best.as_f64())
                .and_then(|(a, b)| a.partial_cmp(&b));
            if ordering == Some(wanted) {
                n
            } else {
                best
            }
        })
        .map(Value::Number)
        .unwrap_or_else(|| json!(0))
}

// Helpers

fn expect_rows<'a>(data: &'a Value, atom: &str) -> Result<&'a Vec<Value>, AtomError> {
    data.as_array().ok_or_else(|| {
        AtomError::new(format!("{} expects a list, got {}", atom, type_name(data)))
    })
}

fn string_list(value: &Value) -> Result<Vec<String>, AtomError> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| AtomError::new(format!("expected a string, got {}", item)))
            })
            .collect(),
        other => Err(AtomError::new(format!(
            "expected a list of strings, got {}",
            type_name(other)
        ))),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

/// Ordering between comparable values of the same kind
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order for sorting: nulls, bools, numbers, strings, then containers
fn sort_order(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    compare(a, b).unwrap_or_else(|| rank(a).cmp(&rank(b)))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
