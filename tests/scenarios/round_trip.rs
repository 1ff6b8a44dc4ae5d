//! Test: Round Trip - DSL, JSON and YAML forms describe the same pipeline

use atom_pipeline::{parse, AtomType, PipelineBuilder, PipelineDefinition};
use serde_json::{json, Map};

const SALES: &str = r#"@pipeline "sales report":
  $year = 2024
  $regions = ["EU", "US"]
  data.load("sales", year=$year)
  | transform.filter(region__in=$regions, active=true)
  | metrics.calculate(["sum", "avg"], field="amount", scale=1.5)
  | report.generate(format="pdf", options={title: "Q4", pages: null})"#;

/// Test that formatting then re-parsing is lossless
#[test]
fn test_dsl_round_trip() {
    let pipeline = parse(SALES).unwrap();
    let text = pipeline.to_dsl();
    let reparsed = parse(&text).unwrap();

    assert_eq!(reparsed, pipeline);
    assert_eq!(reparsed.to_dsl(), text);
}

/// Test the normalized layout of formatted output
#[test]
fn test_formatted_layout() {
    let text = parse("data.load( 'x' )|metrics.count()").unwrap().to_dsl();

    assert_eq!(
        text,
        "@pipeline anonymous:\n  data.load(\"x\")\n  | metrics.count()"
    );
}

/// Test that the tree form survives JSON and YAML
#[test]
fn test_tree_round_trip() {
    let pipeline = parse(SALES).unwrap();

    let from_json = PipelineDefinition::from_json(&pipeline.to_json().unwrap()).unwrap();
    assert_eq!(from_json, pipeline);

    let from_yaml = PipelineDefinition::from_yaml(&pipeline.to_yaml().unwrap()).unwrap();
    assert_eq!(from_yaml.to_dsl(), pipeline.to_dsl());
}

/// Test that a built pipeline formats into parseable DSL
#[test]
fn test_builder_output_parses() {
    let mut params = Map::new();
    params.insert("_arg0".to_string(), json!("amount"));

    let built = PipelineBuilder::new()
        .name("built")
        .var("limit", json!(3))
        .atom(AtomType::Data, "load", Map::new())
        .atom(AtomType::Metrics, "sum", params)
        .build();

    let reparsed = parse(&built.to_dsl()).unwrap();
    assert_eq!(reparsed.name, "built");
    assert_eq!(reparsed.steps.len(), 2);
    assert_eq!(reparsed.steps[1].atom.params["_arg0"], json!("amount"));
    assert_eq!(reparsed.variables["limit"], json!(3));
}
