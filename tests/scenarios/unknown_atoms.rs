//! Test: Unknown Atoms - module fallback and missing handlers

use crate::helpers::*;
use atom_pipeline::{
    AtomType, DslError, ErrorKind, ErrorPolicy, ExecutionContext, Parser, ParserConfig,
};

/// Test that an unregistered (type, action) fails even under skip
#[test]
fn test_unregistered_atom_is_fatal() {
    let pipeline = with_policy("data.load() | forecast.arima(periods=3)", 1, ErrorPolicy::Skip);
    let run = run_with(TestRegistry::new(), &pipeline, ExecutionContext::new(), Vec::new());

    assert_failed(&run);
    assert_eq!(
        run.result.as_ref().unwrap_err().to_string(),
        "Unknown atom: forecast.arima"
    );
    assert_eq!(run.ctx.errors[0].kind, ErrorKind::UnknownAtom);
    assert_eq!(run.ctx.errors[0].step, "forecast.arima(periods=3)");
}

/// Test that an unknown module name falls back to data by default
#[test]
fn test_unknown_module_falls_back() {
    let pipeline = atom_pipeline::parse("warehouse.load()").unwrap();
    assert_eq!(pipeline.steps[0].atom.atom_type, AtomType::Data);

    let run = run_dsl("warehouse.load()");
    assert_completed(&run);
    assert_call_order(&run, &["data.load"]);
}

/// Test that strict parsing rejects unknown module names
#[test]
fn test_strict_parser_rejects_unknown_module() {
    let parser = Parser::with_config(ParserConfig::strict());
    let err = parser.parse("data.load() | warehouse.load()").unwrap_err();

    match err {
        DslError::UnknownAtomType { name, line, column } => {
            assert_eq!(name, "warehouse");
            assert_eq!((line, column), (1, 15));
        }
        other => panic!("unexpected error {:?}", other),
    }
}
