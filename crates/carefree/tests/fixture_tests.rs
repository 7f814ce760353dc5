//! Integration tests driven by the JSON cases in tests/fixtures/*.json

use carefree::{Carefree, CarefreeError, EngineConfig, MemoryValues, Value};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct TestSuite {
    description: String,
    tests: Vec<TestCase>,
}

#[derive(Debug, Deserialize)]
struct TestCase {
    name: String,
    template: String,
    #[serde(default)]
    data: serde_json::Value,
    /// Records served as both list and single provider, by provider name.
    #[serde(default)]
    providers: IndexMap<String, serde_json::Value>,
    /// Named values served as a value provider, by provider name.
    #[serde(default)]
    values: IndexMap<String, serde_json::Value>,
    /// TOML engine configuration.
    #[serde(default)]
    config: Option<String>,
    #[serde(default)]
    expected: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn get_fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn load_test_suite(filename: &str) -> TestSuite {
    let path = get_fixtures_dir().join(filename);
    let content = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));
    serde_json::from_str(&content).unwrap_or_else(|e| panic!("Failed to parse {filename}: {e}"))
}

fn engine_for(case: &TestCase) -> Carefree {
    let config = match &case.config {
        Some(source) => EngineConfig::from_toml_str(source)
            .unwrap_or_else(|e| panic!("Test '{}' has a bad config: {e}", case.name)),
        None => EngineConfig::default(),
    };
    let mut engine = Carefree::with_config(config).unwrap();

    for (name, records) in &case.providers {
        let records = match Value::from(records.clone()) {
            Value::Array(items) => items,
            other => vec![other],
        };
        engine.providers_mut().register_records(name.as_str(), records);
    }
    for (name, values) in &case.values {
        engine
            .providers_mut()
            .register_value(name.as_str(), MemoryValues::from_json(values.clone()));
    }
    engine
}

fn run_test_case(case: &TestCase) {
    let result = engine_for(case).render_str(&case.template, case.data.clone());

    if let Some(expected) = &case.expected {
        match result {
            Ok(output) => assert_eq!(
                &output, expected,
                "Test '{}' failed: expected '{}', got '{}'",
                case.name, expected, output
            ),
            Err(e) => panic!(
                "Test '{}' should succeed with '{}', but got error: {:?}",
                case.name, expected, e
            ),
        }
    } else if let Some(error_type) = &case.error {
        match result {
            Ok(output) => panic!(
                "Test '{}' should fail with {}, but succeeded with '{}'",
                case.name, error_type, output
            ),
            Err(e) => assert!(
                error_type_matches(&e, error_type),
                "Test '{}' expected error type '{}', got '{:?}'",
                case.name,
                error_type,
                e
            ),
        }
    } else {
        panic!("Test '{}' has neither 'expected' nor 'error'", case.name);
    }
}

fn error_type_matches(e: &CarefreeError, expected: &str) -> bool {
    use CarefreeError::*;
    matches!(
        (e, expected),
        (Syntax(_), "SyntaxError")
            | (Grammar { .. }, "GrammarError")
            | (Provider { .. }, "ProviderError")
            | (Type { .. }, "TypeError")
            | (Config(_), "ConfigError")
    )
}

fn run_test_suite(filename: &str, skip_tests: &[&str]) {
    let suite = load_test_suite(filename);
    let mut passed = 0;
    let mut skipped = 0;

    for case in &suite.tests {
        if skip_tests.contains(&case.name.as_str()) {
            skipped += 1;
            continue;
        }
        run_test_case(case);
        passed += 1;
    }

    eprintln!(
        "{} ({}): {} tests passed, {} skipped",
        filename, suite.description, passed, skipped
    );
}

#[test]
fn test_output() {
    run_test_suite("output.json", &[]);
}

#[test]
fn test_lists() {
    run_test_suite("lists.json", &[]);
}

#[test]
fn test_single_and_value() {
    run_test_suite("single_value.json", &[]);
}

#[test]
fn test_control() {
    run_test_suite("control.json", &[]);
}

#[test]
fn test_paging() {
    run_test_suite("paging.json", &[]);
}

#[test]
fn test_errors() {
    run_test_suite("errors.json", &[]);
}
