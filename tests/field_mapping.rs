//! Integration tests for field mapping driven by a configuration file.

use std::io::Write;

use serde_json::{json, Map, Value};
use tempfile::NamedTempFile;

use azure_devops_mcp::config::load_config;
use azure_devops_mcp::error::ConfigError;
use azure_devops_mcp::fields::{FieldConfigStore, FieldMappingEngine};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

fn store_from(contents: &str) -> FieldConfigStore {
    let file = write_config(contents);
    let config = load_config(Some(file.path())).expect("valid configuration");
    FieldConfigStore::new(&config.fields)
}

#[test]
fn test_task_scenario_from_configuration_file() {
    let store = store_from(
        r#"{
            "fields": {
                "mappings": {"title": {"target": "System.Title"}},
                "required": {"Task": ["System.Title"]}
            }
        }"#,
    );
    let engine = FieldMappingEngine::new(&store);

    let processed = engine
        .process_fields("Task", &fields(json!({"title": "Fix bug"})))
        .unwrap();
    assert_eq!(Value::Object(processed.clone()), json!({"System.Title": "Fix bug"}));
    assert!(engine.validate_required_fields("Task", &processed).is_valid());

    let empty = engine.validate_required_fields("Task", &Map::new());
    assert_eq!(empty.errors.len(), 1);
    assert!(empty.errors[0].contains("System.Title"));
}

#[test]
fn test_configured_rule_overrides_builtin() {
    let store = store_from(
        r#"{
            "fields": {
                "mappings": {
                    "priority": {
                        "target": "Custom.Priority",
                        "type": "enumeration",
                        "allowed_values": ["Low", "High"],
                        "default": "Low"
                    }
                },
                "required": {"bug": ["title", "priority"]}
            }
        }"#,
    );
    let engine = FieldMappingEngine::new(&store);

    let processed = engine
        .process_fields("Bug", &fields(json!({"title": "Broken", "priority": "high"})))
        .unwrap();
    assert_eq!(processed["Custom.Priority"], json!("High"));

    // Configured required list replaces the built-in one, so no severity default
    let defaulted = engine
        .process_fields("BUG", &fields(json!({"title": "Broken"})))
        .unwrap();
    assert_eq!(defaulted["Custom.Priority"], json!("Low"));
    assert!(!defaulted.contains_key("Microsoft.VSTS.Common.Severity"));

    // Rules not overridden still come from the built-in table
    assert_eq!(store.canonical_name("state"), "System.State");
}

#[test]
fn test_contradictory_rule_is_rejected_at_load() {
    let file = write_config(
        r#"{
            "fields": {
                "mappings": {
                    "size": {"type": "integer", "allowed_values": ["1", "2"], "default": 3}
                }
            }
        }"#,
    );
    let err = load_config(Some(file.path())).unwrap_err();
    assert!(matches!(err, ConfigError::ValidationError { .. }));
}

#[test]
fn test_unknown_rule_key_is_a_parse_error() {
    let file = write_config(r#"{"fields": {"mappings": {"x": {"kind": "string"}}}}"#);
    let err = load_config(Some(file.path())).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError { .. }));
}

#[test]
fn test_all_conversion_errors_reported_together() {
    let store = FieldConfigStore::builtin();
    let engine = FieldMappingEngine::new(&store);

    let err = engine
        .process_fields(
            "Task",
            &fields(json!({
                "priority": "soon",
                "story_points": "lots",
                "state": "Dreaming",
                "title": "ok"
            })),
        )
        .unwrap_err();

    let mut failed: Vec<_> = err.errors.iter().map(|e| e.field().to_string()).collect();
    failed.sort();
    assert_eq!(failed, vec!["priority", "state", "story_points"]);
}
