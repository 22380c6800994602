//! Applies field mapping rules to caller-supplied field maps.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::FieldMappingError;
use crate::fields::store::FieldConfigStore;

/// A field map keyed by field name.
pub type FieldMap = Map<String, Value>;

/// Outcome of a required-field check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// One human-readable message per missing field, in required-list order.
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// Returns `true` when no required field is missing.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Maps and validates field maps against a borrowed [`FieldConfigStore`].
#[derive(Debug, Clone, Copy)]
pub struct FieldMappingEngine<'a> {
    store: &'a FieldConfigStore,
}

impl<'a> FieldMappingEngine<'a> {
    /// Creates an engine over `store`.
    #[must_use]
    pub const fn new(store: &'a FieldConfigStore) -> Self {
        Self { store }
    }

    /// Renames and converts `input`, then fills in defaults for required fields.
    ///
    /// Fields without a rule pass through unchanged. A required field that is
    /// missing or `null` after mapping receives its rule's default, if any.
    ///
    /// # Errors
    ///
    /// Returns every conversion failure at once.
    pub fn process_fields(
        &self,
        entity_type: &str,
        input: &FieldMap,
    ) -> Result<FieldMap, FieldMappingError> {
        let mut output = FieldMap::new();
        let mut explicit = HashSet::new();
        let mut errors = Vec::new();

        for (name, raw) in input {
            let Some(rule) = self.store.field_mapping(name) else {
                explicit.insert(name.as_str());
                output.insert(name.clone(), raw.clone());
                continue;
            };

            let value = match rule.convert(name, raw) {
                Ok(value) => value,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };

            // A key spelled canonically wins over its aliases; among aliases a
            // null never replaces a value.
            let canonical = rule.canonical_name(name);
            if canonical == name {
                explicit.insert(canonical);
            } else if explicit.contains(canonical)
                || (value.is_null() && output.get(canonical).is_some_and(|v| !v.is_null()))
            {
                continue;
            }
            output.insert(canonical.to_string(), value);
        }

        if !errors.is_empty() {
            return Err(FieldMappingError { errors });
        }

        for required in self.store.required_fields(entity_type) {
            let Some(rule) = self.store.field_mapping(required) else {
                continue;
            };
            let Some(default) = rule.default_value() else {
                continue;
            };

            let canonical = rule.canonical_name(required);
            if output.get(canonical).map_or(true, Value::is_null) {
                // Config validation guarantees defaults convert.
                let value = rule.convert(required, default).unwrap_or_else(|_| default.clone());
                tracing::debug!(field = canonical, entity_type, "injecting default value");
                output.insert(canonical.to_string(), value);
            }
        }

        Ok(output)
    }

    /// Checks that every required field of `entity_type` has a non-null value.
    ///
    /// A field counts as present under its canonical name or under any source
    /// name mapped to it, so raw and processed maps validate the same way.
    #[must_use]
    pub fn validate_required_fields(
        &self,
        entity_type: &str,
        fields: &FieldMap,
    ) -> ValidationResult {
        let mut result = ValidationResult::default();

        for required in self.store.required_fields(entity_type) {
            let canonical = self.store.canonical_name(required);
            let present = std::iter::once(canonical)
                .chain(self.store.source_names_for(canonical))
                .any(|name| fields.get(name).is_some_and(|v| !v.is_null()));

            if present {
                continue;
            }

            let message = if canonical == required {
                format!("missing required field '{canonical}' for '{entity_type}'")
            } else {
                format!("missing required field '{canonical}' ({required}) for '{entity_type}'")
            };
            result.errors.push(message);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldsConfig;
    use serde_json::json;

    fn fields(value: Value) -> FieldMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    fn store_with_task_requiring_system_title() -> FieldConfigStore {
        let config: FieldsConfig = serde_json::from_value(json!({
            "required": { "Task": ["System.Title"] }
        }))
        .unwrap();
        FieldConfigStore::new(&config)
    }

    #[test]
    fn title_is_renamed_to_system_title() {
        let store = store_with_task_requiring_system_title();
        let engine = FieldMappingEngine::new(&store);

        let output = engine
            .process_fields("Task", &fields(json!({"title": "Fix bug"})))
            .unwrap();
        assert_eq!(Value::Object(output.clone()), json!({"System.Title": "Fix bug"}));

        assert!(engine.validate_required_fields("Task", &output).is_valid());
    }

    #[test]
    fn empty_task_reports_one_missing_field() {
        let store = store_with_task_requiring_system_title();
        let engine = FieldMappingEngine::new(&store);

        let result = engine.validate_required_fields("Task", &FieldMap::new());
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("System.Title"));
        assert!(!result.is_valid());
    }

    #[test]
    fn unmapped_fields_pass_through() {
        let store = FieldConfigStore::builtin();
        let engine = FieldMappingEngine::new(&store);

        let input = fields(json!({"Custom.Thing": {"a": 1}, "title": "x"}));
        let output = engine.process_fields("Task", &input).unwrap();
        assert_eq!(output["Custom.Thing"], json!({"a": 1}));
        assert_eq!(output["System.Title"], json!("x"));
    }

    #[test]
    fn canonical_maps_are_unchanged() {
        let store = FieldConfigStore::builtin();
        let engine = FieldMappingEngine::new(&store);

        let input = fields(json!({
            "System.Title": "Already canonical",
            "Microsoft.VSTS.Common.Priority": 1
        }));
        let output = engine.process_fields("Task", &input).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn defaults_fill_missing_required_fields() {
        let store = FieldConfigStore::builtin();
        let engine = FieldMappingEngine::new(&store);

        let output = engine
            .process_fields("Bug", &fields(json!({"title": "Crash"})))
            .unwrap();
        assert_eq!(output["Microsoft.VSTS.Common.Severity"], json!("3 - Medium"));
        assert!(engine.validate_required_fields("Bug", &output).is_valid());
    }

    #[test]
    fn defaults_replace_null_required_values() {
        let store = FieldConfigStore::builtin();
        let engine = FieldMappingEngine::new(&store);

        let output = engine
            .process_fields("Bug", &fields(json!({"title": "Crash", "severity": null})))
            .unwrap();
        assert_eq!(output["Microsoft.VSTS.Common.Severity"], json!("3 - Medium"));
    }

    #[test]
    fn required_field_without_default_is_not_injected() {
        let store = FieldConfigStore::builtin();
        let engine = FieldMappingEngine::new(&store);

        let output = engine.process_fields("Task", &FieldMap::new()).unwrap();
        assert!(output.is_empty());
        assert_eq!(engine.validate_required_fields("Task", &output).errors.len(), 1);
    }

    #[test]
    fn conversion_errors_are_aggregated() {
        let store = FieldConfigStore::builtin();
        let engine = FieldMappingEngine::new(&store);

        let input = fields(json!({
            "priority": "urgent",
            "state": "Open",
            "title": "ok"
        }));
        let err = engine.process_fields("Task", &input).unwrap_err();
        let failed: Vec<_> = err.errors.iter().map(|e| e.field().to_string()).collect();
        assert_eq!(failed, vec!["priority", "state"]);
    }

    #[test]
    fn validation_agrees_before_and_after_processing() {
        let store = FieldConfigStore::builtin();
        let engine = FieldMappingEngine::new(&store);

        for input in [
            json!({"title": "A", "severity": "2 - High"}),
            json!({"title": "A"}),
            json!({"severity": "1 - Critical"}),
            json!({}),
        ] {
            let raw = fields(input);
            let before = engine.validate_required_fields("Bug", &raw);
            let processed = engine.process_fields("Bug", &raw).unwrap();
            let after = engine.validate_required_fields("Bug", &processed);

            // Defaults can only remove errors.
            assert!(after.errors.iter().all(|e| before.errors.contains(e)));
            if !raw.is_empty() && raw.contains_key("severity") {
                assert_eq!(before, after);
            }
        }
    }

    #[test]
    fn null_required_value_is_reported() {
        let store = FieldConfigStore::builtin();
        let engine = FieldMappingEngine::new(&store);

        let result =
            engine.validate_required_fields("Task", &fields(json!({"System.Title": null})));
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("(title)"));
    }

    #[test]
    fn unknown_entity_type_always_validates() {
        let store = FieldConfigStore::builtin();
        let engine = FieldMappingEngine::new(&store);

        assert!(engine.validate_required_fields("", &FieldMap::new()).is_valid());
        assert!(engine
            .validate_required_fields("No Such Type", &FieldMap::new())
            .is_valid());
    }

    #[test]
    fn processing_then_validating_never_misses_defaulted_fields() {
        let store = FieldConfigStore::builtin();
        let engine = FieldMappingEngine::new(&store);

        for entity_type in store.entity_types() {
            let output = engine.process_fields(entity_type, &FieldMap::new()).unwrap();
            let result = engine.validate_required_fields(entity_type, &output);
            for required in store.required_fields(entity_type) {
                let has_default = store
                    .field_mapping(required)
                    .and_then(|r| r.default_value())
                    .is_some();
                if has_default {
                    let canonical = store.canonical_name(required);
                    assert!(!result.errors.iter().any(|e| e.contains(canonical)));
                }
            }
        }
    }

    #[test]
    fn null_alias_does_not_erase_canonical_value() {
        let store = FieldConfigStore::builtin();
        let engine = FieldMappingEngine::new(&store);

        let raw = fields(json!({"System.Title": "Fix bug", "title": null}));
        let before = engine.validate_required_fields("Task", &raw);
        let processed = engine.process_fields("Task", &raw).unwrap();
        let after = engine.validate_required_fields("Task", &processed);

        assert_eq!(processed["System.Title"], json!("Fix bug"));
        assert_eq!(before, after);
        assert!(after.is_valid());
    }

    #[test]
    fn canonical_key_wins_over_alias() {
        let store = FieldConfigStore::builtin();
        let engine = FieldMappingEngine::new(&store);

        let output = engine
            .process_fields("Task", &fields(json!({"System.Title": "A", "title": "B"})))
            .unwrap();
        assert_eq!(Value::Object(output), json!({"System.Title": "A"}));
    }

    #[test]
    fn injected_defaults_are_converted() {
        let config: FieldsConfig = serde_json::from_value(json!({
            "mappings": {
                "effort": {"target": "Custom.Effort", "type": "integer", "default": "3"},
                "risk": {
                    "target": "Custom.Risk",
                    "type": "enumeration",
                    "allowed_values": ["Low", "High"],
                    "default": "low"
                }
            },
            "required": {"Task": ["effort", "risk"]}
        }))
        .unwrap();
        config.validate().unwrap();
        let store = FieldConfigStore::new(&config);
        let engine = FieldMappingEngine::new(&store);

        let explicit = engine
            .process_fields("Task", &fields(json!({"effort": "3", "risk": "low"})))
            .unwrap();
        let defaulted = engine.process_fields("Task", &FieldMap::new()).unwrap();

        assert_eq!(defaulted["Custom.Effort"], json!(3));
        assert_eq!(defaulted["Custom.Risk"], json!("Low"));
        assert_eq!(explicit, defaulted);
    }
}
