//! Read-only store of field mapping rules and required-field lists.
//!
//! Every accessor consults the configured tables first and falls back to the
//! built-in tables, so a missing configuration file only means defaults.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::config::FieldsConfig;
use crate::error::ConversionError;
use crate::fields::rules::{builtin_required_fields, builtin_rules, FieldMappingRule};

/// Required fields for one entity type, keeping the configured spelling.
#[derive(Debug, Clone)]
struct RequiredFields {
    entity_type: String,
    fields: Vec<String>,
}

/// One layer of rules and required-field lists.
#[derive(Debug, Clone, Default)]
struct FieldTables {
    rules: BTreeMap<String, FieldMappingRule>,
    /// Keyed by normalised (trimmed, lowercase) entity type.
    required: BTreeMap<String, RequiredFields>,
}

impl FieldTables {
    fn new(
        rules: BTreeMap<String, FieldMappingRule>,
        required: BTreeMap<String, Vec<String>>,
    ) -> Self {
        let required = required
            .into_iter()
            .map(|(entity_type, fields)| {
                let mut seen = BTreeSet::new();
                let fields = fields
                    .into_iter()
                    .filter(|f| seen.insert(f.clone()))
                    .collect();
                (
                    normalise_entity_type(&entity_type),
                    RequiredFields {
                        entity_type,
                        fields,
                    },
                )
            })
            .collect();

        Self { rules, required }
    }
}

fn normalise_entity_type(entity_type: &str) -> String {
    entity_type.trim().to_lowercase()
}

/// Field mapping configuration shared by every session.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct FieldConfigStore {
    configured: FieldTables,
    builtin: FieldTables,
}

impl Default for FieldConfigStore {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FieldConfigStore {
    /// Creates a store from the `fields` section of the configuration file.
    #[must_use]
    pub fn new(config: &FieldsConfig) -> Self {
        Self {
            configured: FieldTables::new(config.mappings.clone(), config.required.clone()),
            builtin: FieldTables::new(builtin_rules(), builtin_required_fields()),
        }
    }

    /// Creates a store that only knows the built-in tables.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(&FieldsConfig::default())
    }

    /// Returns the rule for a source field name.
    #[must_use]
    pub fn field_mapping(&self, field_name: &str) -> Option<&FieldMappingRule> {
        self.configured
            .rules
            .get(field_name)
            .or_else(|| self.builtin.rules.get(field_name))
    }

    /// Returns the canonical name a field is stored under.
    #[must_use]
    pub fn canonical_name<'a>(&'a self, field_name: &'a str) -> &'a str {
        self.field_mapping(field_name)
            .map_or(field_name, |rule| rule.canonical_name(field_name))
    }

    /// Returns the ordered, de-duplicated required fields of an entity type.
    ///
    /// Unknown or malformed entity types have no required fields.
    #[must_use]
    pub fn required_fields(&self, entity_type: &str) -> &[String] {
        let key = normalise_entity_type(entity_type);
        if key.is_empty() {
            return &[];
        }

        self.configured
            .required
            .get(&key)
            .or_else(|| self.builtin.required.get(&key))
            .map_or(&[] as &[String], |r| r.fields.as_slice())
    }

    /// Returns the allowed values of a field, or an empty slice.
    #[must_use]
    pub fn allowed_values(&self, field_name: &str) -> &[String] {
        self.field_mapping(field_name)
            .map_or(&[] as &[String], |rule| rule.allowed_values.as_slice())
    }

    /// Converts a raw value according to the field's rule.
    ///
    /// Fields without a rule are returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns a `ConversionError` if the value does not match the declared
    /// type or allowed values.
    pub fn convert_field_value(
        &self,
        field_name: &str,
        raw: &Value,
    ) -> Result<Value, ConversionError> {
        match self.field_mapping(field_name) {
            Some(rule) => rule.convert(field_name, raw),
            None => Ok(raw.clone()),
        }
    }

    /// Returns the help text of a field.
    #[must_use]
    pub fn field_help_text(&self, field_name: &str) -> Option<&str> {
        self.field_mapping(field_name)
            .and_then(|rule| rule.help.as_deref())
    }

    /// Returns every source name whose rule maps to `canonical`.
    #[must_use]
    pub fn source_names_for(&self, canonical: &str) -> Vec<&str> {
        self.field_names()
            .into_iter()
            .filter(|name| self.canonical_name(name) == canonical)
            .collect()
    }

    /// Returns all known source field names, sorted.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.configured
            .rules
            .keys()
            .chain(self.builtin.rules.keys())
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Returns all entity types with a required-field list.
    ///
    /// Configured spellings take precedence over built-in ones.
    #[must_use]
    pub fn entity_types(&self) -> Vec<&str> {
        let mut types: BTreeMap<&str, &str> = self
            .builtin
            .required
            .iter()
            .map(|(key, r)| (key.as_str(), r.entity_type.as_str()))
            .collect();
        for (key, r) in &self.configured.required {
            types.insert(key.as_str(), r.entity_type.as_str());
        }
        types.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldType;
    use serde_json::json;

    fn configured_store() -> FieldConfigStore {
        let config: FieldsConfig = serde_json::from_value(json!({
            "mappings": {
                "title": { "target": "Custom.Headline", "help": "Headline" },
                "risk": {
                    "target": "Custom.Risk",
                    "type": "enumeration",
                    "allowed_values": ["Low", "High"],
                    "default": "Low"
                }
            },
            "required": {
                "Task": ["title", "risk", "title"],
                "Change Request": ["risk"]
            }
        }))
        .unwrap();
        FieldConfigStore::new(&config)
    }

    #[test]
    fn builtin_store_knows_system_title() {
        let store = FieldConfigStore::builtin();
        let rule = store.field_mapping("title").unwrap();
        assert_eq!(rule.target.as_deref(), Some("System.Title"));
        assert_eq!(store.required_fields("Task"), ["title".to_string()]);
    }

    #[test]
    fn configured_rule_overrides_builtin() {
        let store = configured_store();
        assert_eq!(store.canonical_name("title"), "Custom.Headline");
        assert_eq!(store.field_help_text("title"), Some("Headline"));
    }

    #[test]
    fn missing_configured_rule_falls_back() {
        let store = configured_store();
        assert_eq!(store.canonical_name("priority"), "Microsoft.VSTS.Common.Priority");
        assert_eq!(store.allowed_values("priority").len(), 4);
    }

    #[test]
    fn required_fields_are_deduplicated_and_ordered() {
        let store = configured_store();
        assert_eq!(
            store.required_fields("task"),
            ["title".to_string(), "risk".to_string()]
        );
    }

    #[test]
    fn entity_type_lookup_is_case_insensitive() {
        let store = FieldConfigStore::builtin();
        assert_eq!(store.required_fields("  user story "), ["title".to_string()]);
    }

    #[test]
    fn unknown_or_malformed_entity_type_has_no_requirements() {
        let store = FieldConfigStore::builtin();
        assert!(store.required_fields("Spaceship").is_empty());
        assert!(store.required_fields("   ").is_empty());
    }

    #[test]
    fn unmapped_field_converts_to_itself() {
        let store = FieldConfigStore::builtin();
        let raw = json!({"nested": [1, 2]});
        assert_eq!(store.convert_field_value("Custom.Blob", &raw), Ok(raw));
    }

    #[test]
    fn convert_uses_rule() {
        let store = FieldConfigStore::builtin();
        assert_eq!(store.convert_field_value("priority", &json!("1")), Ok(json!(1)));
        let err = store
            .convert_field_value("priority", &json!("urgent"))
            .unwrap_err();
        assert_eq!(err.field(), "priority");
        assert_eq!(err.value(), &json!("urgent"));
    }

    #[test]
    fn allowed_values_empty_for_unknown_field() {
        let store = FieldConfigStore::builtin();
        assert!(store.allowed_values("nothing").is_empty());
        assert!(store.field_help_text("nothing").is_none());
    }

    #[test]
    fn source_names_for_canonical() {
        let store = FieldConfigStore::builtin();
        assert_eq!(store.source_names_for("System.Title"), vec!["title"]);
        assert!(store.source_names_for("Custom.Nothing").is_empty());
    }

    #[test]
    fn entity_types_merge_layers() {
        let store = configured_store();
        let types = store.entity_types();
        assert!(types.contains(&"Bug"));
        assert!(types.contains(&"Change Request"));
        assert!(types.contains(&"Task"));
    }

    #[test]
    fn field_names_are_sorted_and_unique() {
        let store = configured_store();
        let names = store.field_names();
        assert!(names.contains(&"risk"));
        assert_eq!(names.iter().filter(|n| **n == "title").count(), 1);
        assert!(names.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(
            store.field_mapping("risk").map(|r| r.field_type),
            Some(FieldType::Enumeration)
        );
    }
}
