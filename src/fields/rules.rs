//! Field mapping rules, value conversion, and the built-in default tables.
//!
//! The built-in tables follow the Azure DevOps Agile/CMMI process templates so
//! the server is usable without any configuration file.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::ConversionError;

/// The value type a field is converted to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Free text. Scalars are stringified; arrays of strings are joined with `"; "`.
    #[default]
    String,
    /// Signed 64-bit integer.
    #[serde(alias = "int")]
    Integer,
    /// Floating point number.
    #[serde(alias = "float", alias = "number")]
    Double,
    /// Boolean, accepting `true/false`, `yes/no` and `1/0`.
    #[serde(alias = "bool")]
    Boolean,
    /// One of the rule's allowed values.
    #[serde(alias = "enum")]
    Enumeration,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Enumeration => "enumeration",
        };
        f.write_str(name)
    }
}

impl FieldType {
    /// Converts a non-null raw value, returning `None` on a type mismatch.
    #[must_use]
    pub fn convert(self, raw: &Value) -> Option<Value> {
        match self {
            Self::String => match raw {
                Value::String(s) => Some(Value::String(s.clone())),
                Value::Number(n) => Some(Value::String(n.to_string())),
                Value::Bool(b) => Some(Value::String(b.to_string())),
                Value::Array(items) => items
                    .iter()
                    .map(Value::as_str)
                    .collect::<Option<Vec<_>>>()
                    .map(|parts| Value::String(parts.join("; "))),
                Value::Null | Value::Object(_) => None,
            },
            Self::Integer => match raw {
                Value::Number(n) => n.as_i64().or_else(|| whole_f64(n)).map(Value::from),
                Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
                _ => None,
            },
            Self::Double => match raw {
                Value::Number(n) => n.as_f64().and_then(Number::from_f64).map(Value::Number),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number),
                _ => None,
            },
            Self::Boolean => match raw {
                Value::Bool(b) => Some(Value::Bool(*b)),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Some(Value::Bool(false)),
                    Some(1) => Some(Value::Bool(true)),
                    _ => None,
                },
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" => Some(Value::Bool(true)),
                    "false" | "no" | "0" => Some(Value::Bool(false)),
                    _ => None,
                },
                _ => None,
            },
            Self::Enumeration => match raw {
                Value::String(s) => Some(Value::String(s.clone())),
                Value::Number(n) => Some(Value::String(n.to_string())),
                _ => None,
            },
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::float_cmp)]
fn whole_f64(n: &Number) -> Option<i64> {
    let f = n.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Maps one source field name to its canonical field and value type.
///
/// The source name is the key the rule is stored under.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldMappingRule {
    /// Canonical field name. `None` keeps the source name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Declared type for conversion.
    #[serde(default, rename = "type")]
    pub field_type: FieldType,

    /// Value injected when the field is required but missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Values the field accepts. Empty means unrestricted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,

    /// Help text shown to clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl FieldMappingRule {
    /// Creates a string rule renaming to `target`.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: Some(target.into()),
            ..Self::default()
        }
    }

    /// Sets the declared type.
    #[must_use]
    pub const fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Sets the allowed values.
    #[must_use]
    pub fn with_allowed_values(mut self, values: &[&str]) -> Self {
        self.allowed_values = values.iter().map(|v| (*v).to_string()).collect();
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Returns the canonical name for a field stored under `source`.
    #[must_use]
    pub fn canonical_name<'a>(&'a self, source: &'a str) -> &'a str {
        self.target.as_deref().unwrap_or(source)
    }

    /// Returns the default value, treating an explicit `null` as absent.
    #[must_use]
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref().filter(|v| !v.is_null())
    }

    /// Converts `raw` to the declared type and checks the allowed values.
    ///
    /// `null` converts to `null` regardless of type.
    ///
    /// # Errors
    ///
    /// Returns a `ConversionError` naming `field` and the raw value when the
    /// value cannot be converted or is not allowed.
    pub fn convert(&self, field: &str, raw: &Value) -> Result<Value, ConversionError> {
        if raw.is_null() {
            return Ok(Value::Null);
        }

        let converted =
            self.field_type
                .convert(raw)
                .ok_or_else(|| ConversionError::TypeMismatch {
                    field: field.to_string(),
                    value: raw.clone(),
                    expected: self.field_type,
                })?;

        if self.allowed_values.is_empty() {
            return Ok(converted);
        }

        let text = match &converted {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let matched = self
            .allowed_values
            .iter()
            .find(|allowed| allowed.eq_ignore_ascii_case(&text))
            .ok_or_else(|| ConversionError::NotAllowed {
                field: field.to_string(),
                value: raw.clone(),
                allowed: self.allowed_values.clone(),
            })?;

        match self.field_type {
            FieldType::String | FieldType::Enumeration => Ok(Value::String(matched.clone())),
            _ => Ok(converted),
        }
    }

    /// Checks the rule for internal contradictions.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self, source: &str) -> Result<(), String> {
        if source.trim().is_empty() {
            return Err("field mapping with an empty source name".to_string());
        }
        if self.target.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(format!("field '{source}' has an empty target"));
        }
        if self.field_type == FieldType::Enumeration && self.allowed_values.is_empty() {
            return Err(format!(
                "field '{source}' is an enumeration without allowed_values"
            ));
        }
        if let Some(default) = self.default_value() {
            self.convert(source, default)
                .map_err(|e| format!("invalid default value: {e}"))?;
        }
        Ok(())
    }
}

/// Returns the built-in field mapping table, keyed by source name.
#[must_use]
pub fn builtin_rules() -> BTreeMap<String, FieldMappingRule> {
    let rules = [
        (
            "title",
            FieldMappingRule::new("System.Title").with_help("Short summary of the work item."),
        ),
        (
            "description",
            FieldMappingRule::new("System.Description")
                .with_help("Detailed description. HTML is accepted."),
        ),
        (
            "state",
            FieldMappingRule::new("System.State")
                .with_type(FieldType::Enumeration)
                .with_allowed_values(&["New", "Active", "Resolved", "Closed", "Removed"])
                .with_help("Workflow state."),
        ),
        ("reason", FieldMappingRule::new("System.Reason")),
        (
            "assigned_to",
            FieldMappingRule::new("System.AssignedTo")
                .with_help("Display name or e-mail address of the assignee."),
        ),
        (
            "area_path",
            FieldMappingRule::new("System.AreaPath")
                .with_help("Area path, e.g. 'Project\\Team'."),
        ),
        (
            "iteration_path",
            FieldMappingRule::new("System.IterationPath")
                .with_help("Iteration path, e.g. 'Project\\Sprint 1'."),
        ),
        (
            "tags",
            FieldMappingRule::new("System.Tags")
                .with_help("Tags separated by semicolons, or an array of strings."),
        ),
        (
            "priority",
            FieldMappingRule::new("Microsoft.VSTS.Common.Priority")
                .with_type(FieldType::Integer)
                .with_default(2)
                .with_allowed_values(&["1", "2", "3", "4"])
                .with_help("1 (highest) to 4 (lowest)."),
        ),
        (
            "severity",
            FieldMappingRule::new("Microsoft.VSTS.Common.Severity")
                .with_type(FieldType::Enumeration)
                .with_default("3 - Medium")
                .with_allowed_values(&["1 - Critical", "2 - High", "3 - Medium", "4 - Low"])
                .with_help("Impact of a bug on the product."),
        ),
        (
            "story_points",
            FieldMappingRule::new("Microsoft.VSTS.Scheduling.StoryPoints")
                .with_type(FieldType::Double),
        ),
        (
            "original_estimate",
            FieldMappingRule::new("Microsoft.VSTS.Scheduling.OriginalEstimate")
                .with_type(FieldType::Double)
                .with_help("Estimate in hours."),
        ),
        (
            "remaining_work",
            FieldMappingRule::new("Microsoft.VSTS.Scheduling.RemainingWork")
                .with_type(FieldType::Double)
                .with_help("Remaining work in hours."),
        ),
        (
            "completed_work",
            FieldMappingRule::new("Microsoft.VSTS.Scheduling.CompletedWork")
                .with_type(FieldType::Double)
                .with_help("Completed work in hours."),
        ),
        (
            "acceptance_criteria",
            FieldMappingRule::new("Microsoft.VSTS.Common.AcceptanceCriteria"),
        ),
        (
            "repro_steps",
            FieldMappingRule::new("Microsoft.VSTS.TCM.ReproSteps")
                .with_help("Steps to reproduce a bug."),
        ),
        (
            "blocked",
            FieldMappingRule::new("Microsoft.VSTS.CMMI.Blocked")
                .with_type(FieldType::Enumeration)
                .with_allowed_values(&["Yes", "No"]),
        ),
    ];

    rules
        .into_iter()
        .map(|(source, rule)| (source.to_string(), rule))
        .collect()
}

/// Returns the built-in required-field lists, keyed by entity type.
#[must_use]
pub fn builtin_required_fields() -> BTreeMap<String, Vec<String>> {
    let required: [(&str, &[&str]); 6] = [
        ("Task", &["title"]),
        ("Bug", &["title", "severity"]),
        ("User Story", &["title"]),
        ("Feature", &["title"]),
        ("Epic", &["title"]),
        ("Issue", &["title"]),
    ];

    required
        .into_iter()
        .map(|(entity, fields)| {
            (
                entity.to_string(),
                fields.iter().map(|f| (*f).to_string()).collect(),
            )
        })
        .collect()
}
