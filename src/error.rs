//! Error types for azure-devops-mcp.
//!
//! Configuration and registry errors are fatal at startup. Conversion errors
//! are produced per request by the field-mapping engine and end up as
//! tool-level failures, never as protocol faults.

use std::fmt;
use std::path::PathBuf;

use serde_json::Value;
use thiserror::Error;

use crate::fields::FieldType;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// A single field value that could not be converted to its declared type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// The raw value cannot be represented as the declared type.
    #[error("field '{field}': cannot convert {value} to {expected}")]
    TypeMismatch {
        /// Source field name.
        field: String,
        /// The offending raw value.
        value: Value,
        /// The type declared by the mapping rule.
        expected: FieldType,
    },

    /// The value converted but is not one of the allowed values.
    #[error("field '{field}': {value} is not one of [{}]", allowed.join(", "))]
    NotAllowed {
        /// Source field name.
        field: String,
        /// The offending raw value.
        value: Value,
        /// Allowed values for the field.
        allowed: Vec<String>,
    },
}

impl ConversionError {
    /// Returns the source field name the error refers to.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::TypeMismatch { field, .. } | Self::NotAllowed { field, .. } => field,
        }
    }

    /// Returns the raw value that failed conversion.
    #[must_use]
    pub const fn value(&self) -> &Value {
        match self {
            Self::TypeMismatch { value, .. } | Self::NotAllowed { value, .. } => value,
        }
    }
}

/// Every conversion failure from one `process_fields` call.
#[derive(Error, Debug, Clone, PartialEq)]
pub struct FieldMappingError {
    /// The individual failures, in input order.
    pub errors: Vec<ConversionError>,
}

impl fmt::Display for FieldMappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field(s) failed conversion", self.errors.len())?;
        for error in &self.errors {
            write!(f, "; {error}")?;
        }
        Ok(())
    }
}

/// Errors raised while assembling the capability registry at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two tools declared the same name.
    #[error("duplicate tool name: {name}")]
    DuplicateTool {
        /// The conflicting name.
        name: String,
    },

    /// Two prompts declared the same name.
    #[error("duplicate prompt name: {name}")]
    DuplicatePrompt {
        /// The conflicting name.
        name: String,
    },

    /// A handler declared an empty name.
    #[error("capability names cannot be empty")]
    EmptyName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let error = ConfigError::NotFound {
            path: PathBuf::from("/path/to/config.json"),
        };
        let msg = error.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("config.json"));
    }

    #[test]
    fn validation_error_display() {
        let error = ConfigError::ValidationError {
            message: "invalid setting".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("invalid setting"));
    }

    #[test]
    fn conversion_error_names_field_and_value() {
        let error = ConversionError::TypeMismatch {
            field: "priority".to_string(),
            value: Value::String("high".to_string()),
            expected: FieldType::Integer,
        };
        let msg = error.to_string();
        assert!(msg.contains("priority"));
        assert!(msg.contains("\"high\""));
        assert!(msg.contains("integer"));
        assert_eq!(error.field(), "priority");
    }

    #[test]
    fn field_mapping_error_lists_every_failure() {
        let error = FieldMappingError {
            errors: vec![
                ConversionError::TypeMismatch {
                    field: "priority".to_string(),
                    value: Value::Bool(true),
                    expected: FieldType::Integer,
                },
                ConversionError::NotAllowed {
                    field: "state".to_string(),
                    value: Value::String("Open".to_string()),
                    allowed: vec!["New".to_string(), "Active".to_string()],
                },
            ],
        };
        let msg = error.to_string();
        assert!(msg.starts_with("2 field(s)"));
        assert!(msg.contains("priority"));
        assert!(msg.contains("New, Active"));
    }

    #[test]
    fn registry_error_display() {
        let error = RegistryError::DuplicateTool {
            name: "describe_field".to_string(),
        };
        assert_eq!(error.to_string(), "duplicate tool name: describe_field");
    }
}
