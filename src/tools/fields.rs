//! Tools that expose the field mapping engine directly.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::fields::{FieldConfigStore, FieldMap, FieldMappingEngine};
use crate::mcp::handler::{complete_from, HandlerError, ToolCallResult, ToolHandler};

/// Arguments shared by the tools that operate on a whole field map.
#[derive(Debug, Deserialize)]
pub(crate) struct WorkItemArgs {
    pub work_item_type: String,
    #[serde(default)]
    pub fields: FieldMap,
}

#[derive(Debug, Deserialize)]
struct FieldNameArgs {
    field_name: String,
}

#[derive(Debug, Deserialize)]
struct WorkItemTypeArgs {
    work_item_type: String,
}

/// Input schema for `{work_item_type, fields}` tools.
pub(crate) fn work_item_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "work_item_type": {
                "type": "string",
                "description": "Work item type, e.g. 'Bug' or 'User Story' (case-insensitive)"
            },
            "fields": {
                "type": "object",
                "description": "Field values keyed by friendly or reference name",
                "additionalProperties": true
            }
        },
        "required": ["work_item_type", "fields"]
    })
}

/// Completes the argument names every field tool understands.
pub(crate) fn complete_field_argument(
    store: &FieldConfigStore,
    argument: &str,
    value: &str,
) -> Option<Vec<String>> {
    match argument {
        "work_item_type" => Some(complete_from(store.entity_types(), value)),
        "field_name" => Some(complete_from(store.field_names(), value)),
        _ => None,
    }
}

/// `map_work_item_fields`: renames, converts and fills defaults.
pub struct MapFieldsTool {
    store: Arc<FieldConfigStore>,
}

impl MapFieldsTool {
    /// Creates the tool over a shared store.
    #[must_use]
    pub const fn new(store: Arc<FieldConfigStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for MapFieldsTool {
    fn name(&self) -> &str {
        "map_work_item_fields"
    }

    fn description(&self) -> &str {
        "Map friendly field names to Azure DevOps reference names, convert values to their \
         declared types, and fill defaults for required fields. Reports any required fields \
         that are still missing."
    }

    fn input_schema(&self) -> Value {
        work_item_schema()
    }

    async fn call(&self, arguments: Value) -> Result<ToolCallResult, HandlerError> {
        let args: WorkItemArgs = HandlerError::parse_arguments(arguments)?;
        let engine = FieldMappingEngine::new(&self.store);

        let processed = engine.process_fields(&args.work_item_type, &args.fields)?;
        let validation = engine.validate_required_fields(&args.work_item_type, &processed);

        Ok(ToolCallResult::json(json!({
            "work_item_type": args.work_item_type,
            "fields": processed,
            "valid": validation.is_valid(),
            "errors": validation.errors,
        })))
    }

    fn complete(&self, argument: &str, value: &str) -> Option<Vec<String>> {
        complete_field_argument(&self.store, argument, value)
    }
}

/// `validate_work_item_fields`: required-field check without conversion.
pub struct ValidateFieldsTool {
    store: Arc<FieldConfigStore>,
}

impl ValidateFieldsTool {
    /// Creates the tool over a shared store.
    #[must_use]
    pub const fn new(store: Arc<FieldConfigStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for ValidateFieldsTool {
    fn name(&self) -> &str {
        "validate_work_item_fields"
    }

    fn description(&self) -> &str {
        "Check that a work item has every field its type requires. Accepts friendly or \
         reference names."
    }

    fn input_schema(&self) -> Value {
        work_item_schema()
    }

    async fn call(&self, arguments: Value) -> Result<ToolCallResult, HandlerError> {
        let args: WorkItemArgs = HandlerError::parse_arguments(arguments)?;
        let validation = FieldMappingEngine::new(&self.store)
            .validate_required_fields(&args.work_item_type, &args.fields);

        Ok(ToolCallResult::json(json!({
            "work_item_type": args.work_item_type,
            "valid": validation.is_valid(),
            "errors": validation.errors,
            "required_fields": self.store.required_fields(&args.work_item_type),
        })))
    }

    fn complete(&self, argument: &str, value: &str) -> Option<Vec<String>> {
        complete_field_argument(&self.store, argument, value)
    }
}

/// `describe_field`: everything known about one field.
pub struct DescribeFieldTool {
    store: Arc<FieldConfigStore>,
}

impl DescribeFieldTool {
    /// Creates the tool over a shared store.
    #[must_use]
    pub const fn new(store: Arc<FieldConfigStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for DescribeFieldTool {
    fn name(&self) -> &str {
        "describe_field"
    }

    fn description(&self) -> &str {
        "Describe a field: its reference name, type, allowed values, default and help text."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "field_name": {
                    "type": "string",
                    "description": "Friendly field name, e.g. 'priority'"
                }
            },
            "required": ["field_name"]
        })
    }

    async fn call(&self, arguments: Value) -> Result<ToolCallResult, HandlerError> {
        let args: FieldNameArgs = HandlerError::parse_arguments(arguments)?;
        let name = args.field_name.as_str();

        let Some(rule) = self.store.field_mapping(name) else {
            return Err(HandlerError::Failed(format!(
                "Unknown field '{name}'. Known fields: {}",
                self.store.field_names().join(", ")
            )));
        };

        Ok(ToolCallResult::json(json!({
            "field_name": name,
            "canonical_name": rule.canonical_name(name),
            "type": rule.field_type.to_string(),
            "allowed_values": self.store.allowed_values(name),
            "default": rule.default_value(),
            "help": self.store.field_help_text(name),
        })))
    }

    fn complete(&self, argument: &str, value: &str) -> Option<Vec<String>> {
        complete_field_argument(&self.store, argument, value)
    }
}

/// `list_required_fields`: the required list of a work item type.
pub struct RequiredFieldsTool {
    store: Arc<FieldConfigStore>,
}

impl RequiredFieldsTool {
    /// Creates the tool over a shared store.
    #[must_use]
    pub const fn new(store: Arc<FieldConfigStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolHandler for RequiredFieldsTool {
    fn name(&self) -> &str {
        "list_required_fields"
    }

    fn description(&self) -> &str {
        "List the fields a work item type requires, with reference names and defaults."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "work_item_type": {
                    "type": "string",
                    "description": "Work item type, e.g. 'Bug'"
                }
            },
            "required": ["work_item_type"]
        })
    }

    async fn call(&self, arguments: Value) -> Result<ToolCallResult, HandlerError> {
        let args: WorkItemTypeArgs = HandlerError::parse_arguments(arguments)?;

        let fields: Vec<Value> = self
            .store
            .required_fields(&args.work_item_type)
            .iter()
            .map(|name| {
                let rule = self.store.field_mapping(name);
                json!({
                    "field_name": name,
                    "canonical_name": self.store.canonical_name(name),
                    "default": rule.and_then(|r| r.default_value()),
                })
            })
            .collect();

        Ok(ToolCallResult::json(json!({
            "work_item_type": args.work_item_type,
            "required_fields": fields,
            "known_types": self.store.entity_types(),
        })))
    }

    fn complete(&self, argument: &str, value: &str) -> Option<Vec<String>> {
        complete_field_argument(&self.store, argument, value)
    }
}
