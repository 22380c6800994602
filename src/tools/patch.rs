//! `prepare_work_item`: builds the JSON Patch document for creating a work item.
//!
//! The request is only prepared, never sent.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::config::ServiceConfig;
use crate::fields::{FieldConfigStore, FieldMap, FieldMappingEngine};
use crate::mcp::handler::{HandlerError, ToolCallResult, ToolHandler};
use crate::tools::fields::{complete_field_argument, work_item_schema};

#[derive(Debug, Deserialize)]
struct PrepareArgs {
    work_item_type: String,
    #[serde(default)]
    fields: FieldMap,
    #[serde(default)]
    project: Option<String>,
}

/// Maps fields and renders the create request for a work item.
pub struct PrepareWorkItemTool {
    store: Arc<FieldConfigStore>,
    service: ServiceConfig,
}

impl PrepareWorkItemTool {
    /// Creates the tool over a shared store and the service settings.
    #[must_use]
    pub const fn new(store: Arc<FieldConfigStore>, service: ServiceConfig) -> Self {
        Self { store, service }
    }

    fn endpoint(&self, project: Option<&str>, work_item_type: &str) -> Result<Url, HandlerError> {
        let mut url = self
            .service
            .organization_base_url()
            .map_err(HandlerError::Failed)?
            .ok_or_else(|| {
                HandlerError::Failed("service.organization_url is not configured".to_string())
            })?;
        let project = project
            .or(self.service.project.as_deref())
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                HandlerError::Failed(
                    "No project given and service.project is not configured".to_string(),
                )
            })?;

        let type_segment = format!("${}", work_item_type.trim());
        url.path_segments_mut()
            .map_err(|()| HandlerError::Failed("organization_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend([
                project,
                "_apis",
                "wit",
                "workitems",
                type_segment.as_str(),
            ]);
        url.query_pairs_mut()
            .append_pair("api-version", &self.service.api_version);

        Ok(url)
    }
}

/// Builds `add` operations for every non-null field.
fn patch_document(fields: &FieldMap) -> Vec<Value> {
    fields
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(name, value)| {
            json!({
                "op": "add",
                "path": format!("/fields/{}", escape_pointer_token(name)),
                "value": value,
            })
        })
        .collect()
}

/// Escapes a JSON Pointer reference token.
fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

#[async_trait]
impl ToolHandler for PrepareWorkItemTool {
    fn name(&self) -> &str {
        "prepare_work_item"
    }

    fn description(&self) -> &str {
        "Map and validate fields, then return the JSON Patch document and REST endpoint \
         for creating the work item. The request is not sent."
    }

    fn input_schema(&self) -> Value {
        let mut schema = work_item_schema();
        schema["properties"]["project"] = json!({
            "type": "string",
            "description": "Project name. Defaults to service.project from the configuration"
        });
        schema
    }

    async fn call(&self, arguments: Value) -> Result<ToolCallResult, HandlerError> {
        let args: PrepareArgs = HandlerError::parse_arguments(arguments)?;
        let engine = FieldMappingEngine::new(&self.store);

        let processed = engine.process_fields(&args.work_item_type, &args.fields)?;
        let validation = engine.validate_required_fields(&args.work_item_type, &processed);
        if !validation.is_valid() {
            return Err(HandlerError::Failed(format!(
                "Work item is incomplete: {}",
                validation.errors.join("; ")
            )));
        }

        let url = self.endpoint(args.project.as_deref(), &args.work_item_type)?;
        tracing::debug!(%url, fields = processed.len(), "prepared work item");

        Ok(ToolCallResult::json(json!({
            "method": "POST",
            "url": url.as_str(),
            "content_type": "application/json-patch+json",
            "body": patch_document(&processed),
        })))
    }

    fn complete(&self, argument: &str, value: &str) -> Option<Vec<String>> {
        complete_field_argument(&self.store, argument, value)
    }
}
