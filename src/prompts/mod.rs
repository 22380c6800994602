//! Built-in MCP prompts.

use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::FieldMappingError;
use crate::fields::FieldConfigStore;
use crate::mcp::handler::{
    complete_from, HandlerError, PromptArgument, PromptHandler, PromptMessage, PromptResult,
};

/// Returns the built-in prompts in listing order.
#[must_use]
pub fn builtin_prompts(store: &Arc<FieldConfigStore>) -> Vec<Arc<dyn PromptHandler>> {
    vec![
        Arc::new(CreateWorkItemPrompt::new(Arc::clone(store))),
        Arc::new(TriageBugPrompt::new(Arc::clone(store))),
    ]
}

/// Reads an optional string argument, treating blank values as absent.
fn argument<'a>(arguments: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    arguments
        .get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// `create_work_item`: guides the model through creating a work item.
pub struct CreateWorkItemPrompt {
    store: Arc<FieldConfigStore>,
}

impl CreateWorkItemPrompt {
    /// Creates the prompt over a shared store.
    #[must_use]
    pub const fn new(store: Arc<FieldConfigStore>) -> Self {
        Self { store }
    }
}

impl PromptHandler for CreateWorkItemPrompt {
    fn name(&self) -> &str {
        "create_work_item"
    }

    fn description(&self) -> &str {
        "Draft a new work item and prepare the request that creates it"
    }

    fn arguments(&self) -> Vec<PromptArgument> {
        vec![
            PromptArgument::required("work_item_type", "Work item type, e.g. 'Task'"),
            PromptArgument::required("title", "Title of the work item"),
            PromptArgument::optional("description", "Longer description"),
        ]
    }

    fn render(&self, arguments: &Map<String, Value>) -> Result<PromptResult, HandlerError> {
        let work_item_type = argument(arguments, "work_item_type").ok_or_else(|| {
            HandlerError::InvalidArguments("work_item_type is required".to_string())
        })?;
        let title = argument(arguments, "title")
            .ok_or_else(|| HandlerError::InvalidArguments("title is required".to_string()))?;

        let mut text = format!(
            "Create a new {work_item_type} work item titled \"{title}\" in Azure DevOps.\n"
        );
        if let Some(description) = argument(arguments, "description") {
            let _ = writeln!(text, "\nDescription:\n{description}");
        }

        let required = self.store.required_fields(work_item_type);
        if required.is_empty() {
            let _ = writeln!(
                text,
                "\n'{work_item_type}' has no configured required fields. Known types: {}.",
                self.store.entity_types().join(", ")
            );
        } else {
            text.push_str("\nRequired fields:\n");
            for name in required {
                let _ = writeln!(text, "- {name} ({})", self.store.canonical_name(name));
            }
        }

        text.push_str(
            "\nAsk for any missing values, then call prepare_work_item with the fields \
             and show me the resulting request.",
        );

        Ok(PromptResult::new(
            Some(format!("Create a {work_item_type}")),
            vec![PromptMessage::user(text)],
        ))
    }

    fn complete(&self, argument: &str, value: &str) -> Option<Vec<String>> {
        (argument == "work_item_type").then(|| complete_from(self.store.entity_types(), value))
    }
}

/// `triage_bug`: asks the model to triage a bug report.
pub struct TriageBugPrompt {
    store: Arc<FieldConfigStore>,
}

impl TriageBugPrompt {
    /// Creates the prompt over a shared store.
    #[must_use]
    pub const fn new(store: Arc<FieldConfigStore>) -> Self {
        Self { store }
    }
}

impl PromptHandler for TriageBugPrompt {
    fn name(&self) -> &str {
        "triage_bug"
    }

    fn description(&self) -> &str {
        "Triage a bug report into severity, priority and reproduction steps"
    }

    fn arguments(&self) -> Vec<PromptArgument> {
        vec![
            PromptArgument::required("bug_description", "What went wrong"),
            PromptArgument::optional("severity", "Known severity, e.g. '2 - High'"),
        ]
    }

    fn render(&self, arguments: &Map<String, Value>) -> Result<PromptResult, HandlerError> {
        let description = argument(arguments, "bug_description").ok_or_else(|| {
            HandlerError::InvalidArguments("bug_description is required".to_string())
        })?;

        let mut text = format!("Triage this bug report:\n\n{description}\n");

        match argument(arguments, "severity") {
            Some(raw) => {
                let severity = self
                    .store
                    .convert_field_value("severity", &Value::String(raw.to_string()))
                    .map_err(|e| FieldMappingError { errors: vec![e] })?;
                let severity = severity.as_str().unwrap_or(raw);
                let _ = writeln!(text, "\nThe reporter rated the severity as {severity}.");
            }
            None => {
                let allowed = self.store.allowed_values("severity");
                if !allowed.is_empty() {
                    let _ = writeln!(
                        text,
                        "\nPick a severity from: {}.",
                        allowed.join(", ")
                    );
                }
            }
        }

        text.push_str(
            "\nSuggest a priority, summarise the reproduction steps, and call \
             validate_work_item_fields for a Bug before proposing the work item.",
        );

        Ok(PromptResult::new(
            Some("Bug triage".to_string()),
            vec![PromptMessage::user(text)],
        ))
    }

    fn complete(&self, argument: &str, value: &str) -> Option<Vec<String>> {
        (argument == "severity").then(|| {
            complete_from(
                self.store.allowed_values("severity").iter().map(String::as_str),
                value,
            )
        })
    }
}
