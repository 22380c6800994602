//! Tool and prompt handler traits, and the descriptor and result types they
//! exchange with the dispatcher.
//!
//! Handlers are self-describing: the registry builds the `tools/list` and
//! `prompts/list` entries from `name`, `description` and the parameter schema.
//! The dispatcher never looks inside a handler beyond this contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::error::FieldMappingError;
use crate::mcp::protocol::ErrorCode;

/// Maximum completion values returned for one request.
pub const MAX_COMPLETION_VALUES: usize = 100;

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if requires a predicate fn(&T) -> bool, so we must take &bool here
pub(crate) const fn is_false(b: &bool) -> bool {
    !*b
}

/// A tool definition for tools/list response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for the tool's input parameters.
    pub input_schema: Value,
}

/// One argument accepted by a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the argument must be supplied.
    #[serde(skip_serializing_if = "is_false")]
    pub required: bool,
}

impl PromptArgument {
    /// Creates a required argument.
    #[must_use]
    pub fn required(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            required: true,
        }
    }

    /// Creates an optional argument.
    #[must_use]
    pub fn optional(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            required: false,
        }
    }
}

/// A prompt definition for prompts/list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptDefinition {
    /// Unique prompt name.
    pub name: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Arguments the prompt accepts.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
}

/// Content item in a tool call response or prompt message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

/// Result of a tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Content returned by the tool.
    pub content: Vec<ToolContent>,
    /// Machine-readable form of the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_content: Option<Value>,
    /// Whether the tool call resulted in an error.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Creates a successful text result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            structured_content: None,
            is_error: false,
        }
    }

    /// Creates a successful result from a JSON value, rendered as pretty text.
    #[must_use]
    pub fn json(value: Value) -> Self {
        let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
        Self {
            content: vec![ToolContent::Text { text }],
            structured_content: Some(value),
            is_error: false,
        }
    }

    /// Creates an error text result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            structured_content: None,
            is_error: true,
        }
    }

    /// Folds a handler error into a tool-level failure.
    #[must_use]
    pub fn from_handler_error(error: &HandlerError) -> Self {
        let mut result = Self::error(error.to_string());
        if let HandlerError::Conversion(mapping) = error {
            let errors: Vec<_> = mapping
                .errors
                .iter()
                .map(|e| json!({ "field": e.field(), "value": e.value(), "message": e.to_string() }))
                .collect();
            result.structured_content = Some(json!({
                "code": ErrorCode::ConversionError.code(),
                "message": ErrorCode::ConversionError.default_message(),
                "errors": errors,
            }));
        }
        result
    }
}

/// Speaker of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human side of the conversation.
    User,
    /// The model side of the conversation.
    Assistant,
}

/// One role-tagged message produced by a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    /// Who says it.
    pub role: Role,
    /// What is said.
    pub content: ToolContent,
}

impl PromptMessage {
    /// Creates a user text message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: ToolContent::Text { text: text.into() },
        }
    }

    /// Creates an assistant text message.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: ToolContent::Text { text: text.into() },
        }
    }
}

/// Result of prompts/get.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptResult {
    /// Description of the rendered prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The rendered messages.
    pub messages: Vec<PromptMessage>,
    /// Whether rendering failed.
    #[serde(skip_serializing_if = "is_false")]
    pub is_error: bool,
}

impl PromptResult {
    /// Creates a successful result.
    #[must_use]
    pub fn new(description: Option<String>, messages: Vec<PromptMessage>) -> Self {
        Self {
            description,
            messages,
            is_error: false,
        }
    }

    /// Folds a handler error into a prompt-level failure.
    #[must_use]
    pub fn from_handler_error(error: &HandlerError) -> Self {
        Self {
            description: Some(error.to_string()),
            messages: Vec::new(),
            is_error: true,
        }
    }
}

/// Errors raised by tool and prompt handlers.
///
/// The dispatcher reports these inside a successful response, never as a
/// protocol error.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The arguments do not match what the handler accepts.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// Field values failed conversion.
    #[error(transparent)]
    Conversion(#[from] FieldMappingError),

    /// The operation failed.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    /// Deserialises tool arguments into a typed structure.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArguments` describing the mismatch.
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(
        arguments: Value,
    ) -> Result<T, Self> {
        serde_json::from_value(arguments).map_err(|e| Self::InvalidArguments(e.to_string()))
    }
}

/// A tool that clients can call through `tools/call`.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// JSON Schema describing the accepted arguments.
    fn input_schema(&self) -> Value;

    /// Runs the tool.
    ///
    /// # Errors
    ///
    /// Returns a `HandlerError` when the arguments are invalid or the
    /// operation fails.
    async fn call(&self, arguments: Value) -> Result<ToolCallResult, HandlerError>;

    /// Suggests values for an argument. `None` means no completion support.
    fn complete(&self, _argument: &str, _value: &str) -> Option<Vec<String>> {
        None
    }

    /// Builds the descriptor advertised in `tools/list`.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            input_schema: self.input_schema(),
        }
    }
}

/// A prompt template that clients can render through `prompts/get`.
pub trait PromptHandler: Send + Sync {
    /// Unique prompt name.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Arguments the prompt accepts.
    fn arguments(&self) -> Vec<PromptArgument>;

    /// Renders the prompt. Required arguments are checked before this is called.
    ///
    /// # Errors
    ///
    /// Returns a `HandlerError` if the prompt cannot be rendered.
    fn render(&self, arguments: &Map<String, Value>) -> Result<PromptResult, HandlerError>;

    /// Suggests values for an argument. `None` means no completion support.
    fn complete(&self, _argument: &str, _value: &str) -> Option<Vec<String>> {
        None
    }

    /// Builds the descriptor advertised in `prompts/list`.
    fn definition(&self) -> PromptDefinition {
        PromptDefinition {
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            arguments: self.arguments(),
        }
    }
}

/// Returns the candidates starting with `prefix`, ignoring ASCII case.
pub fn complete_from<'a, I>(candidates: I, prefix: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = prefix.to_ascii_lowercase();
    candidates
        .into_iter()
        .filter(|c| c.to_ascii_lowercase().starts_with(&prefix))
        .map(str::to_string)
        .collect()
}
