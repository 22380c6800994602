//! Registry of the tools and prompts a server exposes.
//!
//! Built once by the composition root and shared read-only by every session.
//! Listing order is registration order.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::RegistryError;
use crate::mcp::handler::{PromptDefinition, PromptHandler, ToolDefinition, ToolHandler};

struct ToolEntry {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

struct PromptEntry {
    definition: PromptDefinition,
    handler: Arc<dyn PromptHandler>,
}

/// Immutable lookup tables for tool and prompt handlers.
#[derive(Default)]
pub struct CapabilityRegistry {
    tools: IndexMap<String, ToolEntry>,
    prompts: IndexMap<String, PromptEntry>,
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("prompts", &self.prompts.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CapabilityRegistry {
    /// Registers every handler, capturing its descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is empty or declared twice.
    pub fn register_all(
        tools: Vec<Arc<dyn ToolHandler>>,
        prompts: Vec<Arc<dyn PromptHandler>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();

        for handler in tools {
            let definition = handler.definition();
            if definition.name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if registry.tools.contains_key(&definition.name) {
                return Err(RegistryError::DuplicateTool {
                    name: definition.name,
                });
            }
            tracing::debug!(tool = %definition.name, "registered tool");
            registry.tools.insert(
                definition.name.clone(),
                ToolEntry {
                    definition,
                    handler,
                },
            );
        }

        for handler in prompts {
            let definition = handler.definition();
            if definition.name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if registry.prompts.contains_key(&definition.name) {
                return Err(RegistryError::DuplicatePrompt {
                    name: definition.name,
                });
            }
            tracing::debug!(prompt = %definition.name, "registered prompt");
            registry.prompts.insert(
                definition.name.clone(),
                PromptEntry {
                    definition,
                    handler,
                },
            );
        }

        Ok(registry)
    }

    /// Looks up a tool handler by name.
    #[must_use]
    pub fn lookup_tool(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.tools.get(name).map(|entry| &entry.handler)
    }

    /// Looks up a prompt handler by name.
    #[must_use]
    pub fn lookup_prompt(&self, name: &str) -> Option<&Arc<dyn PromptHandler>> {
        self.prompts.get(name).map(|entry| &entry.handler)
    }

    /// Returns the prompt descriptor captured at registration.
    #[must_use]
    pub fn prompt_definition(&self, name: &str) -> Option<&PromptDefinition> {
        self.prompts.get(name).map(|entry| &entry.definition)
    }

    /// Lists tool descriptors in registration order.
    #[must_use]
    pub fn list_tools(&self) -> Vec<&ToolDefinition> {
        self.tools.values().map(|entry| &entry.definition).collect()
    }

    /// Lists prompt descriptors in registration order.
    #[must_use]
    pub fn list_prompts(&self) -> Vec<&PromptDefinition> {
        self.prompts.values().map(|entry| &entry.definition).collect()
    }

    /// Returns `true` if at least one tool is registered.
    #[must_use]
    pub fn has_tools(&self) -> bool {
        !self.tools.is_empty()
    }

    /// Returns `true` if at least one prompt is registered.
    #[must_use]
    pub fn has_prompts(&self) -> bool {
        !self.prompts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::handler::{HandlerError, PromptArgument, PromptResult, ToolCallResult};
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};

    struct NamedTool(&'static str);

    #[async_trait]
    impl ToolHandler for NamedTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn call(&self, _arguments: Value) -> Result<ToolCallResult, HandlerError> {
            Ok(ToolCallResult::text(self.0))
        }
    }

    struct NamedPrompt(&'static str);

    impl PromptHandler for NamedPrompt {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test prompt"
        }

        fn arguments(&self) -> Vec<PromptArgument> {
            vec![PromptArgument::required("topic", "What to talk about")]
        }

        fn render(&self, _arguments: &Map<String, Value>) -> Result<PromptResult, HandlerError> {
            Ok(PromptResult::new(None, Vec::new()))
        }
    }

    fn tools(names: &[&'static str]) -> Vec<Arc<dyn ToolHandler>> {
        names
            .iter()
            .map(|n| Arc::new(NamedTool(*n)) as Arc<dyn ToolHandler>)
            .collect()
    }

    #[test]
    fn lists_in_registration_order() {
        let registry = CapabilityRegistry::register_all(tools(&["zeta", "alpha", "mid"]), vec![])
            .unwrap();
        let names: Vec<_> = registry.list_tools().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn duplicate_tool_is_fatal() {
        let err = CapabilityRegistry::register_all(tools(&["a", "b", "a"]), vec![]).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateTool {
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn duplicate_prompt_is_fatal() {
        let prompts: Vec<Arc<dyn PromptHandler>> =
            vec![Arc::new(NamedPrompt("p")), Arc::new(NamedPrompt("p"))];
        let err = CapabilityRegistry::register_all(vec![], prompts).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicatePrompt { .. }));
    }

    #[test]
    fn tool_and_prompt_may_share_a_name() {
        let prompts: Vec<Arc<dyn PromptHandler>> = vec![Arc::new(NamedPrompt("same"))];
        let registry = CapabilityRegistry::register_all(tools(&["same"]), prompts).unwrap();
        assert!(registry.lookup_tool("same").is_some());
        assert!(registry.lookup_prompt("same").is_some());
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = CapabilityRegistry::register_all(tools(&[""]), vec![]).unwrap_err();
        assert_eq!(err, RegistryError::EmptyName);
    }

    #[test]
    fn lookup_missing() {
        let registry = CapabilityRegistry::default();
        assert!(registry.lookup_tool("nope").is_none());
        assert!(registry.lookup_prompt("nope").is_none());
        assert!(!registry.has_tools());
        assert!(!registry.has_prompts());
    }

    #[test]
    fn prompt_definition_is_captured() {
        let prompts: Vec<Arc<dyn PromptHandler>> = vec![Arc::new(NamedPrompt("p"))];
        let registry = CapabilityRegistry::register_all(vec![], prompts).unwrap();
        let definition = registry.prompt_definition("p").unwrap();
        assert_eq!(definition.arguments.len(), 1);
        assert!(definition.arguments[0].required);
        assert_eq!(registry.list_prompts().len(), 1);
    }
}
