//! azure-devops-mcp: MCP server for Azure DevOps work item field mapping
//!
//! This library lets AI assistants work with Azure DevOps work items using
//! friendly field names. It translates them to reference names, converts
//! values to their declared types, and checks required fields.
//!
//! # Architecture
//!
//! - **Protocol dispatch**: a JSON-RPC 2.0 session per client, driven by an
//!   immutable registry of tools and prompts
//! - **Field mapping**: configured rules layered over built-in defaults
//! - **Tools and prompts**: thin handlers over the field mapping engine
//!
//! # Modules
//!
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`fields`]: Field mapping rules and engine
//! - [`mcp`]: MCP protocol implementation
//! - [`prompts`]: Built-in prompts
//! - [`tools`]: Built-in tools

pub mod config;
pub mod error;
pub mod fields;
pub mod mcp;
pub mod prompts;
pub mod tools;

use std::sync::Arc;

use crate::config::Config;
use crate::error::RegistryError;
use crate::fields::FieldConfigStore;
use crate::mcp::{CapabilityRegistry, ServerContext};

/// Builds the shared server context from a loaded configuration.
///
/// # Errors
///
/// Returns an error if two built-in handlers share a name.
pub fn build_server_context(config: &Config) -> Result<Arc<ServerContext>, RegistryError> {
    let store = Arc::new(FieldConfigStore::new(&config.fields));
    let registry = CapabilityRegistry::register_all(
        tools::builtin_tools(&store, &config.service),
        prompts::builtin_prompts(&store),
    )?;

    Ok(Arc::new(ServerContext::from_config(registry, &config.server)))
}
