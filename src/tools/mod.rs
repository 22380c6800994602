//! Built-in MCP tools.
//!
//! | Tool | Purpose |
//! |------|---------|
//! | `map_work_item_fields` | Rename, convert and default a field map |
//! | `validate_work_item_fields` | Check required fields |
//! | `describe_field` | Show a field's rule |
//! | `list_required_fields` | Show a work item type's required fields |
//! | `prepare_work_item` | Build the create request (JSON Patch) |

mod fields;
mod patch;

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::fields::FieldConfigStore;
use crate::mcp::handler::ToolHandler;

pub use fields::{DescribeFieldTool, MapFieldsTool, RequiredFieldsTool, ValidateFieldsTool};
pub use patch::PrepareWorkItemTool;

/// Returns the built-in tools in listing order.
#[must_use]
pub fn builtin_tools(
    store: &Arc<FieldConfigStore>,
    service: &ServiceConfig,
) -> Vec<Arc<dyn ToolHandler>> {
    vec![
        Arc::new(MapFieldsTool::new(Arc::clone(store))),
        Arc::new(ValidateFieldsTool::new(Arc::clone(store))),
        Arc::new(DescribeFieldTool::new(Arc::clone(store))),
        Arc::new(RequiredFieldsTool::new(Arc::clone(store))),
        Arc::new(PrepareWorkItemTool::new(Arc::clone(store), service.clone())),
    ]
}
