//! Organization-specific field mapping for work items.
//!
//! Callers use friendly names (`title`, `priority`) while Azure DevOps expects
//! reference names (`System.Title`, `Microsoft.VSTS.Common.Priority`). This
//! module translates between the two, converts values to the declared types,
//! and enforces required fields per work item type.
//!
//! - [`rules`]: rule definitions, value conversion, built-in defaults
//! - [`store`]: configured rules layered over the built-in defaults
//! - [`engine`]: `process_fields` and `validate_required_fields`

pub mod engine;
pub mod rules;
pub mod store;

pub use engine::{FieldMap, FieldMappingEngine, ValidationResult};
pub use rules::{FieldMappingRule, FieldType};
pub use store::FieldConfigStore;
