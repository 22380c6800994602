//! Configuration structures for deserialisation.
//!
//! These structures map directly to the JSON configuration file format.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;
use crate::fields::FieldMappingRule;

/// Root configuration structure.
///
/// This is the top-level structure that matches the JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Optional JSON schema reference (ignored during parsing).
    #[serde(rename = "$schema", default)]
    _schema: Option<String>,

    /// Optional comment field (ignored during parsing).
    #[serde(rename = "_comment", default)]
    _comment: Option<String>,

    /// Azure DevOps organization and project.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Transport and dispatch settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Field mapping rules and required fields.
    #[serde(default)]
    pub fields: FieldsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation checks fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.service
            .organization_base_url()
            .map_err(|message| ConfigError::ValidationError { message })?;

        if self.server.page_size == Some(0) {
            return Err(ConfigError::ValidationError {
                message: "page_size must be greater than zero".to_string(),
            });
        }

        if let Some(ref listen) = self.server.listen {
            listen
                .parse::<SocketAddr>()
                .map_err(|e| ConfigError::ValidationError {
                    message: format!("invalid listen address '{listen}': {e}"),
                })?;
        }

        self.fields
            .validate()
            .map_err(|message| ConfigError::ValidationError { message })
    }
}

/// Azure DevOps service settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Organization URL, e.g. `https://dev.azure.com/contoso`.
    #[serde(default)]
    pub organization_url: Option<String>,

    /// Default project name.
    #[serde(default)]
    pub project: Option<String>,

    /// REST API version.
    /// Default: "7.1"
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            organization_url: None,
            project: None,
            api_version: default_api_version(),
        }
    }
}

impl ServiceConfig {
    /// Parses `organization_url` as the base for REST endpoints.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem if the URL does not parse, is not
    /// http(s), or carries a query or fragment.
    pub fn organization_base_url(&self) -> Result<Option<Url>, String> {
        let Some(raw) = self.organization_url.as_deref() else {
            return Ok(None);
        };

        let url = Url::parse(raw).map_err(|e| format!("invalid organization_url '{raw}': {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("organization_url '{raw}' must be an http(s) URL"));
        }
        if url.cannot_be_a_base() || url.query().is_some() || url.fragment().is_some() {
            return Err(format!(
                "organization_url '{raw}' must not carry a query or fragment"
            ));
        }
        Ok(Some(url))
    }
}

fn default_api_version() -> String {
    "7.1".to_string()
}

/// Transport and dispatch settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// TCP address to listen on. Stdio is used when unset.
    #[serde(default)]
    pub listen: Option<String>,

    /// Maximum entries per `tools/list` or `prompts/list` page.
    /// Unset means no pagination.
    #[serde(default)]
    pub page_size: Option<usize>,

    /// Seconds a tool call may run before it is aborted. 0 disables the limit.
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

impl ServerConfig {
    /// Returns the tool call timeout, if one is configured.
    #[must_use]
    pub const fn tool_timeout(&self) -> Option<Duration> {
        if self.tool_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.tool_timeout_secs))
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: None,
            page_size: None,
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

const fn default_tool_timeout_secs() -> u64 {
    60
}

/// Field mapping rules keyed by source name, and required fields keyed by
/// work item type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldsConfig {
    /// Source field name to rule.
    #[serde(default)]
    pub mappings: BTreeMap<String, FieldMappingRule>,

    /// Work item type to required field names.
    #[serde(default)]
    pub required: BTreeMap<String, Vec<String>>,
}

impl FieldsConfig {
    /// Rejects contradictory rules and malformed required-field lists.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        for (source, rule) in &self.mappings {
            rule.validate(source)?;
        }

        for (entity_type, fields) in &self.required {
            if entity_type.trim().is_empty() {
                return Err("required fields declared for an empty work item type".to_string());
            }
            if fields.iter().any(|f| f.trim().is_empty()) {
                return Err(format!(
                    "work item type '{entity_type}' requires an empty field name"
                ));
            }
        }

        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}
