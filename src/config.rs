//! Keyed evaluator configuration: tool definitions and prompt suffixes.

#[path = "config/error.rs"]
mod error;

#[path = "config/yaml.rs"]
mod yaml;

use std::collections::HashMap;

use crate::chat::Tool;

pub use error::ConfigError;
pub use yaml::{default_config_path, YamlConfigStore};

/// Read access to evaluator configuration.
///
/// Every lookup returns an owned map that may be empty; an empty map means
/// nothing is configured, not a failure.
pub trait ConfigStore: Send + Sync {
    /// Tool key to tool definition.
    fn tools(&self, locale: Option<&str>) -> HashMap<String, Tool>;
    /// Prompt template key to tool key.
    fn tool_mapping(&self, locale: Option<&str>) -> HashMap<String, String>;
    /// Suffix key to suffix text.
    fn prompt_suffixes(&self, locale: Option<&str>) -> HashMap<String, String>;
    /// Model id to suffix key.
    fn suffix_mapping(&self, locale: Option<&str>) -> HashMap<String, String>;
}

/// In-memory configuration; locales are ignored.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigStore {
    pub tools: HashMap<String, Tool>,
    pub tool_mapping: HashMap<String, String>,
    pub prompt_suffixes: HashMap<String, String>,
    pub suffix_mapping: HashMap<String, String>,
}

impl StaticConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, key: impl Into<String>, tool: Tool) -> Self {
        self.tools.insert(key.into(), tool);
        self
    }

    pub fn map_tool(mut self, template_key: impl Into<String>, tool_key: impl Into<String>) -> Self {
        self.tool_mapping.insert(template_key.into(), tool_key.into());
        self
    }

    pub fn with_suffix(mut self, key: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.prompt_suffixes.insert(key.into(), suffix.into());
        self
    }

    pub fn map_suffix(mut self, model_id: impl Into<String>, suffix_key: impl Into<String>) -> Self {
        self.suffix_mapping.insert(model_id.into(), suffix_key.into());
        self
    }
}

impl ConfigStore for StaticConfigStore {
    fn tools(&self, _locale: Option<&str>) -> HashMap<String, Tool> {
        self.tools.clone()
    }

    fn tool_mapping(&self, _locale: Option<&str>) -> HashMap<String, String> {
        self.tool_mapping.clone()
    }

    fn prompt_suffixes(&self, _locale: Option<&str>) -> HashMap<String, String> {
        self.prompt_suffixes.clone()
    }

    fn suffix_mapping(&self, _locale: Option<&str>) -> HashMap<String, String> {
        self.suffix_mapping.clone()
    }
}
