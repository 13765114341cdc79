use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use crate::chat::Tool;

use super::error::ConfigError;
use super::ConfigStore;

const TOOL_CONF_KEY: &str = "evaluator_tool_conf";
const TOOL_MAPPING_KEY: &str = "evaluator_tool_mapping";
const PROMPT_SUFFIX_KEY: &str = "evaluator_prompt_suffix";
const PROMPT_MAPPING_KEY: &str = "evaluator_prompt_mapping";

/// Sections keyed by locale; the unlocalized section lives under `""`.
type Localized<T> = HashMap<String, HashMap<String, T>>;

/// Configuration loaded from an `evaluation.yaml` document.
///
/// `evaluator_tool_conf` and `evaluator_prompt_suffix` may be localized with
/// sibling sections named `<key>_<locale>`; a non-empty localized section
/// takes precedence over the base one.
#[derive(Debug, Clone, Default)]
pub struct YamlConfigStore {
    tools: Localized<Tool>,
    tool_mapping: HashMap<String, String>,
    prompt_suffixes: Localized<String>,
    suffix_mapping: HashMap<String, String>,
}

impl YamlConfigStore {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_yaml_str(&contents)?;
        log::debug!(
            "loaded evaluator config from {} ({} tool sections, {} suffix sections)",
            path.display(),
            store.tools.len(),
            store.prompt_suffixes.len()
        );
        Ok(store)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let root: Option<Mapping> = serde_yaml::from_str(contents)?;
        let mut store = Self::default();
        for (key, value) in root.unwrap_or_default() {
            let Some(key) = key.as_str() else {
                continue;
            };
            if key == TOOL_MAPPING_KEY {
                store.tool_mapping = section(key, value)?;
            } else if key == PROMPT_MAPPING_KEY {
                store.suffix_mapping = section(key, value)?;
            } else if let Some(locale) = locale_of(key, TOOL_CONF_KEY) {
                store.tools.insert(locale.to_string(), section(key, value)?);
            } else if let Some(locale) = locale_of(key, PROMPT_SUFFIX_KEY) {
                store.prompt_suffixes.insert(locale.to_string(), section(key, value)?);
            }
        }
        Ok(store)
    }
}

impl ConfigStore for YamlConfigStore {
    fn tools(&self, locale: Option<&str>) -> HashMap<String, Tool> {
        localized(&self.tools, locale)
    }

    fn tool_mapping(&self, _locale: Option<&str>) -> HashMap<String, String> {
        self.tool_mapping.clone()
    }

    fn prompt_suffixes(&self, locale: Option<&str>) -> HashMap<String, String> {
        localized(&self.prompt_suffixes, locale)
    }

    fn suffix_mapping(&self, _locale: Option<&str>) -> HashMap<String, String> {
        self.suffix_mapping.clone()
    }
}

/// `~/.config/llm-eval/evaluation.yaml` or the platform equivalent.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("llm-eval").join("evaluation.yaml"))
        .ok_or(ConfigError::MissingConfigDir)
}

fn locale_of<'a>(key: &'a str, base: &str) -> Option<&'a str> {
    let rest = key.strip_prefix(base)?;
    if rest.is_empty() {
        return Some("");
    }
    rest.strip_prefix('_').filter(|locale| !locale.is_empty())
}

/// Reads a section as a map, accepting unquoted numeric or boolean keys such
/// as model ids.
fn section<T: DeserializeOwned>(
    name: &str,
    value: Value,
) -> Result<HashMap<String, T>, ConfigError> {
    if value.is_null() {
        return Ok(HashMap::new());
    }
    let entries: HashMap<Value, T> = serde_yaml::from_value(value)?;
    entries
        .into_iter()
        .map(|(key, value)| scalar_key(name, key).map(|key| (key, value)))
        .collect()
}

fn scalar_key(section: &str, key: Value) -> Result<String, ConfigError> {
    match key {
        Value::String(key) => Ok(key),
        Value::Number(key) => Ok(key.to_string()),
        Value::Bool(key) => Ok(key.to_string()),
        _ => Err(ConfigError::InvalidKey {
            section: section.to_string(),
        }),
    }
}

fn localized<T: Clone>(sections: &Localized<T>, locale: Option<&str>) -> HashMap<String, T> {
    if let Some(section) = locale.and_then(|locale| sections.get(locale)) {
        if !section.is_empty() {
            return section.clone();
        }
    }
    sections.get("").cloned().unwrap_or_default()
}
