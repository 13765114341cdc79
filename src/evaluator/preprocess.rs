use std::sync::Arc;

use crate::config::ConfigStore;
use crate::error::EvaluatorError;

use super::types::PromptEvaluatorVersion;
use super::RunContext;

/// Fills an evaluator version's tool and prompt suffix from keyed configuration.
#[derive(Clone)]
pub struct Preprocessor {
    config: Arc<dyn ConfigStore>,
}

impl Preprocessor {
    pub fn new(config: Arc<dyn ConfigStore>) -> Self {
        Self { config }
    }

    /// Resolves the tool and suffix for `version` in place.
    ///
    /// The tool key is the template key's mapped tool key, or the template key
    /// itself. Suffix candidates are the model id's mapped suffix key, then the
    /// template key. A missing suffix is fine; a missing tool is an error only
    /// when the version carries no tools of its own.
    pub fn resolve(
        &self,
        ctx: &RunContext,
        version: &mut PromptEvaluatorVersion,
    ) -> Result<(), EvaluatorError> {
        let locale = ctx.locale();
        let template_key = version.prompt_template_key.clone();

        let tool_key = self
            .config
            .tool_mapping(locale)
            .remove(&template_key)
            .unwrap_or_else(|| template_key.clone());
        match self.config.tools(locale).remove(&tool_key) {
            Some(tool) => {
                log::debug!("template `{template_key}` resolved to tool `{tool_key}`");
                version.tools = vec![tool];
            }
            None if version.tools.is_empty() => {
                return Err(EvaluatorError::Unresolved {
                    what: "tool",
                    key: tool_key,
                });
            }
            None => log::debug!("no configured tool `{tool_key}`, keeping the version's tools"),
        }

        let suffixes = self.config.prompt_suffixes(locale);
        let mut candidates = Vec::with_capacity(2);
        if let Some(model) = &version.model_config {
            if let Some(key) = self.config.suffix_mapping(locale).remove(&model.model_id.to_string()) {
                candidates.push(key);
            }
        }
        candidates.push(template_key);
        match candidates.iter().find_map(|key| suffixes.get(key)) {
            Some(suffix) => version.prompt_suffix = suffix.clone(),
            None => log::debug!("no prompt suffix configured for {candidates:?}"),
        }
        Ok(())
    }
}
