//! LLM-backed evaluator execution engine.
//!
//! An evaluator is a prompt template plus a model configuration plus a declared
//! output schema. Running one renders the prompt against caller input, invokes a
//! [`provider::ModelProvider`], folds a possibly streamed reply into a single
//! [`chat::Message`], repairs the model's near-JSON output with [`repair`] and
//! extracts a typed score/reasoning result.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use llm_eval::config::StaticConfigStore;
//! use llm_eval::evaluator::{EvaluatorSource, LogMetrics, PromptEvaluatorSource, RunContext};
//! # async fn example(
//! #     provider: Arc<dyn llm_eval::provider::ModelProvider>,
//! #     evaluator: llm_eval::evaluator::Evaluator,
//! #     input: llm_eval::evaluator::EvaluatorInputData,
//! # ) -> Result<(), llm_eval::error::EvaluatorError> {
//! let source = PromptEvaluatorSource::new(
//!     provider,
//!     Arc::new(LogMetrics),
//!     Arc::new(StaticConfigStore::default()),
//! );
//! let outcome = source.run(&RunContext::new(), &evaluator, &input).await?;
//! println!("{:?}: {:?}", outcome.status, outcome.output.evaluator_result);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

#[cfg(feature = "openai")]
pub mod backends;
pub mod chat;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod provider;
pub mod repair;
pub mod resilient;

pub use error::{EvaluatorError, LLMError};
pub use provider::ModelProvider;

/// Tool call represents a function call that an LLM wants to make.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Slot of this call within a streamed reply, when the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// The ID of the tool call.
    #[serde(default)]
    pub id: String,
    /// The type of the tool call (usually "function").
    #[serde(rename = "type", default)]
    pub call_type: String,
    /// The function to call.
    pub function: FunctionCall,
}

impl ToolCall {
    /// Creates a function tool call with the given name and raw arguments.
    pub fn function(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            index: None,
            id: String::new(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Sets the tool call id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the stream slot index.
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

/// FunctionCall contains details about which function to call and with what arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// The name of the function to call.
    #[serde(default)]
    pub name: String,
    /// The arguments to pass to the function, as raw (possibly partial) JSON text.
    #[serde(default)]
    pub arguments: String,
}
