//! Boundary to language-model backends.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chat::{Message, MessageStream, Tool, ToolChoice};
use crate::error::LLMError;
use crate::evaluator::ModelConfig;

/// Why the model is being called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallScenario {
    /// Regular evaluation run
    #[default]
    Run,
    /// Interactive evaluator debugging
    Debug,
}

impl CallScenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallScenario::Run => "run",
            CallScenario::Debug => "debug",
        }
    }
}

impl fmt::Display for CallScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a provider needs for a single model call.
#[derive(Debug, Clone)]
pub struct CallParam {
    pub space_id: i64,
    pub evaluator_id: i64,
    pub scenario: CallScenario,
    pub messages: Vec<Message>,
    pub model: ModelConfig,
    /// Only set when the evaluator parses function-call output
    pub tools: Vec<Tool>,
    pub tool_choice: Option<ToolChoice>,
}

/// Reply of a model call: either one complete message or a stream of partials.
pub enum Reply {
    Complete(Message),
    Stream(MessageStream),
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Complete(message) => f.debug_tuple("Complete").field(message).finish(),
            Reply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// A language-model backend.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn call(&self, param: &CallParam) -> Result<Reply, LLMError>;
}

#[async_trait]
impl<P: ModelProvider + ?Sized> ModelProvider for std::sync::Arc<P> {
    async fn call(&self, param: &CallParam) -> Result<Reply, LLMError> {
        (**self).call(param).await
    }
}

#[async_trait]
impl<P: ModelProvider + ?Sized> ModelProvider for Box<P> {
    async fn call(&self, param: &CallParam) -> Result<Reply, LLMError> {
        (**self).call(param).await
    }
}
