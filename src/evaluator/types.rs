use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chat::{ChatRole, Tool};

/// Kind tag of an evaluator definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorType {
    #[default]
    Prompt,
}

impl EvaluatorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvaluatorType::Prompt => "prompt",
        }
    }
}

impl fmt::Display for EvaluatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scoring definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluator {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub space_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub evaluator_type: EvaluatorType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_evaluator_version: Option<PromptEvaluatorVersion>,
}

/// How the model's answer is read back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseType {
    /// Arguments of the first tool call
    #[default]
    FunctionCall,
    /// Free-form message content
    Content,
}

/// Model selection and sampling parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub model_id: i64,
    #[serde(default)]
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

/// One templated message of a prompt evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub role: ChatRole,
    #[serde(default)]
    pub content: String,
}

impl MessageTemplate {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Immutable configuration of a prompt evaluator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptEvaluatorVersion {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub evaluator_id: i64,
    #[serde(default)]
    pub space_id: i64,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub prompt_template_key: String,
    #[serde(default)]
    pub prompt_suffix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_config: Option<ModelConfig>,
    #[serde(default)]
    pub parse_type: ParseType,
    #[serde(default)]
    pub message_list: Vec<MessageTemplate>,
    #[serde(default)]
    pub tools: Vec<Tool>,
}

/// A single input value bound to a template placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "content_type", rename_all = "snake_case")]
pub enum Content {
    Text { text: String },
    Image { url: String },
    MultiPart { parts: Vec<Content> },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Content::Image { url: url.into() }
    }

    /// Whether this value contains an image anywhere.
    pub fn has_image(&self) -> bool {
        match self {
            Content::Text { .. } => false,
            Content::Image { .. } => true,
            Content::MultiPart { parts } => parts.iter().any(Content::has_image),
        }
    }
}

/// Caller input of a run, keyed by placeholder name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorInputData {
    #[serde(default)]
    pub input_fields: HashMap<String, Content>,
}

impl EvaluatorInputData {
    pub fn with_text(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.input_fields.insert(name.into(), Content::text(text));
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, content: Content) -> Self {
        self.input_fields.insert(name.into(), content);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorResult {
    pub score: f64,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Classification of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    Provider,
    Cancelled,
    NoToolCalls,
    EmptyArguments,
    MalformedOutput,
    InvalidField,
    InvalidEvaluator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorRunError {
    pub kind: RunErrorKind,
    pub message: String,
}

/// Result of one evaluator run.
///
/// A terminal output carries exactly one of `evaluator_result` and
/// `evaluator_run_error`. Usage is kept on failures too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorOutputData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluator_result: Option<EvaluatorResult>,
    #[serde(default)]
    pub evaluator_usage: EvaluatorUsage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluator_run_error: Option<EvaluatorRunError>,
    #[serde(default)]
    pub time_consuming_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Fail,
}

/// Terminal `(output, status)` pair of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub output: EvaluatorOutputData,
    pub status: RunStatus,
}

impl RunOutcome {
    /// Derives the status from the output: success iff a result was produced.
    pub fn from_output(output: EvaluatorOutputData) -> Self {
        let status = if output.evaluator_result.is_some() {
            RunStatus::Success
        } else {
            RunStatus::Fail
        };
        Self { output, status }
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
