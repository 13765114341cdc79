use serde_json::{Map, Value};
use thiserror::Error;

use crate::chat::{Message, ParametersSchema};
use crate::repair::{repair_json, RepairError};

use super::types::{
    EvaluatorOutputData, EvaluatorResult, EvaluatorRunError, EvaluatorUsage, ParseType,
    PromptEvaluatorVersion, RunErrorKind,
};

const SCORE_KEY: &str = "score";
const REASON_KEY: &str = "reason";
const REASONING_KEY: &str = "reasoning";

/// Reasons a model reply cannot be turned into an evaluator result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("no tool calls returned from LLM")]
    NoToolCalls,
    #[error("function call arguments are nil")]
    EmptyArguments,
    #[error("repair model output: {0}")]
    Repair(#[from] RepairError),
    #[error("decode repaired model output: {0}")]
    Decode(String),
    #[error("model output is not a JSON object")]
    NotAnObject,
    #[error("missing field `{0}` in model output")]
    MissingField(String),
    #[error("invalid field `{field}` in model output: {reason}")]
    InvalidField { field: String, reason: String },
}

impl ParseError {
    pub fn kind(&self) -> RunErrorKind {
        match self {
            ParseError::NoToolCalls => RunErrorKind::NoToolCalls,
            ParseError::EmptyArguments => RunErrorKind::EmptyArguments,
            ParseError::Repair(_) | ParseError::Decode(_) | ParseError::NotAnObject => {
                RunErrorKind::MalformedOutput
            }
            ParseError::MissingField(_) | ParseError::InvalidField { .. } => {
                RunErrorKind::InvalidField
            }
        }
    }

    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ParseError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// A failed parse together with whatever output had been assembled, usage
/// in particular.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct ParseFailure {
    pub output: EvaluatorOutputData,
    #[source]
    pub error: ParseError,
}

impl ParseFailure {
    /// Output with the run error filled in from the parse error.
    pub fn into_output(self) -> EvaluatorOutputData {
        let mut output = self.output;
        output.evaluator_result = None;
        output.evaluator_run_error = Some(EvaluatorRunError {
            kind: self.error.kind(),
            message: self.error.to_string(),
        });
        output
    }
}

/// Extracts score and reasoning from a merged model reply.
pub fn parse_output(
    version: &PromptEvaluatorVersion,
    reply: &Message,
) -> Result<EvaluatorOutputData, ParseFailure> {
    let mut output = EvaluatorOutputData::default();
    if let Some(usage) = reply.usage() {
        output.evaluator_usage = EvaluatorUsage {
            input_tokens: u64::from(usage.prompt_tokens),
            output_tokens: u64::from(usage.completion_tokens),
        };
    }

    match extract_result(version, reply) {
        Ok(result) => {
            output.evaluator_result = Some(result);
            Ok(output)
        }
        Err(error) => Err(ParseFailure { output, error }),
    }
}

fn extract_result(
    version: &PromptEvaluatorVersion,
    reply: &Message,
) -> Result<EvaluatorResult, ParseError> {
    let raw = match version.parse_type {
        ParseType::FunctionCall => {
            let call = reply.tool_calls.first().ok_or(ParseError::NoToolCalls)?;
            if call.function.arguments.trim().is_empty() {
                return Err(ParseError::EmptyArguments);
            }
            call.function.arguments.as_str()
        }
        ParseType::Content => reply.content.as_str(),
    };

    let repaired = repair_json(raw)?;
    let object = match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Object(object)) => object,
        Ok(_) => return Err(ParseError::NotAnObject),
        Err(err) => return Err(ParseError::Decode(err.to_string())),
    };

    let schema = output_schema(version);
    for field in &schema.required {
        if !object.contains_key(field) {
            return Err(ParseError::MissingField(field.clone()));
        }
    }

    let score = match object.get(SCORE_KEY) {
        Some(value) => coerce_score(value)?,
        None => return Err(ParseError::MissingField(SCORE_KEY.to_string())),
    };
    let reasoning = extract_reasoning(&object, reasoning_key(&schema))?;

    Ok(EvaluatorResult { score, reasoning })
}

fn output_schema(version: &PromptEvaluatorVersion) -> ParametersSchema {
    let Some(tool) = version.tools.first() else {
        return ParametersSchema::default();
    };
    tool.parameters_schema().unwrap_or_else(|err| {
        log::warn!(
            "tool `{}` has an unreadable parameters schema: {err}",
            tool.function.name
        );
        ParametersSchema::default()
    })
}

fn reasoning_key(schema: &ParametersSchema) -> &'static str {
    if schema.properties.contains_key(REASON_KEY) {
        REASON_KEY
    } else if schema.properties.contains_key(REASONING_KEY) {
        REASONING_KEY
    } else {
        REASON_KEY
    }
}

fn coerce_score(value: &Value) -> Result<f64, ParseError> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| ParseError::invalid(SCORE_KEY, "number out of range")),
        Value::String(text) => match text.trim().parse::<f64>() {
            Ok(score) if score.is_finite() => Ok(score),
            _ => Err(ParseError::invalid(
                SCORE_KEY,
                format!("expected a number, got {text:?}"),
            )),
        },
        other => Err(ParseError::invalid(
            SCORE_KEY,
            format!("expected a number, got {other}"),
        )),
    }
}

fn extract_reasoning(object: &Map<String, Value>, key: &'static str) -> Result<String, ParseError> {
    let alias = if key == REASON_KEY {
        REASONING_KEY
    } else {
        REASON_KEY
    };
    let (field, value) = match (object.get(key), object.get(alias)) {
        (Some(value), _) => (key, value),
        (None, Some(value)) => (alias, value),
        (None, None) => return Ok(String::new()),
    };
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null => Err(ParseError::invalid(field, "expected a string, got null")),
        Value::Array(_) | Value::Object(_) => Err(ParseError::invalid(
            field,
            "expected a string, got a JSON container",
        )),
    }
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod tests;
