use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::chat::{collect_stream, merge_messages, Message, ToolChoice};
use crate::config::ConfigStore;
use crate::error::{EvaluatorError, LLMError};
use crate::provider::{CallParam, CallScenario, ModelProvider, Reply};

use super::metrics::{EvaluatorMetrics, RunMetric};
use super::parse::parse_output;
use super::preprocess::Preprocessor;
use super::template::{append_suffix, render_messages};
use super::types::{
    Evaluator, EvaluatorInputData, EvaluatorOutputData, EvaluatorRunError, EvaluatorType,
    ModelConfig, ParseType, PromptEvaluatorVersion, RunErrorKind, RunOutcome, RunStatus,
};
use super::{EvaluatorSource, RunContext};

/// Runs prompt evaluators against a model provider.
pub struct PromptEvaluatorSource {
    provider: Arc<dyn ModelProvider>,
    metrics: Arc<dyn EvaluatorMetrics>,
    preprocessor: Preprocessor,
}

impl PromptEvaluatorSource {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        metrics: Arc<dyn EvaluatorMetrics>,
        config: Arc<dyn ConfigStore>,
    ) -> Self {
        Self {
            provider,
            metrics,
            preprocessor: Preprocessor::new(config),
        }
    }

    async fn execute(
        &self,
        ctx: &RunContext,
        evaluator: &Evaluator,
        input: &EvaluatorInputData,
        scenario: CallScenario,
    ) -> Result<RunOutcome, EvaluatorError> {
        let start = Instant::now();
        let result = self.evaluate(ctx, evaluator, input, scenario).await;
        let elapsed = start.elapsed();

        let mut metric = RunMetric {
            space_id: evaluator.space_id,
            evaluator_id: evaluator.id,
            evaluator_type: EvaluatorType::Prompt,
            elapsed,
            error: None,
        };
        match result {
            Ok(mut output) => {
                output.time_consuming_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
                metric.error = output
                    .evaluator_run_error
                    .as_ref()
                    .map(|err| err.message.clone());
                self.metrics.emit_run(&metric);
                Ok(RunOutcome::from_output(output))
            }
            Err(err) => {
                metric.error = Some(err.to_string());
                self.metrics.emit_run(&metric);
                Err(err)
            }
        }
    }

    async fn evaluate(
        &self,
        ctx: &RunContext,
        evaluator: &Evaluator,
        input: &EvaluatorInputData,
        scenario: CallScenario,
    ) -> Result<EvaluatorOutputData, EvaluatorError> {
        let (version, model) = validate(evaluator)?;

        let mut messages = render_messages(&version.message_list, input)?;
        append_suffix(&mut messages, &version.prompt_suffix);

        let (tools, tool_choice) = match version.parse_type {
            ParseType::FunctionCall => (
                version.tools.clone(),
                version
                    .tools
                    .first()
                    .map(|tool| ToolChoice::Tool(tool.function.name.clone())),
            ),
            ParseType::Content => (Vec::new(), None),
        };
        let param = CallParam {
            space_id: evaluator.space_id,
            evaluator_id: evaluator.id,
            scenario,
            messages,
            model: model.clone(),
            tools,
            tool_choice,
        };

        let reply = tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => Err(LLMError::Cancelled),
            reply = self.call_model(&param) => reply,
        };

        let message = match reply {
            Ok(message) => message,
            Err(err) => {
                log::warn!(
                    "evaluator {} model call failed: {err}",
                    evaluator.id
                );
                let kind = match err {
                    LLMError::Cancelled => RunErrorKind::Cancelled,
                    _ => RunErrorKind::Provider,
                };
                return Ok(EvaluatorOutputData {
                    evaluator_run_error: Some(EvaluatorRunError {
                        kind,
                        message: err.to_string(),
                    }),
                    ..EvaluatorOutputData::default()
                });
            }
        };

        match parse_output(version, &message) {
            Ok(output) => Ok(output),
            Err(failure) => {
                log::warn!(
                    "evaluator {} produced unusable output: {}",
                    evaluator.id,
                    failure.error
                );
                Ok(failure.into_output())
            }
        }
    }

    async fn call_model(&self, param: &CallParam) -> Result<Message, LLMError> {
        match self.provider.call(param).await? {
            Reply::Complete(message) => Ok(message),
            Reply::Stream(stream) => {
                let partials = collect_stream(stream).await?;
                log::debug!("merging {} streamed partials", partials.len());
                merge_messages(&partials)
            }
        }
    }
}

fn validate(evaluator: &Evaluator) -> Result<(&PromptEvaluatorVersion, &ModelConfig), EvaluatorError> {
    if evaluator.evaluator_type != EvaluatorType::Prompt {
        return Err(EvaluatorError::InvalidEvaluator(format!(
            "evaluator {} is not a prompt evaluator",
            evaluator.id
        )));
    }
    let version = evaluator.prompt_evaluator_version.as_ref().ok_or_else(|| {
        EvaluatorError::InvalidEvaluator(format!(
            "evaluator {} has no prompt evaluator version",
            evaluator.id
        ))
    })?;
    let model = version.model_config.as_ref().ok_or_else(|| {
        EvaluatorError::InvalidEvaluator(format!(
            "evaluator {} version {} has no model config",
            evaluator.id, version.version
        ))
    })?;
    Ok((version, model))
}

#[async_trait]
impl EvaluatorSource for PromptEvaluatorSource {
    fn evaluator_type(&self) -> EvaluatorType {
        EvaluatorType::Prompt
    }

    async fn run(
        &self,
        ctx: &RunContext,
        evaluator: &Evaluator,
        input: &EvaluatorInputData,
    ) -> Result<RunOutcome, EvaluatorError> {
        self.execute(ctx, evaluator, input, CallScenario::Run).await
    }

    async fn debug(
        &self,
        ctx: &RunContext,
        evaluator: &Evaluator,
        input: &EvaluatorInputData,
    ) -> Result<EvaluatorOutputData, EvaluatorError> {
        let outcome = self
            .execute(ctx, evaluator, input, CallScenario::Debug)
            .await?;
        match outcome.status {
            RunStatus::Success => Ok(outcome.output),
            RunStatus::Fail => Err(EvaluatorError::RunFailed(
                outcome
                    .output
                    .evaluator_run_error
                    .map(|err| err.message)
                    .unwrap_or_default(),
            )),
        }
    }

    async fn pre_handle(
        &self,
        ctx: &RunContext,
        evaluator: &mut Evaluator,
    ) -> Result<(), EvaluatorError> {
        let id = evaluator.id;
        let version = evaluator.prompt_evaluator_version.as_mut().ok_or_else(|| {
            EvaluatorError::InvalidEvaluator(format!(
                "evaluator {id} has no prompt evaluator version"
            ))
        })?;
        self.preprocessor.resolve(ctx, version)
    }
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
