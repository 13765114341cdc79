use std::sync::Mutex;

use futures::stream;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::chat::{ChatRole, MessageStream, TokenUsage, Tool};
use crate::config::StaticConfigStore;
use crate::evaluator::{EvaluatorSourceRegistry, EvaluatorSourceRegistryBuilder, MessageTemplate};
use crate::ToolCall;

/// Provider answering one call with a prepared reply and recording the request.
struct FakeProvider {
    reply: Mutex<Option<Result<Reply, LLMError>>>,
    calls: Mutex<Vec<CallParam>>,
}

impl FakeProvider {
    fn replying(reply: Result<Reply, LLMError>) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(Some(reply)),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn complete(message: Message) -> Arc<Self> {
        Self::replying(Ok(Reply::Complete(message)))
    }

    fn streaming(partials: Vec<Result<Message, LLMError>>) -> Arc<Self> {
        let stream: MessageStream = Box::pin(stream::iter(partials));
        Self::replying(Ok(Reply::Stream(stream)))
    }

    fn calls(&self) -> Vec<CallParam> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for FakeProvider {
    async fn call(&self, param: &CallParam) -> Result<Reply, LLMError> {
        self.calls.lock().unwrap().push(param.clone());
        self.reply
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(LLMError::Generic("unexpected second call".into())))
    }
}

/// Provider that never answers.
struct HangingProvider;

#[async_trait]
impl ModelProvider for HangingProvider {
    async fn call(&self, _param: &CallParam) -> Result<Reply, LLMError> {
        futures::future::pending().await
    }
}

#[derive(Default)]
struct RecordingMetrics {
    runs: Mutex<Vec<RunMetric>>,
}

impl RecordingMetrics {
    fn runs(&self) -> Vec<RunMetric> {
        self.runs.lock().unwrap().clone()
    }
}

impl EvaluatorMetrics for RecordingMetrics {
    fn emit_run(&self, metric: &RunMetric) {
        self.runs.lock().unwrap().push(metric.clone());
    }
}

fn score_tool() -> Tool {
    Tool::function(
        "evaluate",
        "score the answer",
        json!({
            "type": "object",
            "properties": {
                "score": {"type": "number"},
                "reason": {"type": "string"}
            },
            "required": ["score", "reason"]
        }),
    )
}

fn evaluator(parse_type: ParseType) -> Evaluator {
    Evaluator {
        id: 1,
        space_id: 100,
        name: "relevance".into(),
        evaluator_type: EvaluatorType::Prompt,
        prompt_evaluator_version: Some(PromptEvaluatorVersion {
            id: 11,
            evaluator_id: 1,
            space_id: 100,
            version: "v1".into(),
            prompt_template_key: "relevance_template".into(),
            prompt_suffix: "Reply with JSON.".into(),
            model_config: Some(ModelConfig {
                model_id: 7,
                model_name: "gpt-4o-mini".into(),
                temperature: Some(0.0),
                ..ModelConfig::default()
            }),
            parse_type,
            message_list: vec![
                MessageTemplate::new(ChatRole::System, "You grade answers."),
                MessageTemplate::new(ChatRole::User, "Input: {{input}}\nOutput: {{output}}"),
            ],
            tools: vec![score_tool()],
        }),
    }
}

fn input() -> EvaluatorInputData {
    EvaluatorInputData::default()
        .with_text("input", "What is 2+2?")
        .with_text("output", "4")
}

fn source(
    provider: Arc<dyn ModelProvider>,
    metrics: Arc<RecordingMetrics>,
) -> PromptEvaluatorSource {
    PromptEvaluatorSource::new(provider, metrics, Arc::new(StaticConfigStore::default()))
}

fn tool_reply(arguments: &str) -> Message {
    Message::assistant()
        .tool_calls(vec![ToolCall::function("evaluate", arguments).with_id("call_1")])
        .usage(TokenUsage::new(10, 10))
        .finish_reason("tool_calls")
        .build()
}

#[tokio::test]
async fn function_call_run_succeeds() {
    let provider = FakeProvider::complete(tool_reply(r#"{"score": 1.0, "reason": "test response"}"#));
    let metrics = Arc::new(RecordingMetrics::default());
    let source = source(provider.clone(), metrics.clone());

    let outcome = source
        .run(&RunContext::new(), &evaluator(ParseType::FunctionCall), &input())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    let result = outcome.output.evaluator_result.unwrap();
    assert_eq!(result.score, 1.0);
    assert_eq!(result.reasoning, "test response");
    assert_eq!(outcome.output.evaluator_usage.input_tokens, 10);
    assert_eq!(outcome.output.evaluator_usage.output_tokens, 10);
    assert!(outcome.output.evaluator_run_error.is_none());

    let runs = metrics.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].evaluator_id, 1);
    assert_eq!(runs[0].space_id, 100);
    assert_eq!(runs[0].evaluator_type, EvaluatorType::Prompt);
    assert!(runs[0].error.is_none());
}

#[tokio::test]
async fn function_call_request_carries_rendered_prompt_and_tool_choice() {
    let provider = FakeProvider::complete(tool_reply(r#"{"score": 1, "reason": "ok"}"#));
    let source = source(provider.clone(), Arc::new(RecordingMetrics::default()));

    source
        .run(&RunContext::new(), &evaluator(ParseType::FunctionCall), &input())
        .await
        .unwrap();

    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(call.scenario, CallScenario::Run);
    assert_eq!(call.evaluator_id, 1);
    assert_eq!(call.model.model_name, "gpt-4o-mini");
    assert_eq!(call.messages.len(), 2);
    assert_eq!(call.messages[0].content, "You grade answers.\nReply with JSON.");
    assert_eq!(call.messages[1].content, "Input: What is 2+2?\nOutput: 4");
    assert_eq!(call.tools, vec![score_tool()]);
    assert_eq!(call.tool_choice, Some(ToolChoice::Tool("evaluate".into())));
}

#[tokio::test]
async fn provider_error_becomes_failed_run() {
    let provider = FakeProvider::replying(Err(LLMError::ProviderError("LLM failed".into())));
    let metrics = Arc::new(RecordingMetrics::default());
    let source = source(provider, metrics.clone());

    let outcome = source
        .run(&RunContext::new(), &evaluator(ParseType::FunctionCall), &input())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Fail);
    assert!(outcome.output.evaluator_result.is_none());
    let run_error = outcome.output.evaluator_run_error.unwrap();
    assert_eq!(run_error.kind, RunErrorKind::Provider);
    assert!(run_error.message.contains("LLM failed"));

    let runs = metrics.runs();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].error.as_deref().unwrap().contains("LLM failed"));
}

#[tokio::test]
async fn reply_without_tool_calls_fails() {
    let reply = Message::assistant()
        .content("it is relevant")
        .usage(TokenUsage::new(10, 10))
        .build();
    let source = source(FakeProvider::complete(reply), Arc::new(RecordingMetrics::default()));

    let outcome = source
        .run(&RunContext::new(), &evaluator(ParseType::FunctionCall), &input())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Fail);
    let run_error = outcome.output.evaluator_run_error.unwrap();
    assert_eq!(run_error.kind, RunErrorKind::NoToolCalls);
    assert!(run_error.message.contains("no tool calls returned from LLM"));
    assert_eq!(outcome.output.evaluator_usage.input_tokens, 10);
}

#[tokio::test]
async fn empty_function_arguments_fail() {
    let source = source(
        FakeProvider::complete(tool_reply("")),
        Arc::new(RecordingMetrics::default()),
    );

    let outcome = source
        .run(&RunContext::new(), &evaluator(ParseType::FunctionCall), &input())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Fail);
    let run_error = outcome.output.evaluator_run_error.unwrap();
    assert!(run_error.message.contains("function call arguments are nil"));
}

#[tokio::test]
async fn content_mode_parses_repaired_content() {
    let reply = Message::assistant()
        .content("{score: 1.5, reason: 'good'}")
        .usage(TokenUsage::new(10, 10))
        .build();
    let provider = FakeProvider::complete(reply);
    let source = source(provider.clone(), Arc::new(RecordingMetrics::default()));

    let outcome = source
        .run(&RunContext::new(), &evaluator(ParseType::Content), &input())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    let result = outcome.output.evaluator_result.unwrap();
    assert_eq!(result.score, 1.5);
    assert_eq!(result.reasoning, "good");
    assert_eq!(outcome.output.evaluator_usage.output_tokens, 10);

    let call = &provider.calls()[0];
    assert!(call.tools.is_empty());
    assert!(call.tool_choice.is_none());
}

#[tokio::test]
async fn content_mode_with_blank_reason_fails_and_keeps_usage() {
    let reply = Message::assistant()
        .content("{score: 1.5, reason: }")
        .usage(TokenUsage::new(10, 10))
        .build();
    let source = source(FakeProvider::complete(reply), Arc::new(RecordingMetrics::default()));

    let outcome = source
        .run(&RunContext::new(), &evaluator(ParseType::Content), &input())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Fail);
    assert_eq!(
        outcome.output.evaluator_run_error.unwrap().kind,
        RunErrorKind::InvalidField
    );
    assert_eq!(outcome.output.evaluator_usage.input_tokens, 10);
}

#[tokio::test]
async fn content_mode_with_non_numeric_score_fails() {
    let reply = Message::assistant()
        .content("{score:'not-a-number', reason:123}")
        .build();
    let source = source(FakeProvider::complete(reply), Arc::new(RecordingMetrics::default()));

    let outcome = source
        .run(&RunContext::new(), &evaluator(ParseType::Content), &input())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Fail);
    assert!(outcome.output.evaluator_result.is_none());
}

#[tokio::test]
async fn streamed_reply_is_merged_before_parsing() {
    let partials = vec![
        Ok(Message::assistant()
            .tool_calls(vec![ToolCall::function("evaluate", "{\"score\": 0.").with_id("call_1")])
            .build()),
        Ok(Message {
            tool_calls: vec![ToolCall::function("", "8, \"reason\": \"close\"}")],
            ..Message::default()
        }),
        Ok(Message {
            response_meta: Some(crate::chat::ResponseMeta {
                finish_reason: "tool_calls".into(),
                usage: Some(TokenUsage::new(12, 5)),
            }),
            ..Message::default()
        }),
    ];
    let source = source(
        FakeProvider::streaming(partials),
        Arc::new(RecordingMetrics::default()),
    );

    let outcome = source
        .run(&RunContext::new(), &evaluator(ParseType::FunctionCall), &input())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Success);
    let result = outcome.output.evaluator_result.unwrap();
    assert_eq!(result.score, 0.8);
    assert_eq!(result.reasoning, "close");
    assert_eq!(outcome.output.evaluator_usage.input_tokens, 12);
    assert_eq!(outcome.output.evaluator_usage.output_tokens, 5);
}

#[tokio::test]
async fn stream_error_fails_the_run() {
    let partials = vec![
        Ok(Message::assistant().content("{score").build()),
        Err(LLMError::HttpError("connection reset".into())),
    ];
    let source = source(
        FakeProvider::streaming(partials),
        Arc::new(RecordingMetrics::default()),
    );

    let outcome = source
        .run(&RunContext::new(), &evaluator(ParseType::Content), &input())
        .await
        .unwrap();

    let run_error = outcome.output.evaluator_run_error.unwrap();
    assert_eq!(run_error.kind, RunErrorKind::Provider);
    assert!(run_error.message.contains("connection reset"));
}

#[tokio::test]
async fn cancellation_fails_the_run_promptly() {
    let metrics = Arc::new(RecordingMetrics::default());
    let source = source(Arc::new(HangingProvider), metrics.clone());
    let token = CancellationToken::new();
    let ctx = RunContext::new().with_cancellation(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::task::yield_now().await;
        token.cancel();
    });
    let outcome = source
        .run(&ctx, &evaluator(ParseType::FunctionCall), &input())
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(outcome.status, RunStatus::Fail);
    assert_eq!(
        outcome.output.evaluator_run_error.unwrap().kind,
        RunErrorKind::Cancelled
    );
    assert_eq!(metrics.runs().len(), 1);
}

#[tokio::test]
async fn missing_version_is_invalid_and_still_emits_metric() {
    let metrics = Arc::new(RecordingMetrics::default());
    let provider = FakeProvider::complete(tool_reply("{}"));
    let source = source(provider.clone(), metrics.clone());
    let mut evaluator = evaluator(ParseType::FunctionCall);
    evaluator.prompt_evaluator_version = None;

    let err = source
        .run(&RunContext::new(), &evaluator, &input())
        .await
        .unwrap_err();

    assert!(matches!(err, EvaluatorError::InvalidEvaluator(_)));
    assert!(provider.calls().is_empty());
    let runs = metrics.runs();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].error.is_some());
}

#[tokio::test]
async fn missing_model_config_is_invalid() {
    let source = source(
        FakeProvider::complete(tool_reply("{}")),
        Arc::new(RecordingMetrics::default()),
    );
    let mut evaluator = evaluator(ParseType::FunctionCall);
    if let Some(version) = evaluator.prompt_evaluator_version.as_mut() {
        version.model_config = None;
    }

    let err = source
        .run(&RunContext::new(), &evaluator, &input())
        .await
        .unwrap_err();

    assert!(matches!(err, EvaluatorError::InvalidEvaluator(_)));
}

#[tokio::test]
async fn debug_uses_debug_scenario() {
    let provider = FakeProvider::complete(tool_reply(r#"{"score": 2, "reason": "fine"}"#));
    let source = source(provider.clone(), Arc::new(RecordingMetrics::default()));

    let output = source
        .debug(&RunContext::new(), &evaluator(ParseType::FunctionCall), &input())
        .await
        .unwrap();

    assert_eq!(output.evaluator_result.unwrap().score, 2.0);
    assert_eq!(provider.calls()[0].scenario, CallScenario::Debug);
}

#[tokio::test]
async fn debug_reports_failed_run_as_error() {
    let source = source(
        FakeProvider::replying(Err(LLMError::ProviderError("quota exceeded".into()))),
        Arc::new(RecordingMetrics::default()),
    );

    let err = source
        .debug(&RunContext::new(), &evaluator(ParseType::FunctionCall), &input())
        .await
        .unwrap_err();

    match err {
        EvaluatorError::RunFailed(message) => assert!(message.contains("quota exceeded")),
        other => panic!("expected run failure, got {other:?}"),
    }
}

#[tokio::test]
async fn pre_handle_resolves_configured_tool_and_suffix() {
    let config = StaticConfigStore::new()
        .with_tool("relevance_tool", Tool::function("relevance", "", json!({})))
        .map_tool("relevance_template", "relevance_tool")
        .with_suffix("json", "Use JSON only.")
        .map_suffix("7", "json");
    let source = PromptEvaluatorSource::new(
        FakeProvider::complete(Message::default()),
        Arc::new(RecordingMetrics::default()),
        Arc::new(config),
    );
    let mut evaluator = evaluator(ParseType::FunctionCall);

    source
        .pre_handle(&RunContext::new(), &mut evaluator)
        .await
        .unwrap();

    let version = evaluator.prompt_evaluator_version.unwrap();
    assert_eq!(version.tools[0].function.name, "relevance");
    assert_eq!(version.prompt_suffix, "Use JSON only.");
}

#[tokio::test]
async fn pre_handle_without_version_is_invalid() {
    let source = source(
        FakeProvider::complete(Message::default()),
        Arc::new(RecordingMetrics::default()),
    );
    let mut evaluator = evaluator(ParseType::Content);
    evaluator.prompt_evaluator_version = None;

    let err = source
        .pre_handle(&RunContext::new(), &mut evaluator)
        .await
        .unwrap_err();

    assert!(matches!(err, EvaluatorError::InvalidEvaluator(_)));
}

#[test]
fn reports_prompt_type() {
    let source = source(
        FakeProvider::complete(Message::default()),
        Arc::new(RecordingMetrics::default()),
    );
    assert_eq!(source.evaluator_type(), EvaluatorType::Prompt);
}

#[tokio::test]
async fn registry_dispatches_by_type() {
    let provider = FakeProvider::complete(tool_reply(r#"{"score": 3, "reason": "r"}"#));
    let registry = EvaluatorSourceRegistryBuilder::new()
        .register(Arc::new(source(
            provider,
            Arc::new(RecordingMetrics::default()),
        )))
        .build();

    let outcome = registry
        .run(&RunContext::new(), &evaluator(ParseType::FunctionCall), &input())
        .await
        .unwrap();

    assert!(outcome.is_success());
    assert!(registry.get(EvaluatorType::Prompt).is_some());
}

#[tokio::test]
async fn registry_rejects_unregistered_type() {
    let registry = EvaluatorSourceRegistry::new();

    let err = registry
        .run(&RunContext::new(), &evaluator(ParseType::Content), &input())
        .await
        .unwrap_err();

    assert!(matches!(err, EvaluatorError::UnsupportedType(ref tag) if tag == "prompt"));
}
