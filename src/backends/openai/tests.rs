use futures::StreamExt;
use mockito::Matcher;
use serde_json::json;

use super::*;
use crate::chat::{merge_messages, ChatRole, Tool, ToolChoice};
use crate::evaluator::ModelConfig;
use crate::provider::CallScenario;

fn param(tools: Vec<Tool>) -> CallParam {
    let tool_choice = tools
        .first()
        .map(|tool| ToolChoice::Tool(tool.function.name.clone()));
    CallParam {
        space_id: 1,
        evaluator_id: 2,
        scenario: CallScenario::Run,
        messages: vec![
            Message::system().content("You grade answers.").build(),
            Message::user().content("Answer: 4").build(),
        ],
        model: ModelConfig {
            model_id: 7,
            model_name: "gpt-4o-mini".into(),
            temperature: Some(0.0),
            max_tokens: Some(256),
            top_p: None,
        },
        tools,
        tool_choice,
    }
}

fn score_tool() -> Tool {
    Tool::function(
        "evaluate",
        "score the answer",
        json!({"type": "object", "properties": {"score": {"type": "number"}}}),
    )
}

#[tokio::test]
async fn complete_reply_is_decoded() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "stream": false,
            "max_tokens": 256,
            "tool_choice": {"type": "function", "function": {"name": "evaluate"}},
            "messages": [
                {"role": "system", "content": "You grade answers."},
                {"role": "user", "content": "Answer: 4"}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "evaluate", "arguments": "{\"score\": 1}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider = OpenAICompatible::new("test-key", Some(server.url())).unwrap();
    let reply = provider.call(&param(vec![score_tool()])).await.unwrap();

    mock.assert_async().await;
    let Reply::Complete(message) = reply else {
        panic!("expected a complete reply");
    };
    assert_eq!(message.role, Some(ChatRole::Assistant));
    assert_eq!(message.tool_calls.len(), 1);
    assert_eq!(message.tool_calls[0].id, "call_1");
    assert_eq!(message.tool_calls[0].function.arguments, "{\"score\": 1}");
    assert_eq!(message.finish_reason(), "tool_calls");
    assert_eq!(message.usage().map(|u| u.total_tokens), Some(16));
}

#[tokio::test]
async fn streamed_reply_yields_partials_with_tool_indexes() {
    let events = [
        json!({"choices": [{"delta": {"role": "assistant", "tool_calls": [
            {"index": 0, "id": "call_1", "type": "function", "function": {"name": "evaluate", "arguments": ""}}
        ]}}]}),
        json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "{\"score\": "}}
        ]}}]}),
        json!({"choices": [{"delta": {"tool_calls": [
            {"index": 0, "function": {"arguments": "0.5}"}}
        ]}, "finish_reason": "tool_calls"}]}),
        json!({"choices": [], "usage": {"prompt_tokens": 9, "completion_tokens": 3, "total_tokens": 12}}),
    ];
    let mut body = String::from(": keep-alive\n\n");
    for event in &events {
        body.push_str(&format!("data: {event}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::PartialJson(json!({
            "stream": true,
            "stream_options": {"include_usage": true}
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let provider = OpenAICompatible::new("test-key", Some(format!("{}/v1/", server.url())))
        .unwrap()
        .with_stream(true);
    let reply = provider.call(&param(vec![score_tool()])).await.unwrap();
    let Reply::Stream(stream) = reply else {
        panic!("expected a streamed reply");
    };
    let partials: Vec<Message> = stream.map(|partial| partial.unwrap()).collect().await;

    mock.assert_async().await;
    assert_eq!(partials.len(), 4);
    assert_eq!(partials[1].tool_calls[0].index, Some(0));
    assert_eq!(partials[1].tool_calls[0].id, "");

    let merged = merge_messages(&partials).unwrap();
    assert_eq!(merged.tool_calls.len(), 1);
    assert_eq!(merged.tool_calls[0].id, "call_1");
    assert_eq!(merged.tool_calls[0].function.name, "evaluate");
    assert_eq!(merged.tool_calls[0].function.arguments, "{\"score\": 0.5}");
    assert_eq!(merged.finish_reason(), "tool_calls");
    assert_eq!(merged.usage().map(|u| u.prompt_tokens), Some(9));
}

#[tokio::test]
async fn error_status_surfaces_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_body("rate limited")
        .create_async()
        .await;

    let provider = OpenAICompatible::new("test-key", Some(server.url())).unwrap();
    let err = provider.call(&param(Vec::new())).await.unwrap_err();

    match err {
        LLMError::ProviderError(message) => {
            assert!(message.contains("429"));
            assert!(message.contains("rate limited"));
        }
        other => panic!("expected provider error, got {other:?}"),
    }
}

#[tokio::test]
async fn undecodable_body_is_a_format_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let provider = OpenAICompatible::new("test-key", Some(server.url())).unwrap();
    let err = provider.call(&param(Vec::new())).await.unwrap_err();

    assert!(matches!(
        err,
        LLMError::ResponseFormatError { ref raw_response, .. } if raw_response == "not json"
    ));
}

#[test]
fn missing_api_key_is_rejected() {
    assert!(matches!(
        OpenAICompatible::new("", None),
        Err(LLMError::AuthError(_))
    ));
}

#[tokio::test]
async fn missing_model_name_is_rejected_before_sending() {
    let provider = OpenAICompatible::new("test-key", Some("http://127.0.0.1:9".into())).unwrap();
    let mut param = param(Vec::new());
    param.model.model_name.clear();

    let err = provider.call(&param).await.unwrap_err();

    assert!(matches!(err, LLMError::InvalidRequest(_)));
}

#[test]
fn content_only_request_omits_tools() {
    let provider = OpenAICompatible::new("test-key", None).unwrap();
    let param = param(Vec::new());

    let body = serde_json::to_value(provider.build_request(&param).unwrap()).unwrap();

    assert!(body.get("tools").is_none());
    assert!(body.get("tool_choice").is_none());
    assert!(body.get("stream_options").is_none());
    assert_eq!(body["temperature"], json!(0.0));
}

#[test]
fn multimodal_messages_use_content_parts() {
    let provider = OpenAICompatible::new("test-key", None).unwrap();
    let mut param = param(Vec::new());
    param.messages = vec![Message::user()
        .text_part("Rate this:")
        .image_url("https://img/1.png")
        .build()];

    let body = serde_json::to_value(provider.build_request(&param).unwrap()).unwrap();

    assert_eq!(
        body["messages"][0]["content"],
        json!([
            {"type": "text", "text": "Rate this:"},
            {"type": "image_url", "image_url": {"url": "https://img/1.png"}}
        ])
    );
}

#[test]
fn stream_event_parser_skips_done_and_comments() {
    assert!(parse_stream_event("data: [DONE]\n\n").unwrap().is_none());
    assert!(parse_stream_event(": ping\n\n").unwrap().is_none());
    assert!(matches!(
        parse_stream_event("data: {broken\n\n"),
        Err(LLMError::ResponseFormatError { .. })
    ));
}
