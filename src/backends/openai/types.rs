use serde::{Deserialize, Serialize};

use crate::chat::{ChatRole, ContentPart, Message, ResponseMeta, TokenUsage, Tool, ToolChoice};
use crate::error::LLMError;
use crate::{FunctionCall, ToolCall};

/// Request payload for the chat completions endpoint.
#[derive(Serialize, Debug)]
pub(super) struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'a [Tool]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<&'a ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

#[derive(Serialize, Debug)]
pub(super) struct StreamOptions {
    pub include_usage: bool,
}

#[derive(Serialize, Debug)]
pub(super) struct WireMessage<'a> {
    pub role: &'static str,
    pub content: WireContent<'a>,
    #[serde(skip_serializing_if = "<[ToolCall]>::is_empty")]
    pub tool_calls: &'a [ToolCall],
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
pub(super) enum WireContent<'a> {
    Text(&'a str),
    Parts(Vec<WirePart<'a>>),
}

#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(super) enum WirePart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: WireImageUrl<'a> },
}

#[derive(Serialize, Debug)]
pub(super) struct WireImageUrl<'a> {
    pub url: &'a str,
}

impl<'a> WireMessage<'a> {
    pub fn from_message(message: &'a Message) -> Self {
        let content = if message.is_multimodal() {
            WireContent::Parts(
                message
                    .parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text { text } => WirePart::Text { text },
                        ContentPart::ImageUrl { url } => WirePart::ImageUrl {
                            image_url: WireImageUrl { url },
                        },
                    })
                    .collect(),
            )
        } else {
            WireContent::Text(&message.content)
        };
        Self {
            role: message.role.unwrap_or(ChatRole::User).as_str(),
            content,
            tool_calls: &message.tool_calls,
        }
    }
}

/// Non-streaming response body.
#[derive(Deserialize, Debug)]
pub(super) struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ResponseChoice>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

#[derive(Deserialize, Debug)]
pub(super) struct ResponseChoice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(super) struct ResponseMessage {
    #[serde(default)]
    pub role: Option<ChatRole>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatCompletionResponse {
    pub fn into_message(self) -> Result<Message, LLMError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::ProviderError("response contained no choices".to_string()))?;
        Ok(Message {
            role: choice.message.role.or(Some(ChatRole::Assistant)),
            content: choice.message.content.unwrap_or_default(),
            reasoning_content: choice.message.reasoning_content.unwrap_or_default(),
            parts: Vec::new(),
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
            response_meta: Some(ResponseMeta {
                finish_reason: choice.finish_reason.unwrap_or_default(),
                usage: self.usage,
            }),
        })
    }
}

/// One `data:` payload of a streamed response.
#[derive(Deserialize, Debug)]
pub(super) struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

#[derive(Deserialize, Debug)]
pub(super) struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub(super) struct ChunkDelta {
    #[serde(default)]
    pub role: Option<ChatRole>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ChunkToolCall>>,
}

#[derive(Deserialize, Debug)]
pub(super) struct ChunkToolCall {
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub call_type: Option<String>,
    #[serde(default)]
    pub function: Option<ChunkFunction>,
}

#[derive(Deserialize, Debug)]
pub(super) struct ChunkFunction {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

impl ChatCompletionChunk {
    /// Converts the chunk into a partial message.
    pub fn into_partial(self) -> Message {
        let mut partial = Message::default();
        let mut finish_reason = None;
        if let Some(choice) = self.choices.into_iter().next() {
            partial.role = choice.delta.role;
            partial.content = choice.delta.content.unwrap_or_default();
            partial.reasoning_content = choice.delta.reasoning_content.unwrap_or_default();
            partial.tool_calls = choice
                .delta
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(ChunkToolCall::into_tool_call)
                .collect();
            finish_reason = choice.finish_reason;
        }
        if finish_reason.is_some() || self.usage.is_some() {
            partial.response_meta = Some(ResponseMeta {
                finish_reason: finish_reason.unwrap_or_default(),
                usage: self.usage,
            });
        }
        partial
    }
}

impl ChunkToolCall {
    fn into_tool_call(self) -> ToolCall {
        let function = self.function.unwrap_or(ChunkFunction {
            name: None,
            arguments: None,
        });
        ToolCall {
            index: self.index,
            id: self.id.unwrap_or_default(),
            call_type: self.call_type.unwrap_or_default(),
            function: FunctionCall {
                name: function.name.unwrap_or_default(),
                arguments: function.arguments.unwrap_or_default(),
            },
        }
    }
}
