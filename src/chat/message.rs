use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ToolCall;

use super::usage::TokenUsage;

/// Role of a participant in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions that frame the conversation
    System,
    /// The user/human participant in the conversation
    User,
    /// The AI assistant participant in the conversation
    Assistant,
    /// Result of a tool invocation
    Tool,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One element of a multimodal message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// A text segment
    Text { text: String },
    /// An image referenced by URL (or data URL)
    ImageUrl { url: String },
}

/// Metadata reported by the provider alongside a reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Why generation stopped (e.g. "stop", "tool_calls")
    #[serde(default)]
    pub finish_reason: String,
    /// Token usage, typically present only on the final stream chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// A single message in a chat conversation.
///
/// The same type is used for prompt templates, complete replies and stream
/// deltas. A delta only carries the fields that changed since the previous
/// one, which is why the role is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of who sent this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ChatRole>,
    /// The text content of the message
    #[serde(default)]
    pub content: String,
    /// Reasoning ("thinking") text emitted by reasoning models
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reasoning_content: String,
    /// Multimodal parts; when non-empty they take precedence over `content`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<ContentPart>,
    /// Tool calls requested by the model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Finish reason and usage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_meta: Option<ResponseMeta>,
}

impl Message {
    /// Create a new builder for a system message
    pub fn system() -> MessageBuilder {
        MessageBuilder::new(ChatRole::System)
    }

    /// Create a new builder for a user message
    pub fn user() -> MessageBuilder {
        MessageBuilder::new(ChatRole::User)
    }

    /// Create a new builder for an assistant message
    pub fn assistant() -> MessageBuilder {
        MessageBuilder::new(ChatRole::Assistant)
    }

    /// Token usage reported with this message, if any.
    pub fn usage(&self) -> Option<&TokenUsage> {
        self.response_meta.as_ref().and_then(|meta| meta.usage.as_ref())
    }

    /// Finish reason reported with this message, or an empty string.
    pub fn finish_reason(&self) -> &str {
        self.response_meta
            .as_ref()
            .map(|meta| meta.finish_reason.as_str())
            .unwrap_or("")
    }

    /// Whether the message carries multimodal parts.
    pub fn is_multimodal(&self) -> bool {
        !self.parts.is_empty()
    }
}

/// Builder for Message
#[derive(Debug)]
pub struct MessageBuilder {
    message: Message,
}

impl MessageBuilder {
    /// Create a new MessageBuilder with specified role
    pub fn new(role: ChatRole) -> Self {
        Self {
            message: Message {
                role: Some(role),
                ..Message::default()
            },
        }
    }

    /// Set the message content
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.message.content = content.into();
        self
    }

    /// Set the reasoning content
    pub fn reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.message.reasoning_content = reasoning.into();
        self
    }

    /// Append a text part
    pub fn text_part(mut self, text: impl Into<String>) -> Self {
        self.message
            .parts
            .push(ContentPart::Text { text: text.into() });
        self
    }

    /// Append an image part
    pub fn image_url(mut self, url: impl Into<String>) -> Self {
        self.message
            .parts
            .push(ContentPart::ImageUrl { url: url.into() });
        self
    }

    /// Set the tool calls
    pub fn tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.message.tool_calls = calls;
        self
    }

    /// Set the token usage
    pub fn usage(mut self, usage: TokenUsage) -> Self {
        self.message
            .response_meta
            .get_or_insert_with(ResponseMeta::default)
            .usage = Some(usage);
        self
    }

    /// Set the finish reason
    pub fn finish_reason(mut self, reason: impl Into<String>) -> Self {
        self.message
            .response_meta
            .get_or_insert_with(ResponseMeta::default)
            .finish_reason = reason.into();
        self
    }

    /// Build the Message
    pub fn build(self) -> Message {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_usage_and_finish_reason() {
        let msg = Message::assistant()
            .content("hi")
            .usage(TokenUsage::new(3, 4))
            .finish_reason("stop")
            .build();
        assert_eq!(msg.role, Some(ChatRole::Assistant));
        assert_eq!(msg.usage(), Some(&TokenUsage::new(3, 4)));
        assert_eq!(msg.finish_reason(), "stop");
    }

    #[test]
    fn accessors_handle_missing_meta() {
        let msg = Message::user().content("hi").build();
        assert_eq!(msg.usage(), None);
        assert_eq!(msg.finish_reason(), "");
        assert!(!msg.is_multimodal());
    }

    #[test]
    fn parts_serialize_with_type_tag() {
        let msg = Message::user().image_url("https://x/y.png").build();
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["parts"][0]["type"], "image_url");
        assert_eq!(value["role"], "user");
    }
}
