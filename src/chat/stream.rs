use std::pin::Pin;

use futures::stream::{Stream, StreamExt};

use crate::error::LLMError;
use crate::ToolCall;

use super::message::{ChatRole, ContentPart, Message, ResponseMeta};
use super::usage::TokenUsage;

/// Stream of partial messages produced by a streaming model reply.
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<Message, LLMError>> + Send>>;

/// Drains a reply stream eagerly. The first stream error aborts collection.
pub async fn collect_stream(mut stream: MessageStream) -> Result<Vec<Message>, LLMError> {
    let mut partials = Vec::new();
    while let Some(partial) = stream.next().await {
        partials.push(partial?);
    }
    Ok(partials)
}

/// Folds ordered partial messages into one message.
///
/// Text fields and multimodal parts concatenate in stream order, the role and
/// finish reason come from the first partial that carries one, and usage comes
/// from the last partial that carries one. Tool calls are merged slot by slot:
/// an explicit `index` names the slot, otherwise the call's position in its
/// partial does, unless it carries an id different from the one already in
/// that slot, in which case it opens a new slot.
///
/// A single partial is returned unchanged; an empty slice is a caller error.
pub fn merge_messages(partials: &[Message]) -> Result<Message, LLMError> {
    match partials {
        [] => Err(LLMError::InvalidRequest(
            "cannot merge an empty message stream".to_string(),
        )),
        [single] => Ok(single.clone()),
        _ => {
            let mut merger = MessageMerger::default();
            for partial in partials {
                merger.push(partial);
            }
            Ok(merger.finish())
        }
    }
}

#[derive(Default)]
struct MessageMerger {
    role: Option<ChatRole>,
    content: String,
    reasoning_content: String,
    parts: Vec<ContentPart>,
    tool_calls: Vec<ToolCall>,
    finish_reason: String,
    usage: Option<TokenUsage>,
    saw_meta: bool,
}

impl MessageMerger {
    fn push(&mut self, partial: &Message) {
        if self.role.is_none() {
            self.role = partial.role;
        }
        self.content.push_str(&partial.content);
        self.reasoning_content.push_str(&partial.reasoning_content);
        self.parts.extend(partial.parts.iter().cloned());

        for (position, call) in partial.tool_calls.iter().enumerate() {
            self.merge_tool_call(position, call);
        }

        if let Some(meta) = &partial.response_meta {
            self.saw_meta = true;
            if self.finish_reason.is_empty() {
                self.finish_reason = meta.finish_reason.clone();
            }
            if meta.usage.is_some() {
                self.usage = meta.usage;
            }
        }
    }

    fn merge_tool_call(&mut self, position: usize, call: &ToolCall) {
        match self.slot_for(position, call) {
            Some(slot) => absorb_tool_call(&mut self.tool_calls[slot], call),
            None => {
                log::debug!(
                    "opening tool call slot {} (index {:?}, id {:?})",
                    self.tool_calls.len(),
                    call.index,
                    call.id
                );
                self.tool_calls.push(call.clone());
            }
        }
    }

    fn slot_for(&self, position: usize, call: &ToolCall) -> Option<usize> {
        if let Some(index) = call.index {
            return self
                .tool_calls
                .iter()
                .position(|slot| slot.index == Some(index));
        }
        let slot = self.tool_calls.get(position)?;
        if !call.id.is_empty() && !slot.id.is_empty() && call.id != slot.id {
            return None;
        }
        Some(position)
    }

    fn finish(self) -> Message {
        let response_meta = if self.saw_meta {
            Some(ResponseMeta {
                finish_reason: self.finish_reason,
                usage: self.usage,
            })
        } else {
            None
        };
        Message {
            role: self.role,
            content: self.content,
            reasoning_content: self.reasoning_content,
            parts: self.parts,
            tool_calls: self.tool_calls,
            response_meta,
        }
    }
}

fn absorb_tool_call(slot: &mut ToolCall, call: &ToolCall) {
    if slot.id.is_empty() {
        slot.id = call.id.clone();
    }
    if slot.call_type.is_empty() {
        slot.call_type = call.call_type.clone();
    }
    if slot.function.name.is_empty() {
        slot.function.name = call.function.name.clone();
    }
    slot.function.arguments.push_str(&call.function.arguments);
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
