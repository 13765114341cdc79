use std::sync::OnceLock;

use regex::Regex;

use crate::chat::{ChatRole, ContentPart, Message};
use crate::error::EvaluatorError;

use super::types::{Content, EvaluatorInputData, MessageTemplate};

const PLACEHOLDER: &str = r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}";

fn placeholder_pattern() -> Result<&'static Regex, EvaluatorError> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    if let Some(pattern) = PATTERN.get() {
        return Ok(pattern);
    }
    let pattern = Regex::new(PLACEHOLDER)
        .map_err(|e| EvaluatorError::InvalidEvaluator(format!("placeholder pattern: {e}")))?;
    Ok(PATTERN.get_or_init(|| pattern))
}

/// Renders every message template against the input fields.
pub(crate) fn render_messages(
    templates: &[MessageTemplate],
    input: &EvaluatorInputData,
) -> Result<Vec<Message>, EvaluatorError> {
    let pattern = placeholder_pattern()?;
    Ok(templates
        .iter()
        .map(|template| render_one(pattern, template, input))
        .collect())
}

fn render_one(pattern: &Regex, template: &MessageTemplate, input: &EvaluatorInputData) -> Message {
    let mut parts = PartsBuilder::default();
    let mut last = 0;
    for captures in pattern.captures_iter(&template.content) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        parts.push_text(&template.content[last..whole.start()]);
        match input.input_fields.get(name.as_str()) {
            Some(value) => parts.push_content(value),
            None => log::debug!("no input field for placeholder `{}`", name.as_str()),
        }
        last = whole.end();
    }
    parts.push_text(&template.content[last..]);

    let mut message = Message {
        role: Some(template.role),
        ..Message::default()
    };
    if parts.has_image {
        message.parts = parts.finish();
    } else {
        message.content = parts.text;
    }
    message
}

#[derive(Default)]
struct PartsBuilder {
    parts: Vec<ContentPart>,
    text: String,
    has_image: bool,
}

impl PartsBuilder {
    fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn push_content(&mut self, content: &Content) {
        match content {
            Content::Text { text } => self.push_text(text),
            Content::Image { url } => {
                self.flush_text();
                self.parts.push(ContentPart::ImageUrl { url: url.clone() });
                self.has_image = true;
            }
            Content::MultiPart { parts } => {
                for part in parts {
                    self.push_content(part);
                }
            }
        }
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            let text = std::mem::take(&mut self.text);
            self.parts.push(ContentPart::Text { text });
        }
    }

    fn finish(mut self) -> Vec<ContentPart> {
        self.flush_text();
        self.parts
    }
}

/// Appends the prompt suffix to the first system message, prepending a
/// system message when there is none.
pub(crate) fn append_suffix(messages: &mut Vec<Message>, suffix: &str) {
    if suffix.trim().is_empty() {
        return;
    }
    let system = messages
        .iter()
        .position(|message| message.role == Some(ChatRole::System));
    match system.map(|idx| &mut messages[idx]) {
        Some(message) if message.is_multimodal() => {
            message.parts.push(ContentPart::Text {
                text: format!("\n{suffix}"),
            });
        }
        Some(message) if message.content.is_empty() => message.content = suffix.to_string(),
        Some(message) => {
            message.content.push('\n');
            message.content.push_str(suffix);
        }
        None => messages.insert(0, Message::system().content(suffix).build()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_text_placeholders() {
        let templates = vec![MessageTemplate::new(
            ChatRole::User,
            "Question: {{input}}\nAnswer: {{ output }}\nRef: {{missing}}!",
        )];
        let input = EvaluatorInputData::default()
            .with_text("input", "2+2?")
            .with_text("output", "4");

        let messages = render_messages(&templates, &input).unwrap();

        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Some(ChatRole::User));
        assert_eq!(messages[0].content, "Question: 2+2?\nAnswer: 4\nRef: !");
        assert!(!messages[0].is_multimodal());
    }

    #[test]
    fn image_fields_produce_multimodal_parts() {
        let templates = vec![MessageTemplate::new(
            ChatRole::User,
            "Look at {{picture}} and rate it",
        )];
        let input = EvaluatorInputData::default().with_field(
            "picture",
            Content::MultiPart {
                parts: vec![Content::text("this "), Content::image("https://img/1.png")],
            },
        );

        let messages = render_messages(&templates, &input).unwrap();

        assert!(messages[0].content.is_empty());
        assert_eq!(
            messages[0].parts,
            vec![
                ContentPart::Text {
                    text: "Look at this ".into()
                },
                ContentPart::ImageUrl {
                    url: "https://img/1.png".into()
                },
                ContentPart::Text {
                    text: " and rate it".into()
                },
            ]
        );
    }

    #[test]
    fn suffix_goes_to_first_system_message() {
        let mut messages = vec![
            Message::user().content("hi").build(),
            Message::system().content("judge").build(),
        ];
        append_suffix(&mut messages, "answer in JSON");
        assert_eq!(messages[1].content, "judge\nanswer in JSON");
        assert_eq!(messages[0].content, "hi");
    }

    #[test]
    fn suffix_without_system_message_is_prepended() {
        let mut messages = vec![Message::user().content("hi").build()];
        append_suffix(&mut messages, "answer in JSON");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Some(ChatRole::System));
        assert_eq!(messages[0].content, "answer in JSON");
    }

    #[test]
    fn blank_suffix_is_ignored() {
        let mut messages = vec![Message::user().content("hi").build()];
        append_suffix(&mut messages, "  ");
        assert_eq!(messages, vec![Message::user().content("hi").build()]);
    }
}
