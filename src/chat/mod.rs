mod message;
#[cfg(feature = "openai")]
mod sse;
mod stream;
mod tool;
mod usage;

pub use message::{ChatRole, ContentPart, Message, MessageBuilder, ResponseMeta};
pub use stream::{collect_stream, merge_messages, MessageStream};
pub use tool::{FunctionTool, ParameterProperty, ParametersSchema, Tool, ToolChoice};
pub use usage::TokenUsage;

#[cfg(feature = "openai")]
pub(crate) use sse::create_sse_stream;
