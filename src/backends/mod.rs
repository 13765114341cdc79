//! Model provider backends.

pub mod openai;

pub use openai::OpenAICompatible;
