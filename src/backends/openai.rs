//! OpenAI-compatible chat completions client.
//!
//! Works against any endpoint that speaks the `/chat/completions` protocol,
//! with either a single JSON reply or a server-sent event stream.

#[path = "openai/types.rs"]
mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::chat::create_sse_stream;
use crate::chat::Message;
use crate::error::LLMError;
use crate::provider::{CallParam, ModelProvider, Reply};

use types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, StreamOptions, WireMessage,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/";

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Debug)]
pub struct OpenAICompatible {
    client: Client,
    base_url: String,
    api_key: SecretString,
    stream: bool,
    timeout: Option<Duration>,
}

impl OpenAICompatible {
    /// Creates a client; `base_url` defaults to the public OpenAI API.
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Result<Self, LLMError> {
        Self::with_client(Client::new(), api_key, base_url)
    }

    /// Creates a client on top of a caller-configured HTTP client.
    pub fn with_client(
        client: Client,
        api_key: impl Into<String>,
        base_url: Option<String>,
    ) -> Result<Self, LLMError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LLMError::AuthError("Missing API key".to_string()));
        }
        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: SecretString::new(api_key),
            stream: false,
            timeout: None,
        })
    }

    /// Requests streamed replies.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request<'a>(
        &self,
        param: &'a CallParam,
    ) -> Result<ChatCompletionRequest<'a>, LLMError> {
        if param.model.model_name.is_empty() {
            return Err(LLMError::InvalidRequest(
                "model config has no model name".to_string(),
            ));
        }
        Ok(ChatCompletionRequest {
            model: &param.model.model_name,
            messages: param.messages.iter().map(WireMessage::from_message).collect(),
            temperature: param.model.temperature,
            max_tokens: param.model.max_tokens,
            top_p: param.model.top_p,
            stream: self.stream,
            tools: (!param.tools.is_empty()).then_some(param.tools.as_slice()),
            tool_choice: param.tool_choice.as_ref(),
            stream_options: self.stream.then_some(StreamOptions {
                include_usage: true,
            }),
        })
    }

    async fn ensure_success_response(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, LLMError> {
        log::debug!("chat completions HTTP status: {}", response.status());
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response.text().await?;
        Err(LLMError::ProviderError(format!(
            "chat completions returned error status {status}: {error_text}"
        )))
    }
}

#[async_trait]
impl ModelProvider for OpenAICompatible {
    async fn call(&self, param: &CallParam) -> Result<Reply, LLMError> {
        let body = self.build_request(param)?;
        if log::log_enabled!(log::Level::Trace) {
            if let Ok(json) = serde_json::to_string(&body) {
                log::trace!("chat completions request payload: {json}");
            }
        }

        let mut request = self
            .client
            .post(self.completions_url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&body);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        log::debug!(
            "calling model `{}` for evaluator {} ({})",
            param.model.model_name,
            param.evaluator_id,
            param.scenario
        );
        let response = self.ensure_success_response(request.send().await?).await?;

        if self.stream {
            return Ok(Reply::Stream(create_sse_stream(response, parse_stream_event)));
        }

        let text = response.text().await?;
        let parsed: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|e| LLMError::ResponseFormatError {
                message: format!("Failed to decode chat completions response: {e}"),
                raw_response: text.clone(),
            })?;
        Ok(Reply::Complete(parsed.into_message()?))
    }
}

/// Maps one SSE event to a partial message. `[DONE]` and comment-only
/// events yield nothing.
fn parse_stream_event(event: &str) -> Result<Option<Message>, LLMError> {
    let data: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .collect();
    if data.is_empty() {
        return Ok(None);
    }
    let payload = data.join("\n");
    if payload == "[DONE]" {
        return Ok(None);
    }
    let chunk: ChatCompletionChunk =
        serde_json::from_str(&payload).map_err(|e| LLMError::ResponseFormatError {
            message: format!("Failed to decode stream chunk: {e}"),
            raw_response: payload.clone(),
        })?;
    Ok(Some(chunk.into_partial()))
}

#[cfg(test)]
#[path = "openai/tests.rs"]
mod tests;
