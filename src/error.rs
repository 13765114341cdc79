use thiserror::Error;

/// Error types that can occur when calling a model provider.
#[derive(Debug, Error)]
pub enum LLMError {
    /// HTTP request/response errors
    #[error("HTTP error: {0}")]
    HttpError(String),
    /// Authentication and authorization errors
    #[error("Auth error: {0}")]
    AuthError(String),
    /// Invalid request parameters or format
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Errors returned by the LLM provider
    #[error("Provider error: {0}")]
    ProviderError(String),
    /// API response parsing or format error
    #[error("Response format error: {message}. Raw response: {raw_response}")]
    ResponseFormatError {
        message: String,
        raw_response: String,
    },
    /// Generic error
    #[error("Generic error: {0}")]
    Generic(String),
    /// JSON serialization/deserialization errors
    #[error("JSON parse error: {0}")]
    JsonError(String),
    /// The caller cancelled the run while the provider call was in flight
    #[error("model call cancelled")]
    Cancelled,
    /// Retry attempts exceeded
    #[error("Retry attempts exceeded after {attempts} tries: {last_error}")]
    RetryExceeded { attempts: usize, last_error: String },
}

/// Converts reqwest HTTP errors into LlmErrors
impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        LLMError::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for LLMError {
    fn from(err: serde_json::Error) -> Self {
        LLMError::JsonError(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}

/// Hard errors of the evaluator engine.
///
/// Ordinary evaluation failures (provider errors, unparsable replies) are not
/// reported here; they surface as a failed run status with a run error inside
/// the output.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    /// The evaluator definition cannot be executed as given
    #[error("invalid evaluator: {0}")]
    InvalidEvaluator(String),
    /// Keyed configuration has no entry for a required key
    #[error("unresolved {what} for key `{key}`")]
    Unresolved { what: &'static str, key: String },
    /// No evaluator source is registered for the evaluator's type tag
    #[error("unsupported evaluator type: {0}")]
    UnsupportedType(String),
    /// A debug run finished with a failed status
    #[error("evaluator run failed: {0}")]
    RunFailed(String),
}
