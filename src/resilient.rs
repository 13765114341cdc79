//! Retrying wrapper around a [`ModelProvider`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::error::LLMError;
use crate::provider::{CallParam, ModelProvider, Reply};

/// Configuration for retry and backoff behavior.
#[derive(Clone, Debug)]
pub struct ResilienceConfig {
    /// Maximum number of attempts including the first one
    pub max_attempts: usize,
    /// Initial backoff delay in milliseconds
    pub base_delay_ms: u64,
    /// Maximum backoff delay in milliseconds
    pub max_delay_ms: u64,
    /// Whether to subtract a deterministic jitter from backoff delays
    pub jitter: bool,
}

const DEFAULT_MAX_ATTEMPTS: usize = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 200;
const DEFAULT_MAX_DELAY_MS: u64 = 2_000;

impl ResilienceConfig {
    /// Creates a default configuration with sane values.
    pub fn defaults() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter: true,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Retries transient call failures using exponential backoff.
///
/// Only establishing the reply is retried; errors raised while a streamed
/// reply is being drained reach the caller unchanged.
pub struct ResilientProvider {
    inner: Arc<dyn ModelProvider>,
    cfg: ResilienceConfig,
}

impl ResilientProvider {
    pub fn new(inner: Arc<dyn ModelProvider>, cfg: ResilienceConfig) -> Self {
        Self { inner, cfg }
    }

    async fn retry<F, Fut, T>(&self, mut op: F) -> Result<T, LLMError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LLMError>>,
    {
        let max_attempts = self.cfg.max_attempts.max(1);
        let mut last_err: Option<LLMError> = None;

        for attempt in 0..max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !is_retryable(&err) {
                        return Err(err);
                    }
                    if attempt + 1 == max_attempts {
                        last_err = Some(err);
                        break;
                    }
                    log::warn!("model call attempt {} failed, retrying: {err}", attempt + 1);
                    self.backoff_sleep(attempt).await;
                    last_err = Some(err);
                }
            }
        }

        Err(LLMError::RetryExceeded {
            attempts: max_attempts,
            last_error: last_err.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    fn backoff_delay(&self, attempt_index: usize) -> Duration {
        let mut delay = self
            .cfg
            .base_delay_ms
            .saturating_mul(1u64 << attempt_index.min(16));
        delay = delay.min(self.cfg.max_delay_ms);
        if self.cfg.jitter {
            let span = (delay / 2).max(1);
            let jitter = ((attempt_index as u64)
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1))
                % span;
            delay = delay.saturating_sub(jitter);
        }
        Duration::from_millis(delay)
    }

    async fn backoff_sleep(&self, attempt_index: usize) {
        sleep(self.backoff_delay(attempt_index)).await;
    }
}

fn is_retryable(err: &LLMError) -> bool {
    match err {
        LLMError::HttpError(_)
        | LLMError::ProviderError(_)
        | LLMError::ResponseFormatError { .. }
        | LLMError::JsonError(_)
        | LLMError::Generic(_) => true,
        LLMError::Cancelled
        | LLMError::RetryExceeded { .. }
        | LLMError::AuthError(_)
        | LLMError::InvalidRequest(_) => false,
    }
}

#[async_trait]
impl ModelProvider for ResilientProvider {
    async fn call(&self, param: &CallParam) -> Result<Reply, LLMError> {
        self.retry(|| self.inner.call(param)).await
    }
}
