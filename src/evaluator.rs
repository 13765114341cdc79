//! Evaluator definitions and their execution.

#[path = "evaluator/types.rs"]
mod types;

#[path = "evaluator/template.rs"]
mod template;

#[path = "evaluator/parse.rs"]
mod parse;

#[path = "evaluator/metrics.rs"]
mod metrics;

#[path = "evaluator/preprocess.rs"]
mod preprocess;

#[path = "evaluator/prompt.rs"]
mod prompt;

#[path = "evaluator/registry.rs"]
mod registry;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::EvaluatorError;

pub use metrics::{EvaluatorMetrics, LogMetrics, NoopMetrics, RunMetric};
pub use parse::{parse_output, ParseError, ParseFailure};
pub use preprocess::Preprocessor;
pub use prompt::PromptEvaluatorSource;
pub use registry::{EvaluatorSourceRegistry, EvaluatorSourceRegistryBuilder};
pub use types::{
    Content, Evaluator, EvaluatorInputData, EvaluatorOutputData, EvaluatorResult,
    EvaluatorRunError, EvaluatorType, EvaluatorUsage, MessageTemplate, ModelConfig, ParseType,
    PromptEvaluatorVersion, RunErrorKind, RunOutcome, RunStatus,
};

/// Per-call context: cancellation and the caller's locale.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    cancel: CancellationToken,
    locale: Option<String>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Executes evaluators of one [`EvaluatorType`].
#[async_trait]
pub trait EvaluatorSource: Send + Sync {
    fn evaluator_type(&self) -> EvaluatorType;

    /// Runs the evaluator. Provider and output failures come back as a
    /// `Fail` outcome; only unusable evaluator definitions are errors.
    async fn run(
        &self,
        ctx: &RunContext,
        evaluator: &Evaluator,
        input: &EvaluatorInputData,
    ) -> Result<RunOutcome, EvaluatorError>;

    /// Like [`run`](Self::run) in the debug scenario, with a failed run
    /// reported as [`EvaluatorError::RunFailed`].
    async fn debug(
        &self,
        ctx: &RunContext,
        evaluator: &Evaluator,
        input: &EvaluatorInputData,
    ) -> Result<EvaluatorOutputData, EvaluatorError>;

    /// Resolves keyed configuration into the evaluator before it is stored
    /// or run.
    async fn pre_handle(
        &self,
        ctx: &RunContext,
        evaluator: &mut Evaluator,
    ) -> Result<(), EvaluatorError>;
}
