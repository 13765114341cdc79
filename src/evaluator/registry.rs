use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EvaluatorError;

use super::types::{Evaluator, EvaluatorInputData, EvaluatorOutputData, EvaluatorType, RunOutcome};
use super::{EvaluatorSource, RunContext};

/// Stores evaluator sources keyed by the evaluator type they execute.
#[derive(Default, Clone)]
pub struct EvaluatorSourceRegistry {
    pub sources: HashMap<EvaluatorType, Arc<dyn EvaluatorSource>>,
}

impl EvaluatorSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    /// Registers a source under its own evaluator type, replacing any
    /// previous one.
    pub fn insert(&mut self, source: Arc<dyn EvaluatorSource>) {
        let evaluator_type = source.evaluator_type();
        if self.sources.insert(evaluator_type, source).is_some() {
            log::warn!("replaced evaluator source for type `{evaluator_type}`");
        }
    }

    pub fn get(&self, evaluator_type: EvaluatorType) -> Option<&Arc<dyn EvaluatorSource>> {
        self.sources.get(&evaluator_type)
    }

    fn source_for(&self, evaluator: &Evaluator) -> Result<&Arc<dyn EvaluatorSource>, EvaluatorError> {
        self.get(evaluator.evaluator_type)
            .ok_or_else(|| EvaluatorError::UnsupportedType(evaluator.evaluator_type.to_string()))
    }

    pub async fn run(
        &self,
        ctx: &RunContext,
        evaluator: &Evaluator,
        input: &EvaluatorInputData,
    ) -> Result<RunOutcome, EvaluatorError> {
        self.source_for(evaluator)?.run(ctx, evaluator, input).await
    }

    pub async fn debug(
        &self,
        ctx: &RunContext,
        evaluator: &Evaluator,
        input: &EvaluatorInputData,
    ) -> Result<EvaluatorOutputData, EvaluatorError> {
        self.source_for(evaluator)?
            .debug(ctx, evaluator, input)
            .await
    }

    pub async fn pre_handle(
        &self,
        ctx: &RunContext,
        evaluator: &mut Evaluator,
    ) -> Result<(), EvaluatorError> {
        let source = Arc::clone(self.source_for(evaluator)?);
        source.pre_handle(ctx, evaluator).await
    }
}

/// Builder pattern for EvaluatorSourceRegistry.
#[derive(Default)]
pub struct EvaluatorSourceRegistryBuilder {
    registry: EvaluatorSourceRegistry,
}

impl EvaluatorSourceRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, source: Arc<dyn EvaluatorSource>) -> Self {
        self.registry.insert(source);
        self
    }

    pub fn build(self) -> EvaluatorSourceRegistry {
        self.registry
    }
}
