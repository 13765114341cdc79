use std::time::Duration;

use super::types::EvaluatorType;

/// One finished run as reported to the metrics sink.
#[derive(Debug, Clone, PartialEq)]
pub struct RunMetric {
    pub space_id: i64,
    pub evaluator_id: i64,
    pub evaluator_type: EvaluatorType,
    pub elapsed: Duration,
    /// Failure message, `None` for a successful run
    pub error: Option<String>,
}

/// Sink for per-run metrics. Emission is fire-and-forget.
pub trait EvaluatorMetrics: Send + Sync {
    fn emit_run(&self, metric: &RunMetric);
}

/// Reports runs through the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMetrics;

impl EvaluatorMetrics for LogMetrics {
    fn emit_run(&self, metric: &RunMetric) {
        match &metric.error {
            None => log::info!(
                "evaluator run ok: space={} evaluator={} type={} elapsed_ms={}",
                metric.space_id,
                metric.evaluator_id,
                metric.evaluator_type,
                metric.elapsed.as_millis()
            ),
            Some(err) => log::info!(
                "evaluator run failed: space={} evaluator={} type={} elapsed_ms={} error={err}",
                metric.space_id,
                metric.evaluator_id,
                metric.evaluator_type,
                metric.elapsed.as_millis()
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl EvaluatorMetrics for NoopMetrics {
    fn emit_run(&self, _metric: &RunMetric) {}
}
