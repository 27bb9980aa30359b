use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    analyzer::{AnalysisError, BatchAnalysis, RawQuery},
    config::EngineConfig,
    executor::{
        AdaptiveExecutor, EstimateMonitor, ExecutionBackend, ExecutionReport, ResourceMonitor, RowVerifier, VerificationBackend,
    },
    planner::{ExecutionPlan, PlanBuilder},
    report::{BatchReport, ResultAggregator},
};

/// Analyze, plan, execute and aggregate behind one handle.
///
/// Each stage is also exposed on its own so the stages can run in separate
/// processes over the serialized plan and execution report.
pub struct ConsolidationEngine<B, V = RowVerifier, M = EstimateMonitor> {
    config: EngineConfig,
    executor: AdaptiveExecutor<B, V, M>,
}

impl<B> ConsolidationEngine<B, RowVerifier, EstimateMonitor>
where
    B: ExecutionBackend,
{
    pub fn new(config: EngineConfig, backend: Arc<B>) -> Self {
        Self::with_parts(config, backend, Arc::new(RowVerifier), Arc::new(EstimateMonitor))
    }
}

impl<B, V, M> ConsolidationEngine<B, V, M>
where
    B: ExecutionBackend,
    V: VerificationBackend,
    M: ResourceMonitor,
{
    pub fn with_parts(config: EngineConfig, backend: Arc<B>, verifier: Arc<V>, monitor: Arc<M>) -> Self {
        let executor = AdaptiveExecutor::with_monitor(backend, verifier, monitor)
            .with_checks(config.checks.clone())
            .with_config(config.executor);
        Self { config, executor }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.executor.cancellation_token()
    }

    pub fn plan(&self, batch: &[RawQuery]) -> Result<ExecutionPlan, AnalysisError> {
        Self::plan_with(&self.config, batch)
    }

    /// Planning needs no backend; this is what the `plan` stage runs.
    pub fn plan_with(config: &EngineConfig, batch: &[RawQuery]) -> Result<ExecutionPlan, AnalysisError> {
        let analysis = BatchAnalysis::analyze(batch);
        PlanBuilder::new(&config.cost, config.resources).build(&analysis)
    }

    pub async fn execute(&self, plan: &ExecutionPlan) -> ExecutionReport {
        self.executor.execute(plan).await
    }

    pub fn aggregate(&self, plan: &ExecutionPlan, execution: &ExecutionReport) -> BatchReport {
        ResultAggregator::new(&self.config.checks).aggregate(plan, execution)
    }

    pub async fn run(&self, batch: &[RawQuery]) -> Result<(ExecutionPlan, BatchReport), AnalysisError> {
        let plan = self.plan(batch)?;
        let execution = self.execute(&plan).await;
        let report = self.aggregate(&plan, &execution);
        info!(plan_id = %plan.plan_id, queries = batch.len(), "batch run finished");
        Ok((plan, report))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        analyzer::{AnalysisError, RawQuery},
        config::EngineConfig,
        engine::ConsolidationEngine,
        executor::{_tests::fixtures::orders_backend, Check, CheckKind, CheckStatus},
        report::QueryStatus,
    };

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.executor.poll_interval_millis = 5;
        config.checks = vec![
            Check::new("amount-complete", "amount", CheckKind::Completeness),
            Check::new("amount-positive", "amount", CheckKind::Positivity),
        ];
        config
    }

    #[tokio::test]
    pub async fn test_run_batch() {
        let engine = ConsolidationEngine::new(config(), Arc::new(orders_backend()));
        let batch = RawQuery::from_texts(&[
            "SELECT id, amount FROM orders WHERE status = 'active'",
            "SELECT region FROM orders",
            "SELECT amount FROM orders WHERE amount > 100",
            "SELECT nonsense",
        ]);

        let (plan, report) = engine.run(&batch).await.expect("Failed to run batch");

        assert_eq!(plan.groups.len(), 1);
        assert_eq!(plan.groups[0].member_query_ids, vec!["q1", "q2", "q3"]);
        assert_eq!(report.queries.len(), 4);
        assert_eq!(report.queries["q4"].status, QueryStatus::ParseFailed);

        let first = &report.queries["q1"];
        assert_eq!(first.status, QueryStatus::Completed);
        assert_eq!(first.row_count, Some(4));
        assert_eq!(first.check_outcomes["amount-complete"].status, CheckStatus::Failed);
        assert!(report.queries["q2"].check_outcomes.is_empty());
    }

    #[tokio::test]
    pub async fn test_run_empty_batch() {
        let engine = ConsolidationEngine::new(config(), Arc::new(orders_backend()));

        let result = engine.run(&RawQuery::from_texts(&["UPDATE orders SET a = 1"])).await;

        match result {
            Err(AnalysisError::EmptyBatch { rejected }) => {
                assert_eq!(rejected.len(), 1);
                assert_eq!(rejected[0].query_id(), Some("q1"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}
