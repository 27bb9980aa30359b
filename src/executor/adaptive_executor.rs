use std::{sync::Arc, time::Duration};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    executor::{
        BackendError, Check, CheckOutcome, EstimateMonitor, ExecutionBackend, ExecutionError, ExecutionReport, GroupRecord, GroupResult,
        GroupState, ResourceMonitor, ResultHandle, VerificationBackend,
    },
    planner::{ExecutionGroup, ExecutionPlan, ResourceConstraints},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutorConfig {
    #[serde(alias = "poll_interval_millis")]
    pub poll_interval_millis: u64,
    /// Running longer than this counts as resource pressure.
    #[serde(alias = "group_wall_clock_ceiling_millis", skip_serializing_if = "Option::is_none")]
    pub group_wall_clock_ceiling_millis: Option<u64>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll_interval_millis: 50,
            group_wall_clock_ceiling_millis: None,
        }
    }
}

type GroupOutput = Result<(ResultHandle, IndexMap<String, CheckOutcome>), BackendError>;

struct QueuedGroup {
    group: ExecutionGroup,
    parent: Option<String>,
}

struct RunningGroup {
    group: ExecutionGroup,
    parent: Option<String>,
    started: Instant,
    task: JoinHandle<GroupOutput>,
}

/// Bookkeeping owned by a single `execute` call. The polling loop is the
/// only writer.
struct Run {
    pending: Vec<QueuedGroup>,
    running: Vec<RunningGroup>,
    records: IndexMap<String, GroupRecord>,
    results: Vec<GroupResult>,
}

impl Run {
    fn transition(&mut self, group_id: &str, state: GroupState, reason: Option<String>) {
        if let Some(record) = self.records.get_mut(group_id) {
            record.state = state;
            record.reason = reason;
        }
    }

    fn enqueue_record(&mut self, group: &ExecutionGroup, parent: Option<String>) {
        self.records.insert(
            group.group_id.clone(),
            GroupRecord {
                group_id: group.group_id.clone(),
                member_query_ids: group.member_query_ids.clone(),
                state: GroupState::Pending,
                reason: None,
                parent_group_id: parent,
            },
        );
    }

    fn running_memory(&self) -> u64 {
        self.running.iter().map(|entry| entry.group.estimated_memory_bytes).sum()
    }
}

/// Runs an [`ExecutionPlan`] group by group.
///
/// Groups are admitted in plan order while the concurrency and memory
/// budgets allow it, and never ahead of a running group with a lower
/// priority. A polling loop samples every running group; a merged group
/// that errors, exceeds the pressure threshold or outlives the wall-clock
/// ceiling is replaced by its fallback groups at the same priority. A group
/// without a fallback that fails is skipped.
pub struct AdaptiveExecutor<B, V, M = EstimateMonitor> {
    backend: Arc<B>,
    verifier: Arc<V>,
    monitor: Arc<M>,
    checks: Arc<Vec<Check>>,
    config: ExecutorConfig,
    cancel: CancellationToken,
}

impl<B, V> AdaptiveExecutor<B, V, EstimateMonitor>
where
    B: ExecutionBackend,
    V: VerificationBackend,
{
    pub fn new(backend: Arc<B>, verifier: Arc<V>) -> Self {
        Self::with_monitor(backend, verifier, Arc::new(EstimateMonitor))
    }
}

impl<B, V, M> AdaptiveExecutor<B, V, M>
where
    B: ExecutionBackend,
    V: VerificationBackend,
    M: ResourceMonitor,
{
    pub fn with_monitor(backend: Arc<B>, verifier: Arc<V>, monitor: Arc<M>) -> Self {
        Self {
            backend,
            verifier,
            monitor,
            checks: Arc::new(vec![]),
            config: ExecutorConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_checks(mut self, checks: Vec<Check>) -> Self {
        self.checks = Arc::new(checks);
        self
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Cancelling the returned token stops new admissions. Running groups
    /// still reach a terminal state.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn execute(&self, plan: &ExecutionPlan) -> ExecutionReport {
        let mut run = Run {
            pending: vec![],
            running: vec![],
            records: IndexMap::new(),
            results: vec![],
        };
        for group in plan.groups.iter() {
            run.enqueue_record(group, None);
            run.pending.push(QueuedGroup { group: group.clone(), parent: None });
        }
        // Plan documents may be edited between processes; admission relies on this order.
        run.pending.sort_by_key(|queued| queued.group.priority);

        let constraints = plan.resource_constraints;
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.poll_interval_millis.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut cancelled = self.cancel.is_cancelled();

        info!(plan_id = %plan.plan_id, groups = plan.groups.len(), "plan execution started");

        loop {
            if !cancelled {
                self.admit(&mut run, &constraints);
            }
            if run.running.is_empty() && (cancelled || run.pending.is_empty()) {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled(), if !cancelled => {
                    info!(plan_id = %plan.plan_id, running = run.running.len(), "cancellation requested");
                    cancelled = true;
                }
                _ = ticker.tick() => {}
            }

            self.poll(&mut run, &constraints).await;
        }

        for queued in std::mem::take(&mut run.pending) {
            warn!(group_id = %queued.group.group_id, "group skipped: execution cancelled");
            run.transition(&queued.group.group_id, GroupState::Skipped, Some(ExecutionError::Cancelled.to_string()));
        }

        info!(
            plan_id = %plan.plan_id,
            completed = run.results.len(),
            cancelled = cancelled,
            "plan execution finished"
        );

        ExecutionReport {
            plan_id: plan.plan_id,
            results: run.results,
            records: run.records.into_values().collect(),
            cancelled,
        }
    }

    fn admit(&self, run: &mut Run, constraints: &ResourceConstraints) {
        let max_concurrent = constraints.max_concurrent_groups.max(1);

        while let Some(next) = run.pending.first() {
            let priority = next.group.priority;
            if run.running.iter().any(|entry| entry.group.priority < priority) {
                break;
            }
            if run.running.len() >= max_concurrent {
                break;
            }
            let memory = run.running_memory().saturating_add(next.group.estimated_memory_bytes);
            if !run.running.is_empty() && memory > constraints.memory_budget_bytes {
                break;
            }

            let queued = run.pending.remove(0);
            info!(
                group_id = %queued.group.group_id,
                priority = queued.group.priority,
                members = ?queued.group.member_query_ids,
                "group admitted"
            );
            run.transition(&queued.group.group_id, GroupState::Running, None);
            let task = self.spawn(&queued.group);
            run.running.push(RunningGroup {
                group: queued.group,
                parent: queued.parent,
                started: Instant::now(),
                task,
            });
        }
    }

    fn spawn(&self, group: &ExecutionGroup) -> JoinHandle<GroupOutput> {
        let backend = Arc::clone(&self.backend);
        let verifier = Arc::clone(&self.verifier);
        let checks = Arc::clone(&self.checks);
        let sql = group.sql.clone();

        tokio::spawn(async move {
            let handle = backend.execute(&sql).await?;
            let outcomes = verifier.verify(&handle, &checks).await?;
            Ok::<_, BackendError>((handle, outcomes))
        })
    }

    async fn poll(&self, run: &mut Run, constraints: &ResourceConstraints) {
        let limit_bytes = constraints.pressure_limit_bytes();

        for entry in std::mem::take(&mut run.running) {
            let elapsed = entry.started.elapsed();
            let observed_bytes = self.monitor.observed_bytes(&entry.group, elapsed);

            if observed_bytes > limit_bytes {
                entry.task.abort();
                let error = ExecutionError::ResourcePressure {
                    group_id: entry.group.group_id.clone(),
                    observed_bytes,
                    limit_bytes,
                };
                self.fail(run, entry.group, entry.parent, error);
                continue;
            }

            if !entry.task.is_finished() {
                let ceiling = self.config.group_wall_clock_ceiling_millis.map(Duration::from_millis);
                if ceiling.is_some_and(|ceiling| elapsed > ceiling) {
                    entry.task.abort();
                    let error = ExecutionError::WallClockExceeded {
                        group_id: entry.group.group_id.clone(),
                        elapsed_millis: elapsed.as_millis() as u64,
                    };
                    self.fail(run, entry.group, entry.parent, error);
                } else {
                    run.running.push(entry);
                }
                continue;
            }

            let output = match entry.task.await {
                Ok(output) => output,
                Err(join_error) => Err(BackendError::new(format!("group task ended abnormally: {join_error}"))),
            };
            match output {
                Ok((handle, check_outcomes)) => {
                    let runtime_millis = entry.started.elapsed().as_millis() as u64;
                    info!(
                        group_id = %entry.group.group_id,
                        rows = handle.row_count,
                        runtime_millis = runtime_millis,
                        "group completed"
                    );
                    run.transition(&entry.group.group_id, GroupState::Completed, None);
                    run.results.push(GroupResult {
                        group_id: entry.group.group_id,
                        member_query_ids: entry.group.member_query_ids,
                        row_count: handle.row_count,
                        columns: handle.columns,
                        check_outcomes,
                        runtime_millis,
                        fallback_triggered: entry.parent.is_some(),
                    });
                }
                Err(backend_error) => {
                    let error = ExecutionError::Backend {
                        group_id: entry.group.group_id.clone(),
                        detail: backend_error.message,
                    };
                    self.fail(run, entry.group, entry.parent, error);
                }
            }
        }
    }

    /// Moves a failed group to `FailedFallback` and queues its replacements
    /// ahead of every pending group of the same or a later priority, or
    /// skips it when nothing can replace it.
    fn fail(&self, run: &mut Run, group: ExecutionGroup, parent: Option<String>, error: ExecutionError) {
        if error.triggers_fallback() && group.has_fallback() {
            warn!(
                group_id = %group.group_id,
                error = %error,
                fallback_groups = group.fallback.len(),
                "group failed, switching to fallback"
            );
            run.transition(&group.group_id, GroupState::FailedFallback, Some(error.to_string()));

            let at = run
                .pending
                .iter()
                .position(|queued| queued.group.priority >= group.priority)
                .unwrap_or(run.pending.len());
            for (offset, fallback) in group.fallback.iter().enumerate() {
                run.enqueue_record(fallback, Some(group.group_id.clone()));
                run.pending.insert(at + offset, QueuedGroup { group: fallback.clone(), parent: Some(group.group_id.clone()) });
            }
            return;
        }

        let exhausted = ExecutionError::FallbackExhausted {
            group_id: group.group_id.clone(),
            cause: error.to_string(),
        };
        warn!(group_id = %group.group_id, parent = ?parent, error = %exhausted, "group skipped");
        run.transition(&group.group_id, GroupState::Skipped, Some(exhausted.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use crate::{
        analyzer::{BatchAnalysis, RawQuery},
        executor::{
            _tests::fixtures::{orders_backend, FixedMonitor, ScriptedBackend},
            AdaptiveExecutor, Check, CheckKind, CheckStatus, ExecutorConfig, GroupState, RowVerifier,
        },
        planner::{CostModel, ExecutionPlan, PlanBuilder, ResourceConstraints},
    };

    fn plan(texts: &[&str], constraints: ResourceConstraints) -> ExecutionPlan {
        let cost_model = CostModel::default();
        let analysis = BatchAnalysis::analyze(&RawQuery::from_texts(texts));
        PlanBuilder::new(&cost_model, constraints).build(&analysis).expect("Failed to build plan")
    }

    fn fast() -> ExecutorConfig {
        ExecutorConfig { poll_interval_millis: 5, group_wall_clock_ceiling_millis: None }
    }

    const MERGEABLE: [&str; 2] = ["SELECT id, amount FROM orders WHERE status = 'active'", "SELECT region FROM orders"];

    #[tokio::test]
    pub async fn test_all_groups_complete() {
        let plan = plan(&MERGEABLE, ResourceConstraints::default());
        let executor = AdaptiveExecutor::new(Arc::new(orders_backend()), Arc::new(RowVerifier))
            .with_checks(vec![Check::new("amount-complete", "amount", CheckKind::Completeness)])
            .with_config(fast());

        let report = executor.execute(&plan).await;

        assert!(!report.cancelled);
        assert_eq!(report.results.len(), 1);
        let result = &report.results[0];
        assert_eq!(result.member_query_ids, vec!["q1", "q2"]);
        assert_eq!(result.row_count, 4);
        assert!(!result.fallback_triggered);
        assert_eq!(result.check_outcomes["amount-complete"].status, CheckStatus::Failed);
        assert_eq!(report.records[0].state, GroupState::Completed);
    }

    #[tokio::test]
    pub async fn test_resource_pressure_switches_to_fallback() {
        let plan = plan(&MERGEABLE, ResourceConstraints::default());
        let monitor = FixedMonitor { consolidated_bytes: u64::MAX, individual_bytes: 0 };
        let executor = AdaptiveExecutor::with_monitor(Arc::new(orders_backend()), Arc::new(RowVerifier), Arc::new(monitor))
            .with_config(fast());

        let report = executor.execute(&plan).await;

        let merged = report.record("g1").expect("Failed to find merged record");
        assert_eq!(merged.state, GroupState::FailedFallback);
        assert!(merged.reason.as_deref().is_some_and(|reason| reason.contains("pressure limit")));

        assert_eq!(report.results.len(), 2);
        for result in report.results.iter() {
            assert!(result.fallback_triggered);
        }
        let first = report.record("g1-f1").expect("Failed to find fallback record");
        assert_eq!(first.state, GroupState::Completed);
        assert_eq!(first.parent_group_id.as_deref(), Some("g1"));
        assert_eq!(report.result("g1-f1").map(|result| result.row_count), Some(2));
    }

    #[tokio::test]
    pub async fn test_failing_fallback_is_skipped() {
        let plan = plan(&MERGEABLE, ResourceConstraints::default());
        let backend = ScriptedBackend::new().failing("region");
        let executor = AdaptiveExecutor::new(Arc::new(backend), Arc::new(RowVerifier)).with_config(fast());

        let report = executor.execute(&plan).await;

        assert_eq!(report.record("g1").map(|record| record.state), Some(GroupState::FailedFallback));
        assert_eq!(report.record("g1-f1").map(|record| record.state), Some(GroupState::Completed));

        let skipped = report.record("g1-f2").expect("Failed to find fallback record");
        assert_eq!(skipped.state, GroupState::Skipped);
        assert!(skipped.reason.as_deref().is_some_and(|reason| reason.contains("no fallback left")));
    }

    #[tokio::test]
    pub async fn test_individual_failure_is_skipped() {
        let plan = plan(&["SELECT id FROM orders ORDER BY id"], ResourceConstraints::default());
        let executor = AdaptiveExecutor::new(Arc::new(orders_backend()), Arc::new(RowVerifier)).with_config(fast());

        let report = executor.execute(&plan).await;

        assert!(report.results.is_empty());
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].state, GroupState::Skipped);
    }

    #[tokio::test]
    pub async fn test_lower_priority_runs_first() {
        let plan = plan(
            &[
                "SELECT a FROM t1 WHERE a IN (SELECT b FROM t2)",
                "SELECT a FROM t3",
                "SELECT a FROM t4",
            ],
            ResourceConstraints::default(),
        );
        let backend = ScriptedBackend::new().with_delay(Duration::from_millis(20));
        let log = backend.log();
        let executor = AdaptiveExecutor::new(Arc::new(backend), Arc::new(RowVerifier)).with_config(fast());

        let report = executor.execute(&plan).await;

        assert_eq!(report.results.len(), 3);
        let started = log.lock().expect("Failed to lock log").clone();
        assert_eq!(started.last().map(String::as_str), Some("SELECT a FROM t1 WHERE a IN (SELECT b FROM t2)"));
    }

    #[tokio::test]
    pub async fn test_reordered_plan_still_runs_by_priority() {
        let mut plan = plan(
            &[
                "SELECT a FROM t1 WHERE a IN (SELECT b FROM t2)",
                "SELECT a FROM t3",
                "SELECT a FROM t4",
            ],
            ResourceConstraints::default(),
        );
        plan.groups.reverse();
        assert!(plan.groups[0].priority > plan.groups[1].priority);
        let backend = ScriptedBackend::new().with_delay(Duration::from_millis(20));
        let log = backend.log();
        let executor = AdaptiveExecutor::new(Arc::new(backend), Arc::new(RowVerifier)).with_config(fast());

        let report = executor.execute(&plan).await;

        assert_eq!(report.results.len(), 3);
        let started = log.lock().expect("Failed to lock log").clone();
        assert_eq!(started.len(), 3);
        assert_eq!(started.last().map(String::as_str), Some("SELECT a FROM t1 WHERE a IN (SELECT b FROM t2)"));
    }

    #[tokio::test]
    pub async fn test_concurrency_limit() {
        let texts = ["SELECT a FROM t1", "SELECT a FROM t2", "SELECT a FROM t3"];
        let constraints = ResourceConstraints { max_concurrent_groups: 1, ..ResourceConstraints::default() };
        let backend = ScriptedBackend::new().with_delay(Duration::from_millis(10));
        let peak = backend.peak();
        let executor = AdaptiveExecutor::new(Arc::new(backend), Arc::new(RowVerifier)).with_config(fast());

        let report = executor.execute(&plan(&texts, constraints)).await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(peak.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    pub async fn test_memory_budget_admits_one_oversize_group_at_a_time() {
        let texts = ["SELECT a FROM t1", "SELECT a FROM t2", "SELECT a FROM t3"];
        let constraints = ResourceConstraints { memory_budget_bytes: 1, ..ResourceConstraints::default() };
        let backend = ScriptedBackend::new().with_delay(Duration::from_millis(10));
        let peak = backend.peak();
        let monitor = FixedMonitor { consolidated_bytes: 0, individual_bytes: 0 };
        let executor = AdaptiveExecutor::with_monitor(Arc::new(backend), Arc::new(RowVerifier), Arc::new(monitor))
            .with_config(fast());

        let report = executor.execute(&plan(&texts, constraints)).await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(peak.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    pub async fn test_wall_clock_ceiling() {
        let plan = plan(&MERGEABLE, ResourceConstraints::default());
        let backend = ScriptedBackend::new().with_delay(Duration::from_millis(500));
        let config = ExecutorConfig { poll_interval_millis: 5, group_wall_clock_ceiling_millis: Some(20) };
        let executor = AdaptiveExecutor::new(Arc::new(backend), Arc::new(RowVerifier)).with_config(config);

        let report = executor.execute(&plan).await;

        let merged = report.record("g1").expect("Failed to find merged record");
        assert_eq!(merged.state, GroupState::FailedFallback);
        assert!(merged.reason.as_deref().is_some_and(|reason| reason.contains("wall-clock")));
        assert!(report.results.is_empty());
        assert_eq!(report.records.iter().filter(|record| record.state == GroupState::Skipped).count(), 2);
    }

    #[tokio::test]
    pub async fn test_cancelled_before_start() {
        let plan = plan(&MERGEABLE, ResourceConstraints::default());
        let executor = AdaptiveExecutor::new(Arc::new(orders_backend()), Arc::new(RowVerifier)).with_config(fast());
        executor.cancellation_token().cancel();

        let report = executor.execute(&plan).await;

        assert!(report.cancelled);
        assert!(report.results.is_empty());
        assert_eq!(report.records[0].state, GroupState::Skipped);
        assert_eq!(report.records[0].reason.as_deref(), Some("execution cancelled before the group was admitted"));
    }

    #[tokio::test]
    pub async fn test_cancellation_lets_running_groups_finish() {
        let texts = ["SELECT a FROM t1", "SELECT a FROM t2", "SELECT a FROM t3"];
        let constraints = ResourceConstraints { max_concurrent_groups: 1, ..ResourceConstraints::default() };
        let backend = ScriptedBackend::new().with_delay(Duration::from_millis(60));
        let executor = AdaptiveExecutor::new(Arc::new(backend), Arc::new(RowVerifier)).with_config(fast());
        let token = executor.cancellation_token();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        let report = executor.execute(&plan(&texts, constraints)).await;

        assert!(report.cancelled);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.records[0].state, GroupState::Completed);
        assert_eq!(report.records[1].state, GroupState::Skipped);
        assert_eq!(report.records[2].state, GroupState::Skipped);
    }
}
