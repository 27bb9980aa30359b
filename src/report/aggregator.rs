use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    analyzer::AnalysisError,
    executor::{Check, CheckOutcome, ExecutionError, ExecutionReport, GroupResult, GroupState},
    planner::{ExecutionGroup, ExecutionPlan},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryStatus {
    Completed,
    CompletedViaFallback,
    Skipped,
    ParseFailed,
}

/// What happened to one submitted query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryReport {
    pub query_id: String,
    pub status: QueryStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    pub fallback_triggered: bool,
    #[serde(default)]
    pub check_outcomes: IndexMap<String, CheckOutcome>,
    /// Set when the numbers describe a merged row set rather than the query's own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl QueryReport {
    fn without_result(query_id: &str, status: QueryStatus, group_id: Option<String>, reason: String) -> Self {
        Self {
            query_id: query_id.to_string(),
            status,
            group_id,
            reason: Some(reason),
            row_count: None,
            fallback_triggered: false,
            check_outcomes: IndexMap::new(),
            note: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, QueryStatus::Completed | QueryStatus::CompletedViaFallback)
    }
}

/// Per-query outcome of a whole batch, keyed by the submitted ids in
/// submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub plan_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub queries: IndexMap<String, QueryReport>,
    /// Groups that failed with nothing left to fall back to.
    pub batch_failures: Vec<String>,
    /// Rejections that do not own a query id in the report, such as a
    /// second statement reusing an id.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignored: Vec<AnalysisError>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn query(&self, query_id: &str) -> Option<&QueryReport> {
        self.queries.get(query_id)
    }

    pub fn has_failures(&self) -> bool {
        !self.batch_failures.is_empty()
    }
}

/// Attributes group results back to the queries that produced them.
pub struct ResultAggregator<'a> {
    checks: &'a [Check],
}

impl<'a> ResultAggregator<'a> {
    pub fn new(checks: &'a [Check]) -> Self {
        Self { checks }
    }

    pub fn aggregate(&self, plan: &ExecutionPlan, execution: &ExecutionReport) -> BatchReport {
        let planned = plan.planned_query_ids().collect::<Vec<_>>();
        let mut reports: IndexMap<String, QueryReport> = IndexMap::new();
        let mut ignored = vec![];

        for error in plan.rejected.iter() {
            match error {
                AnalysisError::ParseFailure { query_id, detail }
                    if !planned.contains(&query_id) && !reports.contains_key(query_id) =>
                {
                    reports.insert(
                        query_id.clone(),
                        QueryReport::without_result(query_id, QueryStatus::ParseFailed, None, detail.clone()),
                    );
                }
                _ => ignored.push(error.clone()),
            }
        }

        for result in execution.results.iter() {
            let group = plan.group(&result.group_id);
            for query_id in result.member_query_ids.iter() {
                reports.insert(query_id.clone(), self.completed(query_id, result, group));
            }
        }

        let cancelled_reason = ExecutionError::Cancelled.to_string();
        let mut batch_failures = vec![];
        for record in execution.records.iter().filter(|record| record.state == GroupState::Skipped) {
            let reason = record.reason.clone().unwrap_or_else(|| "skipped".to_string());
            if reason != cancelled_reason {
                batch_failures.push(format!("{}: {reason}", record.group_id));
            }
            for query_id in record.member_query_ids.iter() {
                if reports.get(query_id).is_some_and(QueryReport::is_completed) {
                    continue;
                }
                reports.insert(
                    query_id.clone(),
                    QueryReport::without_result(query_id, QueryStatus::Skipped, Some(record.group_id.clone()), reason.clone()),
                );
            }
        }

        let mut queries = IndexMap::new();
        for query_id in plan.query_ids.iter() {
            let report = reports.swap_remove(query_id).unwrap_or_else(|| {
                warn!(query_id = %query_id, "query has no execution record");
                QueryReport::without_result(query_id, QueryStatus::Skipped, None, "no execution record for this query".to_string())
            });
            queries.insert(query_id.clone(), report);
        }

        let report = BatchReport {
            plan_id: plan.plan_id,
            generated_at: Utc::now(),
            queries,
            batch_failures,
            ignored,
            cancelled: execution.cancelled,
        };

        info!(
            plan_id = %report.plan_id,
            queries = report.queries.len(),
            completed = report.queries.values().filter(|query| query.is_completed()).count(),
            failures = report.batch_failures.len(),
            "batch report assembled"
        );

        report
    }

    fn completed(&self, query_id: &str, result: &GroupResult, group: Option<&ExecutionGroup>) -> QueryReport {
        let columns = group.and_then(|group| group.member_columns.get(query_id));
        let check_outcomes = result
            .check_outcomes
            .iter()
            .filter(|(check_id, _)| self.applies(check_id, columns))
            .map(|(check_id, outcome)| (check_id.clone(), *outcome))
            .collect();
        let note = group.filter(|group| group.is_consolidated()).map(|group| {
            format!(
                "metrics computed on the merged row set of group {} ({} queries)",
                group.group_id,
                group.member_query_ids.len()
            )
        });

        QueryReport {
            query_id: query_id.to_string(),
            status: if result.fallback_triggered { QueryStatus::CompletedViaFallback } else { QueryStatus::Completed },
            group_id: Some(result.group_id.clone()),
            reason: None,
            row_count: Some(result.row_count),
            fallback_triggered: result.fallback_triggered,
            check_outcomes,
            note,
        }
    }

    /// A query sees a check when it projects the checked column, or
    /// projects everything. Unknown checks and members are kept.
    fn applies(&self, check_id: &str, columns: Option<&Vec<String>>) -> bool {
        let Some(columns) = columns else {
            return true;
        };
        let Some(check) = self.checks.iter().find(|check| check.id == check_id) else {
            return true;
        };
        columns.iter().any(|column| column == "*" || check.targets(column))
    }
}
