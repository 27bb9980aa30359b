use std::fmt::Display;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::executor::CheckOutcome;

/// Lifecycle of one execution group. `Completed`, `FailedFallback` and
/// `Skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupState {
    Pending,
    Running,
    Completed,
    FailedFallback,
    Skipped,
}

impl GroupState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::FailedFallback | Self::Skipped)
    }
}

impl Display for GroupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::FailedFallback => "failed-fallback",
            Self::Skipped => "skipped",
        };
        write!(f, "{name}")
    }
}

/// Outcome of a group that reached `Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupResult {
    pub group_id: String,
    pub member_query_ids: Vec<String>,
    pub row_count: u64,
    pub columns: Vec<String>,
    pub check_outcomes: IndexMap<String, CheckOutcome>,
    pub runtime_millis: u64,
    /// Set on results produced by a fallback group.
    pub fallback_triggered: bool,
}

/// Final state of every group the executor touched, fallbacks included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    pub group_id: String,
    pub member_query_ids: Vec<String>,
    pub state: GroupState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The merged group this one replaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_group_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub plan_id: Uuid,
    pub results: Vec<GroupResult>,
    pub records: Vec<GroupRecord>,
    pub cancelled: bool,
}

impl ExecutionReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn result(&self, group_id: &str) -> Option<&GroupResult> {
        self.results.iter().find(|result| result.group_id == group_id)
    }

    pub fn record(&self, group_id: &str) -> Option<&GroupRecord> {
        self.records.iter().find(|record| record.group_id == group_id)
    }
}
