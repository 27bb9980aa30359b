use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{analyzer::AnalysisError, planner::ExecutionGroup};

/// Executor budgets. Snake-case aliases let the same struct be read from TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceConstraints {
    #[serde(alias = "max_concurrent_groups")]
    pub max_concurrent_groups: usize,
    #[serde(alias = "memory_budget_bytes")]
    pub memory_budget_bytes: u64,
    #[serde(alias = "memory_pressure_threshold_percent")]
    pub memory_pressure_threshold_percent: u8,
}

impl Default for ResourceConstraints {
    fn default() -> Self {
        Self {
            max_concurrent_groups: 4,
            memory_budget_bytes: 2 * 1024 * 1024 * 1024,
            memory_pressure_threshold_percent: 85,
        }
    }
}

impl ResourceConstraints {
    /// Observed usage above this many bytes counts as resource pressure.
    pub fn pressure_limit_bytes(&self) -> u64 {
        (self.memory_budget_bytes as u128 * self.memory_pressure_threshold_percent as u128 / 100) as u64
    }
}

/// Ordered groups for one batch. Immutable once execution starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub plan_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Every submitted query id in submission order, including rejected ones.
    pub query_ids: Vec<String>,
    #[serde(default)]
    pub rejected: Vec<AnalysisError>,
    pub groups: Vec<ExecutionGroup>,
    pub resource_constraints: ResourceConstraints,
}

impl ExecutionPlan {
    pub fn new(query_ids: Vec<String>, rejected: Vec<AnalysisError>, groups: Vec<ExecutionGroup>, resource_constraints: ResourceConstraints) -> Self {
        Self {
            plan_id: Uuid::new_v4(),
            created_at: Utc::now(),
            query_ids,
            rejected,
            groups,
            resource_constraints,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn group(&self, group_id: &str) -> Option<&ExecutionGroup> {
        self.groups
            .iter()
            .flat_map(|group| std::iter::once(group).chain(group.fallback.iter()))
            .find(|group| group.group_id == group_id)
    }

    pub fn planned_query_ids(&self) -> impl Iterator<Item = &String> {
        self.groups.iter().flat_map(|group| group.member_query_ids.iter())
    }
}
