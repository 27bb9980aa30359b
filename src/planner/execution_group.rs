use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::analyzer::ComplexityTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupStrategy {
    Consolidated,
    Individual,
}

/// A unit of work for the executor: one statement serving one or more
/// original queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionGroup {
    pub group_id: String,
    pub strategy: GroupStrategy,
    pub member_query_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consolidated_sql: Option<String>,
    /// Statement submitted to the backend.
    pub sql: String,
    pub source_table: String,
    pub complexity_tier: ComplexityTier,
    pub estimated_memory_bytes: u64,
    pub estimated_runtime_millis: u64,
    /// Lower runs first.
    pub priority: u32,
    /// Output column names per member; `*` stands for "everything".
    #[serde(default)]
    pub member_columns: IndexMap<String, Vec<String>>,
    /// Fully specified replacement groups, used verbatim on failure.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback: Vec<ExecutionGroup>,
}

impl ExecutionGroup {
    pub fn is_consolidated(&self) -> bool {
        self.strategy == GroupStrategy::Consolidated
    }

    pub fn has_fallback(&self) -> bool {
        !self.fallback.is_empty()
    }
}
