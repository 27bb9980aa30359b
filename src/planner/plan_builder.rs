use indexmap::IndexMap;
use tracing::{debug, info};

use crate::{
    analyzer::{AnalysisError, BatchAnalysis, CompatibilityAnalyzer, ComplexityTier, Consolidator},
    parser::ast::ParsedQuery,
    planner::{CostModel, ExecutionGroup, ExecutionPlan, GroupStrategy, ResourceConstraints},
};

/// Members of a group before ids and ordering are assigned.
struct DraftGroup<'a> {
    members: Vec<&'a ParsedQuery>,
    tier: ComplexityTier,
    first_position: usize,
    group: ExecutionGroup,
}

/// Turns an analyzed batch into an [`ExecutionPlan`].
///
/// Queries are partitioned by source table in first-seen order. Inside a
/// partition, greedy passes grow one merge group per pass from the queries
/// the previous pass rejected. A query that fails the per-member rules, or
/// ends up alone in its pass, runs individually.
pub struct PlanBuilder<'a> {
    cost_model: &'a CostModel,
    constraints: ResourceConstraints,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(cost_model: &'a CostModel, constraints: ResourceConstraints) -> Self {
        Self { cost_model, constraints }
    }

    pub fn build(&self, analysis: &BatchAnalysis) -> Result<ExecutionPlan, AnalysisError> {
        if analysis.queries.is_empty() {
            return Err(AnalysisError::EmptyBatch { rejected: analysis.errors.clone() });
        }

        let positions: IndexMap<&str, usize> = analysis
            .queries
            .iter()
            .enumerate()
            .map(|(position, query)| (query.id.as_str(), position))
            .collect();

        let mut partitions: IndexMap<String, Vec<&ParsedQuery>> = IndexMap::new();
        for query in analysis.queries.iter() {
            partitions.entry(query.table_key()).or_default().push(query);
        }

        let mut drafts: Vec<DraftGroup> = vec![];
        for (table, members) in partitions.iter() {
            for group in Self::partition_groups(members) {
                debug!(table = %table, members = ?group.iter().map(|q| q.id.as_str()).collect::<Vec<_>>(), "group formed");
                drafts.push(self.draft(group, &positions)?);
            }
        }

        drafts.sort_by(|a, b| {
            (a.group.priority, a.group.estimated_runtime_millis, a.first_position)
                .cmp(&(b.group.priority, b.group.estimated_runtime_millis, b.first_position))
        });

        let groups = drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| self.finish(format!("g{}", index + 1), draft))
            .collect::<Vec<_>>();

        let plan = ExecutionPlan::new(analysis.order.clone(), analysis.errors.clone(), groups, self.constraints);

        info!(
            plan_id = %plan.plan_id,
            groups = plan.groups.len(),
            consolidated = plan.groups.iter().filter(|group| group.is_consolidated()).count(),
            rejected = plan.rejected.len(),
            "execution plan built"
        );

        Ok(plan)
    }

    /// Greedy grouping of one table's queries, in input order.
    fn partition_groups<'q>(members: &[&'q ParsedQuery]) -> Vec<Vec<&'q ParsedQuery>> {
        let mut groups: Vec<Vec<&ParsedQuery>> = vec![];
        let mut remaining: Vec<&ParsedQuery> = vec![];

        for query in members.iter().copied() {
            let verdict = CompatibilityAnalyzer::check_single(query);
            if verdict.mergeable {
                remaining.push(query);
            } else {
                debug!(query_id = %query.id, reason = %verdict.reason, "query runs individually");
                groups.push(vec![query]);
            }
        }

        while !remaining.is_empty() {
            let mut accepted: Vec<&ParsedQuery> = vec![];
            let mut rejected: Vec<&ParsedQuery> = vec![];
            for query in remaining.into_iter() {
                let mut candidate = accepted.clone();
                candidate.push(query);
                if CompatibilityAnalyzer::check(&candidate).mergeable {
                    accepted = candidate;
                } else {
                    rejected.push(query);
                }
            }
            groups.push(accepted);
            remaining = rejected;
        }

        groups
    }

    fn draft<'q>(&self, members: Vec<&'q ParsedQuery>, positions: &IndexMap<&str, usize>) -> Result<DraftGroup<'q>, AnalysisError> {
        let tier = members.iter().map(|query| query.complexity_tier).max().unwrap_or(ComplexityTier::Simple);
        let first_position = members
            .iter()
            .filter_map(|query| positions.get(query.id.as_str()).copied())
            .min()
            .unwrap_or(usize::MAX);

        let group = if members.len() > 1 {
            self.consolidated_group(&members, tier)?
        } else {
            let Some(query) = members.first() else {
                return Err(AnalysisError::IncompatibleGroupRequested { reason: "empty group".to_string() });
            };
            self.individual_group(query)
        };

        Ok(DraftGroup { members, tier, first_position, group })
    }

    fn consolidated_group(&self, members: &[&ParsedQuery], tier: ComplexityTier) -> Result<ExecutionGroup, AnalysisError> {
        let sql = Consolidator::consolidate(members)?;
        let source_table = members.first().map(|query| query.source_table.clone()).unwrap_or_default();
        let estimate = self.cost_model.estimate(std::slice::from_ref(&source_table), tier);

        Ok(ExecutionGroup {
            group_id: String::new(),
            strategy: GroupStrategy::Consolidated,
            member_query_ids: members.iter().map(|query| query.id.clone()).collect(),
            consolidated_sql: Some(sql.clone()),
            sql,
            source_table,
            complexity_tier: tier,
            estimated_memory_bytes: estimate.memory_bytes,
            estimated_runtime_millis: estimate.runtime_millis,
            priority: tier.ordinal(),
            member_columns: members.iter().map(|query| (query.id.clone(), Self::output_columns(query))).collect(),
            fallback: vec![],
        })
    }

    fn individual_group(&self, query: &ParsedQuery) -> ExecutionGroup {
        let tier = query.complexity_tier;
        let estimate = self.cost_model.estimate(&CostModel::tables_of(query), tier);

        ExecutionGroup {
            group_id: String::new(),
            strategy: GroupStrategy::Individual,
            member_query_ids: vec![query.id.clone()],
            consolidated_sql: None,
            sql: query.raw_text.clone(),
            source_table: query.source_table.clone(),
            complexity_tier: tier,
            estimated_memory_bytes: estimate.memory_bytes,
            estimated_runtime_millis: estimate.runtime_millis,
            priority: tier.ordinal(),
            member_columns: IndexMap::from([(query.id.clone(), Self::output_columns(query))]),
            fallback: vec![],
        }
    }

    /// Assigns the final id and, for merged groups, the individual fallback.
    /// Fallbacks keep the parent's priority so substitution never reorders the plan.
    fn finish(&self, group_id: String, draft: DraftGroup) -> ExecutionGroup {
        let mut group = draft.group;
        if group.is_consolidated() {
            group.fallback = draft
                .members
                .iter()
                .enumerate()
                .map(|(index, query)| {
                    let mut fallback = self.individual_group(query);
                    fallback.group_id = format!("{group_id}-f{}", index + 1);
                    fallback.priority = draft.tier.ordinal();
                    fallback
                })
                .collect();
        }
        group.group_id = group_id;
        group
    }

    fn output_columns(query: &ParsedQuery) -> Vec<String> {
        if query.projects_wildcard() {
            return vec!["*".to_string()];
        }
        query.columns.iter().filter_map(|column| column.output_name()).collect()
    }
}
