use indexmap::IndexSet;
use tracing::debug;

use crate::{
    analyzer::{AnalysisError, CompatibilityAnalyzer},
    parser::ast::{ClauseCollector, ParsedQuery},
};

/// Builds the single statement that serves a compatible group.
///
/// Columns are the union of every member's projection in first-seen order.
/// Filters are OR-ed, each member's predicate kept whole inside its own
/// parentheses; a member without a filter needs every row, so the merged
/// statement then has no `WHERE` at all.
pub struct Consolidator;

impl Consolidator {
    pub fn consolidate(members: &[&ParsedQuery]) -> Result<String, AnalysisError> {
        let verdict = CompatibilityAnalyzer::check(members);
        if !verdict.mergeable {
            return Err(AnalysisError::IncompatibleGroupRequested { reason: verdict.reason });
        }
        let Some(first) = members.first() else {
            return Err(AnalysisError::IncompatibleGroupRequested { reason: "empty candidate group".to_string() });
        };

        let columns = Self::column_union(members);
        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), first.source.render());
        if let Some(predicate) = Self::merged_predicate(members) {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }

        debug!(
            members = ?members.iter().map(|query| query.id.as_str()).collect::<Vec<_>>(),
            sql = %sql,
            "consolidated group"
        );

        Ok(sql)
    }

    /// Distinct column expressions across members, compared after whitespace
    /// normalization.
    pub fn column_union(members: &[&ParsedQuery]) -> Vec<String> {
        members
            .iter()
            .flat_map(|query| query.columns.iter())
            .map(|column| ClauseCollector::normalize(column.text()))
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// `(p1) OR (p2) …`, or `None` when any member reads every row.
    pub fn merged_predicate(members: &[&ParsedQuery]) -> Option<String> {
        let mut predicates: IndexSet<String> = IndexSet::new();
        for query in members.iter() {
            let predicate = query.where_expr.as_ref()?;
            predicates.insert(ClauseCollector::normalize(&predicate.to_string()));
        }
        if predicates.is_empty() {
            return None;
        }

        Some(
            predicates
                .iter()
                .map(|predicate| format!("({predicate})"))
                .collect::<Vec<_>>()
                .join(" OR "),
        )
    }
}
