use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::parser::ast::{Collection, ColumnExpr, ParsedQuery};

/// Merge-blocking rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IncompatibilityRule {
    SourceTable,
    Grouping,
    WindowFunctions,
    Subqueries,
    TierSpread,
    RowShaping,
    OutputNameCollision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityVerdict {
    pub mergeable: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<IncompatibilityRule>,
}

impl CompatibilityVerdict {
    pub fn mergeable() -> Self {
        Self { mergeable: true, reason: String::new(), rule: None }
    }

    pub fn rejected(rule: IncompatibilityRule, reason: String) -> Self {
        Self { mergeable: false, reason, rule: Some(rule) }
    }
}

/// Decides whether a candidate group can run as one statement without
/// changing what any member returns.
///
/// Every rule is evaluated over the whole group before the next one, and
/// reasons list ids and names in sorted order, so the verdict never depends
/// on member order.
pub struct CompatibilityAnalyzer;

impl CompatibilityAnalyzer {
    pub fn check(members: &[&ParsedQuery]) -> CompatibilityVerdict {
        if members.is_empty() {
            return CompatibilityVerdict::rejected(IncompatibilityRule::SourceTable, "empty candidate group".to_string());
        }

        let rules: [fn(&[&ParsedQuery]) -> Option<CompatibilityVerdict>; 7] = [
            Self::check_source_table,
            Self::check_grouping,
            Self::check_window_functions,
            Self::check_subqueries,
            Self::check_tier_spread,
            Self::check_row_shaping,
            Self::check_output_names,
        ];

        rules
            .iter()
            .find_map(|rule| rule(members))
            .unwrap_or_else(CompatibilityVerdict::mergeable)
    }

    /// Per-member rules only; a query failing here always runs on its own.
    pub fn check_single(query: &ParsedQuery) -> CompatibilityVerdict {
        Self::check(&[query])
    }

    /// Sorted ids of the members matching `predicate`, or `None` when none do.
    fn offenders(members: &[&ParsedQuery], predicate: impl Fn(&ParsedQuery) -> bool) -> Option<String> {
        let ids = members
            .iter()
            .filter(|query| predicate(query))
            .map(|query| query.id.as_str())
            .collect::<BTreeSet<_>>();
        if ids.is_empty() {
            return None;
        }
        Some(ids.into_iter().collect::<Vec<_>>().join(", "))
    }

    fn check_source_table(members: &[&ParsedQuery]) -> Option<CompatibilityVerdict> {
        let tables = members.iter().map(|query| query.table_key()).collect::<BTreeSet<_>>();
        if tables.len() > 1 {
            let tables = tables.into_iter().collect::<Vec<_>>().join(", ");
            return Some(CompatibilityVerdict::rejected(
                IncompatibilityRule::SourceTable,
                format!("members reference different source tables: {tables}"),
            ));
        }

        let aliases = members
            .iter()
            .map(|query| query.source_alias().map(str::to_lowercase).unwrap_or_default())
            .collect::<BTreeSet<_>>();
        if aliases.len() > 1 {
            return Some(CompatibilityVerdict::rejected(
                IncompatibilityRule::SourceTable,
                "members alias the source table differently".to_string(),
            ));
        }

        let joined = Self::offenders(members, |query| !query.joins.is_empty())?;
        Some(CompatibilityVerdict::rejected(
            IncompatibilityRule::SourceTable,
            format!("joins reference more than one table: {joined}"),
        ))
    }

    fn check_grouping(members: &[&ParsedQuery]) -> Option<CompatibilityVerdict> {
        let grouped = Self::offenders(members, ParsedQuery::collapses_rows)?;
        Some(CompatibilityVerdict::rejected(
            IncompatibilityRule::Grouping,
            format!("grouping or aggregation collapses rows: {grouped}"),
        ))
    }

    fn check_window_functions(members: &[&ParsedQuery]) -> Option<CompatibilityVerdict> {
        let windowed = Self::offenders(members, |query| !query.window_functions.is_empty())?;
        Some(CompatibilityVerdict::rejected(
            IncompatibilityRule::WindowFunctions,
            format!("window functions present: {windowed}"),
        ))
    }

    fn check_subqueries(members: &[&ParsedQuery]) -> Option<CompatibilityVerdict> {
        let nested = Self::offenders(members, |query| !query.subqueries.is_empty())?;
        Some(CompatibilityVerdict::rejected(
            IncompatibilityRule::Subqueries,
            format!("nested queries present: {nested}"),
        ))
    }

    fn check_tier_spread(members: &[&ParsedQuery]) -> Option<CompatibilityVerdict> {
        let lowest = members.iter().map(|query| query.complexity_tier).min()?;
        let highest = members.iter().map(|query| query.complexity_tier).max()?;
        if lowest.distance(highest) <= 1 {
            return None;
        }
        Some(CompatibilityVerdict::rejected(
            IncompatibilityRule::TierSpread,
            format!("complexity tiers span {lowest} to {highest}"),
        ))
    }

    fn check_row_shaping(members: &[&ParsedQuery]) -> Option<CompatibilityVerdict> {
        let shaped = Self::offenders(members, |query| {
            query.shapes_rows()
                || !query.opaque_fragments.is_empty()
                || !matches!(query.source, Collection::Table { .. })
        })?;
        Some(CompatibilityVerdict::rejected(
            IncompatibilityRule::RowShaping,
            format!("row-shaping or unrecognized clauses present: {shaped}"),
        ))
    }

    fn check_output_names(members: &[&ParsedQuery]) -> Option<CompatibilityVerdict> {
        let mut seen: IndexMap<String, (String, &str)> = IndexMap::new();
        let mut collisions: BTreeSet<String> = BTreeSet::new();

        for query in members.iter() {
            for column in query.columns.iter() {
                let Some(name) = column.output_name() else {
                    continue;
                };
                let name = name.to_lowercase();
                let expression = Self::canonical_expression(query, column);
                match seen.get(&name) {
                    Some((other, owner)) if *other != expression && *owner != query.id => {
                        collisions.insert(name);
                    }
                    Some(_) => {}
                    None => {
                        seen.insert(name, (expression, query.id.as_str()));
                    }
                }
            }
        }

        if collisions.is_empty() {
            return None;
        }
        let names = collisions.into_iter().collect::<Vec<_>>().join(", ");
        Some(CompatibilityVerdict::rejected(
            IncompatibilityRule::OutputNameCollision,
            format!("different expressions share output names: {names}"),
        ))
    }

    /// Expression text with the source qualifier removed, so `t.col` and `col`
    /// over the same relation compare equal.
    pub fn canonical_expression(query: &ParsedQuery, column: &ColumnExpr) -> String {
        match column {
            ColumnExpr::Identifier(text) => {
                let lowered = text.to_lowercase();
                let qualifiers = [query.source_alias().map(str::to_lowercase), Some(query.table_key())];
                qualifiers
                    .iter()
                    .flatten()
                    .find_map(|qualifier| lowered.strip_prefix(&format!("{qualifier}.")).map(str::to_string))
                    .unwrap_or(lowered)
            }
            ColumnExpr::Computed(text) => text.to_lowercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        analyzer::{CompatibilityAnalyzer, IncompatibilityRule},
        parser::ast::ParsedQuery,
    };

    fn parse(id: &str, sql: &str) -> ParsedQuery {
        ParsedQuery::parse(id, sql).expect("Failed to parse query")
    }

    #[test]
    pub fn test_same_table_mergeable() {
        let a = parse("q1", "SELECT col1, col2 FROM t WHERE status = 'active'");
        let b = parse("q2", "SELECT col3 FROM t");

        let verdict = CompatibilityAnalyzer::check(&[&a, &b]);

        assert!(verdict.mergeable);
        assert!(verdict.reason.is_empty());
    }

    #[test]
    pub fn test_different_tables() {
        let a = parse("q1", "SELECT a FROM t1");
        let b = parse("q2", "SELECT a FROM t2");

        let verdict = CompatibilityAnalyzer::check(&[&a, &b]);

        assert!(!verdict.mergeable);
        assert_eq!(verdict.rule, Some(IncompatibilityRule::SourceTable));
        assert_eq!(verdict.reason, "members reference different source tables: t1, t2");
    }

    #[test]
    pub fn test_table_match_ignores_case() {
        let a = parse("q1", "SELECT a FROM Orders");
        let b = parse("q2", "SELECT b FROM orders");

        assert!(CompatibilityAnalyzer::check(&[&a, &b]).mergeable);
    }

    #[test]
    pub fn test_join_is_incompatible() {
        let a = parse("q1", "SELECT t.a FROM t JOIN u ON t.id = u.id");

        let verdict = CompatibilityAnalyzer::check_single(&a);

        assert_eq!(verdict.rule, Some(IncompatibilityRule::SourceTable));
    }

    #[test]
    pub fn test_grouping_and_bare_aggregate() {
        let grouped = parse("q1", "SELECT a, COUNT(*) FROM t GROUP BY a");
        let aggregate = parse("q2", "SELECT MAX(a) FROM t");
        let plain = parse("q3", "SELECT a FROM t");

        assert_eq!(CompatibilityAnalyzer::check(&[&plain, &grouped]).rule, Some(IncompatibilityRule::Grouping));
        assert_eq!(CompatibilityAnalyzer::check(&[&plain, &aggregate]).rule, Some(IncompatibilityRule::Grouping));
    }

    #[test]
    pub fn test_window_and_subquery_rules() {
        let windowed = parse("q1", "SELECT a, ROW_NUMBER() OVER (ORDER BY a) FROM t");
        let nested = parse("q2", "SELECT a FROM t WHERE a IN (SELECT a FROM u)");

        assert_eq!(CompatibilityAnalyzer::check_single(&windowed).rule, Some(IncompatibilityRule::WindowFunctions));
        assert_eq!(CompatibilityAnalyzer::check_single(&nested).rule, Some(IncompatibilityRule::Subqueries));
    }

    #[test]
    pub fn test_row_shaping() {
        let limited = parse("q1", "SELECT a FROM t LIMIT 5");
        let distinct = parse("q2", "SELECT DISTINCT a FROM t");

        assert_eq!(CompatibilityAnalyzer::check_single(&limited).rule, Some(IncompatibilityRule::RowShaping));
        assert_eq!(CompatibilityAnalyzer::check_single(&distinct).rule, Some(IncompatibilityRule::RowShaping));
    }

    #[test]
    pub fn test_output_name_collision() {
        let a = parse("q1", "SELECT UPPER(name) AS label FROM t");
        let b = parse("q2", "SELECT LOWER(name) AS label FROM t");
        let c = parse("q3", "SELECT t.label FROM t");
        let d = parse("q4", "SELECT label FROM t");

        let verdict = CompatibilityAnalyzer::check(&[&a, &b]);
        assert_eq!(verdict.rule, Some(IncompatibilityRule::OutputNameCollision));
        assert_eq!(verdict.reason, "different expressions share output names: label");

        assert!(CompatibilityAnalyzer::check(&[&c, &d]).mergeable);
    }

    #[test]
    pub fn test_verdict_is_order_independent() {
        let a = parse("q1", "SELECT a FROM t");
        let b = parse("q2", "SELECT b FROM u");
        let c = parse("q3", "SELECT c, SUM(x) FROM t GROUP BY c");

        let forward = CompatibilityAnalyzer::check(&[&a, &b, &c]);
        let backward = CompatibilityAnalyzer::check(&[&c, &b, &a]);
        let shuffled = CompatibilityAnalyzer::check(&[&b, &a, &c]);

        assert_eq!(forward, backward);
        assert_eq!(forward, shuffled);
    }
}
