// WITH recent AS (SELECT ...) V
// SELECT DISTINCT b.*, a.full_name AS name, COUNT(*) OVER (PARTITION BY a.region) V
// FROM TableA A, TableC C V
// INNER JOIN TableB B ON A.id = B.id V
// WHERE A.Age > 16 AND (B.city = 'Porto' OR B.city LIKE 'Mat%') V
// GROUP BY a.full_name V
// HAVING COUNT(*) > 3 V
// ORDER BY b.description DESC V
// LIMIT 10 OFFSET 5 V
// UNION ALL SELECT ... V

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    analyzer::{ComplexityClassifier, ComplexityTier},
    parser::{
        ast::{AggregateCall, ClauseCollector, Collection, ColumnExpr, Invocations, JoinDescriptor, JoinKind, Predicate},
        ParseError, Phase, QueryParser, WordComparer,
    },
};

/// Structural view of one `SELECT` statement.
///
/// Built once per batch and never mutated afterwards. Whatever the parser
/// cannot classify stays attached as raw text (`Predicate::Opaque`,
/// `Collection::Opaque`, `opaque_fragments`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuery {
    pub id: String,
    pub raw_text: String,
    pub distinct: bool,
    pub columns: Vec<ColumnExpr>,
    pub source_table: String,
    pub source: Collection,
    pub joins: Vec<JoinDescriptor>,
    pub where_expr: Option<Predicate>,
    pub group_by: IndexSet<String>,
    pub having_expr: Option<Predicate>,
    pub window_functions: IndexSet<String>,
    pub aggregate_functions: Vec<AggregateCall>,
    pub subqueries: IndexSet<String>,
    pub order_by: Vec<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub opaque_fragments: Vec<String>,
    pub complexity_tier: ComplexityTier,
}

impl ParsedQuery {
    pub fn parse(id: &str, sql: &str) -> Result<ParsedQuery, ParseError> {
        Self::check_balanced(sql)?;
        let mut parser = QueryParser::new(sql);
        parser.next_non_whitespace();

        let mut query = ParsedQuery {
            id: id.to_string(),
            raw_text: sql.trim().trim_end_matches(';').trim_end().to_string(),
            distinct: false,
            columns: vec![],
            source_table: String::new(),
            source: Collection::Opaque { text: String::new() },
            joins: vec![],
            where_expr: None,
            group_by: IndexSet::new(),
            having_expr: None,
            window_functions: IndexSet::new(),
            aggregate_functions: vec![],
            subqueries: IndexSet::new(),
            order_by: vec![],
            limit: None,
            offset: None,
            opaque_fragments: vec![],
            complexity_tier: ComplexityTier::Simple,
        };
        let mut invocations = Invocations::default();

        if let Some(length) = parser.comparers.with.matches(&parser) {
            parser.jump(length);
            Self::parse_common_table_expressions(&mut parser, &mut query)?;
        }

        let pivot = parser.position;
        let Some(length) = parser.comparers.select.matches(&parser) else {
            return ParseError::new("Expected SELECT", pivot, &parser).err();
        };
        parser.jump(length);
        parser.next_non_whitespace();

        if let Some(length) = parser.comparers.distinct.matches(&parser) {
            parser.jump(length);
            query.distinct = true;
        } else if let Some(length) = parser.comparers.all.matches(&parser) {
            parser.jump(length);
        }

        let pivot = parser.position;
        let projection = ClauseCollector::collect(&mut parser);
        if projection.is_empty() {
            return ParseError::new("Empty projection", pivot, &parser).err();
        }
        for item in ClauseCollector::split_top_level(&projection, ',') {
            if item.is_empty() {
                return ParseError::new("Empty column in projection", pivot, &parser).err();
            }
            query.columns.push(ColumnExpr::parse(&item));
        }
        invocations.scan(&projection);

        let pivot = parser.position;
        if !parser.check_next_phase() || parser.phase != Phase::Collections {
            return ParseError::new("Missing FROM clause", pivot, &parser).err();
        }

        while parser.phase != Phase::EOF {
            match parser.phase {
                Phase::Collections => Self::parse_collections(&mut parser, &mut query)?,
                Phase::Joins => {
                    let joins = JoinDescriptor::parse(&mut parser)?;
                    for join in joins.iter() {
                        invocations.scan(&join.text());
                    }
                    query.joins.extend(joins);
                    continue;
                }
                Phase::Criteria => {
                    let pivot = parser.position;
                    let text = Self::clause_body(&mut parser, |p| p.comparers.r#where.matches(p), "Empty WHERE clause")?;
                    invocations.scan(&text);
                    let predicate = Predicate::parse(&text).map_err(|message| ParseError::new(message, pivot, &parser))?;
                    query.where_expr = Some(predicate);
                }
                Phase::Aggregates => {
                    let text = Self::clause_body(&mut parser, |p| p.comparers.group_by.matches(p), "Empty GROUP BY clause")?;
                    invocations.scan(&text);
                    query.group_by = ClauseCollector::split_top_level(&text, ',')
                        .iter()
                        .map(|item| ClauseCollector::normalize(item))
                        .collect();
                }
                Phase::Having => {
                    let pivot = parser.position;
                    let text = Self::clause_body(&mut parser, |p| p.comparers.having.matches(p), "Empty HAVING clause")?;
                    invocations.scan(&text);
                    let predicate = Predicate::parse(&text).map_err(|message| ParseError::new(message, pivot, &parser))?;
                    query.having_expr = Some(predicate);
                }
                Phase::OrderBy => {
                    let text = Self::clause_body(&mut parser, |p| p.comparers.order_by.matches(p), "Empty ORDER BY clause")?;
                    invocations.scan(&text);
                    query.order_by = ClauseCollector::split_top_level(&text, ',')
                        .iter()
                        .map(|item| ClauseCollector::normalize(item))
                        .collect();
                }
                Phase::LimitAndOffset => Self::parse_limit_and_offset(&mut parser, &mut query)?,
                Phase::SetOperation => {
                    Self::parse_set_operation(&mut parser, &mut query);
                    continue;
                }
                Phase::Projection | Phase::EOF => break,
            }

            Self::expect_next_phase(&mut parser)?;
        }

        query.window_functions = invocations.window_functions;
        query.aggregate_functions = invocations.aggregates;
        query.subqueries.extend(invocations.subqueries);
        query.complexity_tier = ComplexityClassifier::classify(&query);

        debug!(
            query_id = %query.id,
            source_table = %query.source_table,
            joins = query.joins.len(),
            tier = %query.complexity_tier,
            "parsed query"
        );

        Ok(query)
    }

    /// Lower-cased source table, the key queries are partitioned by.
    pub fn table_key(&self) -> String {
        self.source_table.to_lowercase()
    }

    pub fn source_alias(&self) -> Option<&str> {
        self.source.alias()
    }

    /// Grouping or aggregate calls that collapse the row set.
    pub fn collapses_rows(&self) -> bool {
        !self.group_by.is_empty()
            || self.having_expr.is_some()
            || self.aggregate_functions.iter().any(|call| !call.windowed)
    }

    /// `DISTINCT`, `ORDER BY`, `LIMIT` or `OFFSET`.
    pub fn shapes_rows(&self) -> bool {
        self.distinct || !self.order_by.is_empty() || self.limit.is_some() || self.offset.is_some()
    }

    pub fn projects_wildcard(&self) -> bool {
        self.columns.iter().any(ColumnExpr::is_wildcard)
    }

    fn check_balanced(sql: &str) -> Result<(), ParseError> {
        let mut scanner = QueryParser::new(sql);
        while !scanner.eof() {
            let pivot = scanner.position;
            match scanner.current() {
                ')' if scanner.is_top_level() => {
                    return ParseError::new("Unbalanced parentheses", pivot, &scanner).err();
                }
                ch if QueryParser::is_quote(ch) => {
                    if !scanner.skip_quoted() {
                        return ParseError::new("Unterminated quoted literal", pivot, &scanner).err();
                    }
                }
                '/' if scanner.peek(1) == '*' => {
                    if !scanner.skip_block_comment() {
                        return ParseError::new("Unterminated block comment", pivot, &scanner).err();
                    }
                }
                _ => scanner.advance(),
            }
        }
        if !scanner.is_top_level() {
            return ParseError::new("Unbalanced parentheses", 0, &scanner).err();
        }
        Ok(())
    }

    fn expect_next_phase(parser: &mut QueryParser) -> Result<(), ParseError> {
        let pivot = parser.position;
        if parser.check_next_phase() {
            Ok(())
        } else {
            ParseError::new("Unexpected clause", pivot, parser).err()
        }
    }

    fn clause_body(
        parser: &mut QueryParser,
        keyword: fn(&QueryParser) -> Option<usize>,
        empty_message: &str,
    ) -> Result<String, ParseError> {
        let pivot = parser.position;
        let Some(length) = keyword(parser) else {
            return ParseError::new("Expected clause keyword", pivot, parser).err();
        };
        parser.jump(length);
        let text = ClauseCollector::collect(parser);
        if text.is_empty() {
            return ParseError::new(empty_message, pivot, parser).err();
        }
        Ok(text)
    }

    /// `FROM a [alias][, b [alias] …]`; extra relations become cross joins.
    fn parse_collections(parser: &mut QueryParser, query: &mut ParsedQuery) -> Result<(), ParseError> {
        let text = Self::clause_body(parser, |p| p.comparers.from.matches(p), "Missing source table")?;

        let mut collections = ClauseCollector::split_top_level(&text, ',').into_iter();
        let pivot = parser.position;
        let source_text = collections.next().unwrap_or_default();
        if source_text.is_empty() {
            return ParseError::new("Missing source table", pivot, parser).err();
        }

        let source = Collection::parse(&source_text);
        Self::record_collection(&source, query);
        query.source_table = source.name();
        query.source = source;

        for item in collections {
            if item.is_empty() {
                return ParseError::new("Empty relation in FROM", pivot, parser).err();
            }
            let target = Collection::parse(&item);
            Self::record_collection(&target, query);
            query.joins.push(JoinDescriptor { kind: JoinKind::Cross, target, condition: None });
        }

        Ok(())
    }

    fn record_collection(collection: &Collection, query: &mut ParsedQuery) {
        match collection {
            Collection::Derived { query: text, .. } => {
                query.subqueries.insert(ClauseCollector::normalize(text));
            }
            Collection::Opaque { text } => query.opaque_fragments.push(text.clone()),
            Collection::Table { .. } => {}
        }
    }

    /// `LIMIT` and `OFFSET` share one phase and may appear in either order.
    fn parse_limit_and_offset(parser: &mut QueryParser, query: &mut ParsedQuery) -> Result<(), ParseError> {
        loop {
            let pivot = parser.position;
            if let Some(length) = parser.comparers.limit.matches(parser) {
                if query.limit.is_some() {
                    return ParseError::new("Duplicate LIMIT", pivot, parser).err();
                }
                parser.jump(length);
                let text = ClauseCollector::collect(parser);
                if text.is_empty() {
                    return ParseError::new("Empty LIMIT", pivot, parser).err();
                }
                query.limit = Some(ClauseCollector::normalize(&text));
            } else if let Some(length) = parser.comparers.offset.matches(parser) {
                if query.offset.is_some() {
                    return ParseError::new("Duplicate OFFSET", pivot, parser).err();
                }
                parser.jump(length);
                let text = ClauseCollector::collect(parser);
                if text.is_empty() {
                    return ParseError::new("Empty OFFSET", pivot, parser).err();
                }
                query.offset = Some(ClauseCollector::normalize(&text));
            } else {
                return Ok(());
            }
            parser.next_non_whitespace();
        }
    }

    /// Everything from the set operator on is kept verbatim; the right-hand
    /// statement is recorded as a nested query.
    fn parse_set_operation(parser: &mut QueryParser, query: &mut ParsedQuery) {
        query.opaque_fragments.push(ClauseCollector::normalize(&parser.rest()));

        let length = parser
            .comparers
            .set_operations
            .iter()
            .find_map(|comparer| comparer.matches(parser))
            .unwrap_or(0);
        parser.jump(length);
        parser.next_non_whitespace();
        if let Some(length) = parser.comparers.distinct.matches(parser) {
            parser.jump(length);
        }

        let remainder = parser.rest();
        let remainder = remainder.trim().trim_end_matches(';').trim_end();
        let remainder = ClauseCollector::strip_wrapping_parentheses(remainder).unwrap_or_else(|| remainder.to_string());
        if ClauseCollector::is_query_text(&remainder) {
            query.subqueries.insert(ClauseCollector::normalize(&remainder));
        }

        parser.position = parser.length;
        parser.phase = Phase::EOF;
    }

    /// `name [(columns)] AS [NOT] [MATERIALIZED] (query)`, comma separated.
    fn parse_common_table_expressions(parser: &mut QueryParser, query: &mut ParsedQuery) -> Result<(), ParseError> {
        parser.next_non_whitespace();
        if let Some(length) = parser.comparers.recursive.matches(parser) {
            parser.jump(length);
        }

        loop {
            parser.next_non_whitespace();
            let pivot = parser.position;
            while !parser.eof() && (WordComparer::is_identifier_char(parser.current()) || QueryParser::is_quote(parser.current())) {
                if QueryParser::is_quote(parser.current()) {
                    parser.skip_quoted();
                } else {
                    parser.next();
                }
            }
            if parser.position == pivot {
                return ParseError::new("Expected common table expression name", pivot, parser).err();
            }
            parser.next_non_whitespace();

            if parser.current() == '(' {
                let Some(close) = parser.find_closing(parser.position) else {
                    return ParseError::new("Unbalanced parentheses", pivot, parser).err();
                };
                parser.position = close + 1;
                parser.next_non_whitespace();
            }

            let Some(length) = parser.comparers.alias.matches(parser) else {
                return ParseError::new("Expected AS in common table expression", pivot, parser).err();
            };
            parser.jump(length);
            parser.next_non_whitespace();

            while parser.current() != '(' && !parser.eof() && WordComparer::is_identifier_char(parser.current()) {
                parser.next();
            }
            parser.next_non_whitespace();

            if parser.current() != '(' {
                return ParseError::new("Expected common table expression body", pivot, parser).err();
            }
            let Some(close) = parser.find_closing(parser.position) else {
                return ParseError::new("Unbalanced parentheses", pivot, parser).err();
            };
            let body = parser.text_from_range(parser.position + 1, close);
            query.subqueries.insert(ClauseCollector::normalize(&body));
            parser.position = close + 1;
            parser.next_non_whitespace();

            if parser.current() == ',' {
                parser.next();
                continue;
            }
            return Ok(());
        }
    }
}
