use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::parser::{ast::ClauseCollector, QueryParser, WordComparer};

const AGGREGATE_FUNCTIONS: &[&str] = &[
    "COUNT", "SUM", "AVG", "MIN", "MAX", "STDDEV", "STDDEV_POP", "STDDEV_SAMP", "VARIANCE",
    "VAR_POP", "VAR_SAMP", "ARRAY_AGG", "STRING_AGG", "GROUP_CONCAT", "LISTAGG", "BOOL_AND",
    "BOOL_OR", "EVERY", "APPROX_COUNT_DISTINCT", "MEDIAN", "PERCENTILE_CONT", "PERCENTILE_DISC",
    "COLLECT_LIST", "COLLECT_SET", "ANY_VALUE",
];

/// An aggregate function call found in the statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateCall {
    pub name: String,
    pub text: String,
    /// Carries an `OVER` clause, so it does not collapse rows.
    pub windowed: bool,
}

/// Function-level structure discovered inside expression text.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Invocations {
    pub window_functions: IndexSet<String>,
    pub aggregates: Vec<AggregateCall>,
    pub subqueries: IndexSet<String>,
}

impl Invocations {
    pub fn is_aggregate_name(name: &str) -> bool {
        AGGREGATE_FUNCTIONS.iter().any(|candidate| candidate.eq_ignore_ascii_case(name))
    }

    /// Walks `text` at every nesting level, recording window invocations,
    /// aggregate calls and nested `SELECT`s. A nested query is recorded once
    /// and not searched further.
    pub fn scan(&mut self, text: &str) {
        let mut parser = QueryParser::new(text);
        while !parser.eof() {
            let current = parser.current();
            if QueryParser::is_quote(current) {
                parser.skip_quoted();
            } else if current == '-' && parser.peek(1) == '-' {
                parser.skip_line_comment();
            } else if parser.is_block_comment_start() {
                parser.skip_block_comment();
            } else if current == '(' {
                self.scan_parenthesized(&mut parser);
            } else if WordComparer::is_identifier_char(current)
                && (parser.position == 0 || !WordComparer::is_identifier_char(parser.text_v[parser.position - 1])) {
                self.scan_word(&mut parser);
            } else {
                parser.next();
            }
        }
    }

    fn scan_parenthesized(&mut self, parser: &mut QueryParser) {
        let open = parser.position;
        let Some(close) = parser.find_closing(open) else {
            parser.next();
            return;
        };
        let inner = parser.text_from_range(open + 1, close);
        if ClauseCollector::is_query_text(&inner) {
            self.subqueries.insert(ClauseCollector::normalize(&inner));
        } else {
            self.scan(&inner);
        }
        parser.position = close + 1;
    }

    fn scan_word(&mut self, parser: &mut QueryParser) {
        let start = parser.position;
        while !parser.eof() && (WordComparer::is_identifier_char(parser.current()) || parser.current() == '.') {
            parser.next();
        }
        let name = parser.text_from_pivot(start);

        let after_name = parser.position;
        parser.next_non_whitespace();
        if parser.current() != '(' {
            parser.position = after_name;
            return;
        }

        let open = parser.position;
        let Some(close) = parser.find_closing(open) else {
            parser.position = after_name;
            return;
        };
        let args = parser.text_from_range(open + 1, close);
        parser.position = close + 1;
        let call_end = parser.position;

        let base_name = name.rsplit('.').next().unwrap_or(&name).to_string();
        let mut windowed = false;

        parser.next_non_whitespace();
        if let Some(length) = parser.comparers.over.matches(parser) {
            parser.jump(length);
            parser.next_non_whitespace();
            if parser.current() == '(' {
                if let Some(spec_close) = parser.find_closing(parser.position) {
                    let spec = parser.text_from_range(parser.position + 1, spec_close);
                    self.scan(&spec);
                    parser.position = spec_close + 1;
                }
            } else {
                while !parser.eof() && WordComparer::is_identifier_char(parser.current()) {
                    parser.next();
                }
            }
            windowed = true;
            self.window_functions.insert(ClauseCollector::normalize(&parser.text_from_pivot(start)));
        } else {
            parser.position = call_end;
        }

        if Self::is_aggregate_name(&base_name) {
            self.aggregates.push(AggregateCall {
                name: base_name.to_uppercase(),
                text: ClauseCollector::normalize(&parser.text_from_range(start, call_end)),
                windowed,
            });
        }

        if ClauseCollector::is_query_text(&args) {
            self.subqueries.insert(ClauseCollector::normalize(&args));
        } else {
            self.scan(&args);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::Invocations;

    #[test]
    pub fn test_scan_window_function() {
        let mut found = Invocations::default();
        found.scan("t1.col1, COUNT(*) OVER (PARTITION BY t1.region)");

        assert_eq!(found.window_functions.len(), 1);
        assert_eq!(
            found.window_functions.first().map(String::as_str),
            Some("COUNT(*) OVER (PARTITION BY t1.region)")
        );
        assert_eq!(found.aggregates.len(), 1);
        assert!(found.aggregates[0].windowed);
    }

    #[test]
    pub fn test_scan_named_window() {
        let mut found = Invocations::default();
        found.scan("ROW_NUMBER() OVER w");

        assert_eq!(found.window_functions.len(), 1);
        assert!(found.aggregates.is_empty());
    }

    #[test]
    pub fn test_scan_plain_aggregates() {
        let mut found = Invocations::default();
        found.scan("SUM(amount), max(price) AS top, UPPER(name)");

        assert!(found.window_functions.is_empty());
        let names = found.aggregates.iter().map(|a| a.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["SUM", "MAX"]);
        assert!(found.aggregates.iter().all(|a| !a.windowed));
    }

    #[test]
    pub fn test_scan_nested_aggregate_in_function() {
        let mut found = Invocations::default();
        found.scan("ROUND(AVG(score), 2)");

        assert_eq!(found.aggregates.len(), 1);
        assert_eq!(found.aggregates[0].text, "AVG(score)");
    }

    #[test]
    pub fn test_scan_subqueries() {
        let mut found = Invocations::default();
        found.scan("id IN (SELECT ref_id FROM t2 WHERE COUNT(x) > 1) AND EXISTS(select 1 from t3)");

        assert_eq!(found.subqueries.len(), 2);
        assert!(found.aggregates.is_empty());
    }

    #[test]
    pub fn test_scan_ignores_quoted_text() {
        let mut found = Invocations::default();
        found.scan("'COUNT(*) OVER ()' AS label");

        assert!(found.window_functions.is_empty());
        assert!(found.aggregates.is_empty());
    }
}
