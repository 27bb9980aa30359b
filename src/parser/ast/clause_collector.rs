use crate::parser::QueryParser;

/// Depth-aware text collection for clause bodies.
///
/// Everything here respects nesting: separators and keywords inside
/// parentheses or quoted literals never split a clause.
pub struct ClauseCollector;

pub type Stopper = dyn Fn(&QueryParser) -> bool;

impl ClauseCollector {
    /// Collects from the cursor up to the next top-level clause keyword, `;` or EOF.
    pub fn collect(parser: &mut QueryParser) -> String {
        Self::collect_until(parser, &|_| false)
    }

    /// Like [`ClauseCollector::collect`], also stopping where `stopper` holds at the top level.
    pub fn collect_until(parser: &mut QueryParser, stopper: &Stopper) -> String {
        let pivot = parser.position;
        while !parser.eof() {
            if parser.is_top_level()
                && (parser.current() == ';' || parser.comparers.clause_at(parser).is_some() || stopper(parser)) {
                break;
            }
            parser.advance();
        }
        parser.text_from_pivot(pivot).trim().to_string()
    }

    /// Splits on `separator` wherever it appears outside parentheses and quotes.
    pub fn split_top_level(text: &str, separator: char) -> Vec<String> {
        let mut parser = QueryParser::new(text);
        let mut segments = vec![];
        let mut pivot = 0;
        while !parser.eof() {
            if parser.is_top_level() && parser.current() == separator {
                segments.push(parser.text_from_pivot(pivot).trim().to_string());
                parser.next();
                pivot = parser.position;
            } else {
                parser.advance();
            }
        }
        segments.push(parser.text_from_pivot(pivot).trim().to_string());
        segments
    }

    /// Collapses whitespace runs outside quotes and drops `--` and `/* */` comments.
    pub fn normalize(text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut quote: Option<char> = None;
        let mut pending_space = false;
        let mut index = 0;
        while index < chars.len() {
            let ch = chars[index];
            if let Some(q) = quote {
                out.push(ch);
                if ch == q {
                    if chars.get(index + 1) == Some(&q) {
                        out.push(q);
                        index += 1;
                    } else {
                        quote = None;
                    }
                }
            } else if ch == '-' && chars.get(index + 1) == Some(&'-') {
                while index < chars.len() && chars[index] != '\n' {
                    index += 1;
                }
                pending_space = true;
                continue;
            } else if ch == '/' && chars.get(index + 1) == Some(&'*') {
                index += 2;
                while index < chars.len() && !(chars[index] == '*' && chars.get(index + 1) == Some(&'/')) {
                    index += 1;
                }
                index += 2;
                pending_space = true;
                continue;
            } else if ch.is_whitespace() {
                pending_space = true;
            } else {
                if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                if QueryParser::is_quote(ch) {
                    quote = Some(ch);
                }
                out.push(ch);
            }
            index += 1;
        }
        out
    }

    /// Inner text when the whole of `text` is one parenthesized block.
    pub fn strip_wrapping_parentheses(text: &str) -> Option<String> {
        let trimmed = text.trim();
        if !trimmed.starts_with('(') {
            return None;
        }
        let parser = QueryParser::new(trimmed);
        match parser.find_closing(0) {
            Some(close) if close + 1 == parser.length => {
                Some(parser.text_from_range(1, close).trim().to_string())
            }
            _ => None,
        }
    }

    /// Whether `text` reads as a query (`SELECT …` or `WITH …`).
    pub fn is_query_text(text: &str) -> bool {
        let parser = QueryParser::new(text.trim_start());
        parser.comparers.select.compare(&parser) || parser.comparers.with.compare(&parser)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::{ast::ClauseCollector, Phase, QueryParser};

    #[test]
    pub fn test_collect_stops_at_clause() {
        let mut parser = QueryParser::new("a, b FROM t");
        let text = ClauseCollector::collect(&mut parser);

        assert_eq!(text, "a, b");
        assert!(parser.check_next_phase());
        assert_eq!(parser.phase, Phase::Collections);
    }

    #[test]
    pub fn test_collect_ignores_nested_keywords() {
        let mut parser = QueryParser::new("EXTRACT(YEAR FROM d), 'WHERE' FROM t");
        let text = ClauseCollector::collect(&mut parser);

        assert_eq!(text, "EXTRACT(YEAR FROM d), 'WHERE'");
    }

    #[test]
    pub fn test_collect_ignores_is_distinct_from() {
        let mut parser = QueryParser::new("a IS DISTINCT FROM b ORDER BY a");
        let text = ClauseCollector::collect(&mut parser);

        assert_eq!(text, "a IS DISTINCT FROM b");
    }

    #[test]
    pub fn test_split_top_level_function_args() {
        let parts = ClauseCollector::split_top_level("a, COALESCE(b, c, 0), 'x,y'", ',');

        assert_eq!(parts, vec!["a", "COALESCE(b, c, 0)", "'x,y'"]);
    }

    #[test]
    pub fn test_split_top_level_case_expression() {
        let parts = ClauseCollector::split_top_level(
            "CASE WHEN a > 1 THEN 'hi, there' ELSE f(a, b) END AS label, c",
            ',',
        );

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1], "c");
    }

    #[test]
    pub fn test_normalize() {
        assert_eq!(ClauseCollector::normalize("  a \n\t+   b "), "a + b");
        assert_eq!(ClauseCollector::normalize("x = 'two  spaces'"), "x = 'two  spaces'");
        assert_eq!(ClauseCollector::normalize("a -- trailing\n+ b"), "a + b");
        assert_eq!(ClauseCollector::normalize("a /* x, y */ + b"), "a + b");
        assert_eq!(ClauseCollector::normalize("'/* kept */'"), "'/* kept */'");
    }

    #[test]
    pub fn test_block_comment_hides_separators_and_keywords() {
        let mut parser = QueryParser::new("a /* x, y FROM z */, b FROM t");
        let text = ClauseCollector::collect(&mut parser);
        let parts = ClauseCollector::split_top_level(&text, ',')
            .iter()
            .map(|part| ClauseCollector::normalize(part))
            .collect::<Vec<_>>();

        assert_eq!(parts, vec!["a", "b"]);
        assert!(parser.check_next_phase());
        assert_eq!(parser.phase, Phase::Collections);
    }

    #[test]
    pub fn test_strip_wrapping_parentheses() {
        assert_eq!(ClauseCollector::strip_wrapping_parentheses("( a = 1 )"), Some("a = 1".to_string()));
        assert_eq!(ClauseCollector::strip_wrapping_parentheses("(a) OR (b)"), None);
        assert_eq!(ClauseCollector::strip_wrapping_parentheses("a"), None);
    }
}
