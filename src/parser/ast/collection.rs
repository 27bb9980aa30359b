use serde::{Deserialize, Serialize};

use crate::parser::{ast::{ClauseCollector, ColumnExpr}, QueryParser, WordComparer};

/// A relation named in `FROM` or as a join target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Collection {
    Table { name: String, alias: Option<String> },
    /// `( SELECT … ) alias`
    Derived { query: String, alias: Option<String> },
    /// Anything else (table functions, vendor syntax), kept verbatim.
    Opaque { text: String },
}

impl Collection {
    pub fn parse(text: &str) -> Collection {
        let text = ClauseCollector::normalize(text);
        let mut parser = QueryParser::new(&text);

        if parser.current() == '(' {
            let Some(close) = parser.find_closing(0) else {
                return Collection::Opaque { text };
            };
            let inner = parser.text_from_range(1, close).trim().to_string();
            parser.position = close + 1;
            return match Self::parse_alias(&mut parser) {
                Some(alias) if ClauseCollector::is_query_text(&inner) => Collection::Derived { query: inner, alias },
                _ => Collection::Opaque { text },
            };
        }

        let pivot = parser.position;
        while !parser.eof() {
            let current = parser.current();
            if QueryParser::is_quote(current) {
                parser.skip_quoted();
            } else if WordComparer::is_identifier_char(current) || current == '.' {
                parser.next();
            } else {
                break;
            }
        }
        let name = parser.text_from_pivot(pivot);
        if name.is_empty() || !ColumnExpr::is_identifier(&name) {
            return Collection::Opaque { text };
        }

        match Self::parse_alias(&mut parser) {
            Some(alias) => Collection::Table { name, alias },
            None => Collection::Opaque { text },
        }
    }

    /// Reads `[AS] alias` up to the end of the text. `None` when anything
    /// else follows; `Some(None)` when nothing follows at all.
    fn parse_alias(parser: &mut QueryParser) -> Option<Option<String>> {
        parser.next_non_whitespace();
        if parser.eof() {
            return Some(None);
        }
        if let Some(length) = parser.comparers.alias.matches(parser) {
            parser.jump(length);
            parser.next_non_whitespace();
        }
        let alias = parser.rest().trim().to_string();
        if ColumnExpr::is_identifier(&alias) && !alias.contains('.') {
            Some(Some(alias))
        } else {
            None
        }
    }

    /// The identifier used for partitioning and compatibility checks.
    pub fn name(&self) -> String {
        match self {
            Collection::Table { name, .. } => name.clone(),
            Collection::Derived { query, alias } => alias.clone().unwrap_or_else(|| format!("({query})")),
            Collection::Opaque { text } => text.clone(),
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match self {
            Collection::Table { alias, .. } | Collection::Derived { alias, .. } => alias.as_deref(),
            Collection::Opaque { .. } => None,
        }
    }

    /// SQL text for a `FROM` clause.
    pub fn render(&self) -> String {
        match self {
            Collection::Table { name, alias: Some(alias) } => format!("{name} {alias}"),
            Collection::Table { name, alias: None } => name.clone(),
            Collection::Derived { query, alias: Some(alias) } => format!("({query}) {alias}"),
            Collection::Derived { query, alias: None } => format!("({query})"),
            Collection::Opaque { text } => text.clone(),
        }
    }
}
