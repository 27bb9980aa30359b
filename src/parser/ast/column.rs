use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::parser::{ast::ClauseCollector, QueryParser};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:[A-Za-z_][A-Za-z0-9_$]*|"[^"]+"|`[^`]+`)(?:\.(?:[A-Za-z_][A-Za-z0-9_$]*|"[^"]+"|`[^`]+`|\*))*$"#)
        .expect("identifier pattern is valid")
});

/// One projected column: a bare (possibly qualified) identifier or any other
/// expression kept as normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "camelCase")]
pub enum ColumnExpr {
    Identifier(String),
    Computed(String),
}

impl ColumnExpr {
    pub fn parse(text: &str) -> Self {
        let text = ClauseCollector::normalize(text);
        if text == "*" || Self::is_identifier(&text) {
            Self::Identifier(text)
        } else {
            Self::Computed(text)
        }
    }

    pub fn is_identifier(text: &str) -> bool {
        IDENTIFIER.is_match(text)
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Identifier(text) | Self::Computed(text) => text,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        match self {
            Self::Identifier(text) => text == "*" || text.ends_with(".*"),
            Self::Computed(_) => false,
        }
    }

    /// Name the column takes in a result set, when it can be known statically.
    ///
    /// Identifiers use their last path segment; computed expressions only
    /// have a name through an explicit top-level `AS`.
    pub fn output_name(&self) -> Option<String> {
        match self {
            Self::Identifier(_) if self.is_wildcard() => None,
            Self::Identifier(text) => text.rsplit('.').next().map(Self::unquote),
            Self::Computed(text) => Self::explicit_alias(text).map(|alias| Self::unquote(&alias)),
        }
    }

    fn explicit_alias(text: &str) -> Option<String> {
        let mut parser = QueryParser::new(text);
        let mut alias_at: Option<usize> = None;
        while !parser.eof() {
            if parser.is_top_level() {
                if let Some(length) = parser.comparers.alias.matches(&parser) {
                    alias_at = Some(parser.position + length);
                }
            }
            parser.advance();
        }
        let alias = parser.text_from_range(alias_at?, parser.length).trim().to_string();
        if Self::is_identifier(&alias) && !alias.contains('.') {
            Some(alias)
        } else {
            None
        }
    }

    fn unquote(name: &str) -> String {
        name.trim_matches(|ch| ch == '"' || ch == '`').to_string()
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::ColumnExpr;

    #[test]
    pub fn test_identifier() {
        assert_eq!(ColumnExpr::parse("col1"), ColumnExpr::Identifier("col1".into()));
        assert_eq!(ColumnExpr::parse(" t1.col1 "), ColumnExpr::Identifier("t1.col1".into()));
        assert_eq!(ColumnExpr::parse("\"Order Id\""), ColumnExpr::Identifier("\"Order Id\"".into()));
        assert_eq!(ColumnExpr::parse("*"), ColumnExpr::Identifier("*".into()));
        assert_eq!(ColumnExpr::parse("t.*"), ColumnExpr::Identifier("t.*".into()));
    }

    #[test]
    pub fn test_computed() {
        assert_eq!(ColumnExpr::parse("price  * qty"), ColumnExpr::Computed("price * qty".into()));
        assert_eq!(ColumnExpr::parse("COUNT(*)"), ColumnExpr::Computed("COUNT(*)".into()));
    }

    #[test]
    pub fn test_output_name() {
        assert_eq!(ColumnExpr::parse("t1.col1").output_name(), Some("col1".into()));
        assert_eq!(ColumnExpr::parse("price * qty AS total").output_name(), Some("total".into()));
        assert_eq!(ColumnExpr::parse("CAST(x AS INT)").output_name(), None);
        assert_eq!(ColumnExpr::parse("CAST(x AS INT) as y").output_name(), Some("y".into()));
        assert_eq!(ColumnExpr::parse("t.*").output_name(), None);
    }
}
