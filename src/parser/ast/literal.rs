use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::parser::{ast::ColumnExpr, QueryParser};

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").expect("number pattern is valid")
});

/// A constant as written in the statement. Numbers keep their source text so
/// rendering never changes precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Literal {
    Text(String),
    Number(String),
    Bool(bool),
    Null,
}

impl Literal {
    pub fn parse(text: &str) -> Option<Literal> {
        let text = text.trim();
        let parser = QueryParser::new(text);

        if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
            let inner = &text[1..text.len() - 1];
            // an unescaped quote inside means this is not one literal
            if inner.replace("''", "").contains('\'') {
                return None;
            }
            return Some(Literal::Text(inner.replace("''", "'")));
        }
        if NUMBER.is_match(text) {
            return Some(Literal::Number(text.to_string()));
        }
        if parser.comparers.b_true.matches(&parser) == Some(parser.length) {
            return Some(Literal::Bool(true));
        }
        if parser.comparers.b_false.matches(&parser) == Some(parser.length) {
            return Some(Literal::Bool(false));
        }
        if parser.comparers.null.matches(&parser) == Some(parser.length) {
            return Some(Literal::Null);
        }
        None
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Number(raw) => raw.parse::<f64>().ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Text(text) => write!(f, "'{}'", text.replace('\'', "''")),
            Literal::Number(raw) => write!(f, "{raw}"),
            Literal::Bool(value) => write!(f, "{}", if *value { "TRUE" } else { "FALSE" }),
            Literal::Null => write!(f, "NULL"),
        }
    }
}

/// Side of a comparison the parser fully understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum Operand {
    Column(String),
    Literal(Literal),
}

impl Operand {
    pub fn parse(text: &str) -> Option<Operand> {
        let text = text.trim();
        if let Some(literal) = Literal::parse(text) {
            return Some(Operand::Literal(literal));
        }
        if ColumnExpr::is_identifier(text) && !text.ends_with('*') {
            return Some(Operand::Column(text.to_string()));
        }
        None
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Column(name) => write!(f, "{name}"),
            Operand::Literal(literal) => write!(f, "{literal}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::{Literal, Operand};

    #[test]
    pub fn test_literals() {
        assert_eq!(Literal::parse("'active'"), Some(Literal::Text("active".into())));
        assert_eq!(Literal::parse("'it''s'"), Some(Literal::Text("it's".into())));
        assert_eq!(Literal::parse("-12.5"), Some(Literal::Number("-12.5".into())));
        assert_eq!(Literal::parse("true"), Some(Literal::Bool(true)));
        assert_eq!(Literal::parse("NULL"), Some(Literal::Null));
        assert_eq!(Literal::parse("'a' || 'b'"), None);
        assert_eq!(Literal::parse("nullable"), None);
    }

    #[test]
    pub fn test_literal_display_escapes() {
        assert_eq!(Literal::Text("it's".into()).to_string(), "'it''s'");
    }

    #[test]
    pub fn test_operands() {
        assert_eq!(Operand::parse("t.status"), Some(Operand::Column("t.status".into())));
        assert_eq!(Operand::parse("42"), Some(Operand::Literal(Literal::Number("42".into()))));
        assert_eq!(Operand::parse("a + 1"), None);
        assert_eq!(Operand::parse("UPPER(a)"), None);
    }
}
