use serde::{Deserialize, Serialize};

use crate::parser::QueryParser;

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparatorOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq
}

use std::fmt;

impl fmt::Display for ComparatorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparatorOp::Eq => write!(f, "="),
            ComparatorOp::NotEq => write!(f, "<>"),
            ComparatorOp::Lt => write!(f, "<"),
            ComparatorOp::LtEq => write!(f, "<="),
            ComparatorOp::Gt => write!(f, ">"),
            ComparatorOp::GtEq => write!(f, ">="),
        }
    }
}

impl fmt::Debug for ComparatorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComparatorOp({})", self)
    }
}

impl ComparatorOp {
    /// Operator at the cursor with its length in characters.
    pub fn check(parser: &QueryParser) -> Option<(ComparatorOp, usize)> {
        match (parser.current(), parser.peek(1)) {
            ('>', '=') => Some((ComparatorOp::GtEq, 2)),
            ('<', '=') => Some((ComparatorOp::LtEq, 2)),
            ('<', '>') | ('!', '=') => Some((ComparatorOp::NotEq, 2)),
            ('=', _) => Some((ComparatorOp::Eq, 1)),
            ('<', _) => Some((ComparatorOp::Lt, 1)),
            ('>', _) => Some((ComparatorOp::Gt, 1)),
            _ => None,
        }
    }

    /// First top-level comparison operator in `text`: (start index, op, length).
    pub fn find_top_level(text: &str) -> Option<(usize, ComparatorOp, usize)> {
        let mut parser = QueryParser::new(text);
        while !parser.eof() {
            if parser.is_top_level() {
                if let Some((op, length)) = Self::check(&parser) {
                    return Some((parser.position, op, length));
                }
            }
            parser.advance();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::ComparatorOp;

    #[test]
    pub fn test_find_top_level() {
        assert_eq!(ComparatorOp::find_top_level("a >= 3"), Some((2, ComparatorOp::GtEq, 2)));
        assert_eq!(ComparatorOp::find_top_level("a != 'x'"), Some((2, ComparatorOp::NotEq, 2)));
        assert_eq!(ComparatorOp::find_top_level("f(a = 1) <> b"), Some((9, ComparatorOp::NotEq, 2)));
        assert_eq!(ComparatorOp::find_top_level("'a=b'"), None);
    }
}
