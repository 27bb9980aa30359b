use serde::{Deserialize, Serialize};

use crate::parser::{ast::{ClauseCollector, ComparatorOp, Literal, Operand}, QueryComparers, QueryParser, WordComparer};

/// Boolean expression tree for `WHERE`, `HAVING` and join conditions.
///
/// Shapes the parser does not fully understand are kept verbatim in
/// `Opaque`, so nothing in the original condition is ever lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare { left: Operand, op: ComparatorOp, right: Operand },
    IsNull { column: String, negated: bool },
    InList { column: String, list: Vec<Literal>, negated: bool },
    Like { column: String, pattern: String, negated: bool },
    Opaque(String),
}

type Pick = fn(&QueryComparers) -> &WordComparer;

impl Predicate {
    /// Reads a condition. Shapes that are well formed but not understood
    /// become `Opaque`; empty operands, dangling connectives and empty
    /// `IN ()` lists are errors.
    pub fn parse(text: &str) -> Result<Predicate, &'static str> {
        let text = ClauseCollector::normalize(text);
        if text.is_empty() {
            return Err("Empty condition");
        }

        let ors = Self::split_on(&text, |c| &c.or, false);
        if ors.len() > 1 {
            if ors.iter().any(|part| part.is_empty()) {
                return Err("Missing operand for OR");
            }
            return ors.iter().map(|part| Self::parse(part)).collect::<Result<Vec<_>, _>>().map(Predicate::Or);
        }

        let ands = Self::split_on(&text, |c| &c.and, true);
        if ands.len() > 1 {
            if ands.iter().any(|part| part.is_empty()) {
                return Err("Missing operand for AND");
            }
            return ands.iter().map(|part| Self::parse(part)).collect::<Result<Vec<_>, _>>().map(Predicate::And);
        }

        let parser = QueryParser::new(&text);
        if let Some(length) = parser.comparers.not.matches(&parser) {
            let rest = parser.text_from_range(length, parser.length);
            if rest.trim().is_empty() {
                return Err("Missing operand for NOT");
            }
            return Ok(Predicate::Not(Box::new(Self::parse(&rest)?)));
        }

        if let Some(inner) = ClauseCollector::strip_wrapping_parentheses(&text) {
            if ClauseCollector::is_query_text(&inner) {
                return Ok(Predicate::Opaque(text));
            }
            return Self::parse(&inner);
        }

        if Self::has_empty_in_list(&text) {
            return Err("Empty IN list");
        }

        Ok(Self::parse_single(&text).unwrap_or(Predicate::Opaque(text)))
    }

    /// A single condition without top-level `AND`/`OR`.
    pub fn parse_single(text: &str) -> Option<Predicate> {
        let parser = QueryParser::new(text);

        for (pick, negated) in [(Self::pick_is_not_null as Pick, true), (Self::pick_is_null as Pick, false)] {
            if let Some((start, length)) = Self::find_keyword(text, pick) {
                if start + length == parser.length {
                    let column = Self::column_operand(&parser.text_from_range(0, start))?;
                    return Some(Predicate::IsNull { column, negated });
                }
            }
        }

        for (pick, negated) in [(Self::pick_not_like as Pick, true), (Self::pick_like as Pick, false)] {
            if let Some((start, length)) = Self::find_keyword(text, pick) {
                let column = Self::column_operand(&parser.text_from_range(0, start))?;
                return match Literal::parse(&parser.text_from_range(start + length, parser.length))? {
                    Literal::Text(pattern) => Some(Predicate::Like { column, pattern, negated }),
                    _ => None,
                };
            }
        }

        for (pick, negated) in [(Self::pick_not_in as Pick, true), (Self::pick_in as Pick, false)] {
            if let Some((start, length)) = Self::find_keyword(text, pick) {
                let column = Self::column_operand(&parser.text_from_range(0, start))?;
                let list_text = parser.text_from_range(start + length, parser.length);
                let inner = ClauseCollector::strip_wrapping_parentheses(&list_text)?;
                let list = ClauseCollector::split_top_level(&inner, ',')
                    .iter()
                    .map(|item| Literal::parse(item))
                    .collect::<Option<Vec<_>>>()?;
                return Some(Predicate::InList { column, list, negated });
            }
        }

        let (start, op, length) = ComparatorOp::find_top_level(text)?;
        let left = Operand::parse(&parser.text_from_range(0, start))?;
        let right = Operand::parse(&parser.text_from_range(start + length, parser.length))?;
        Some(Predicate::Compare { left, op, right })
    }

    pub fn is_fully_structured(&self) -> bool {
        match self {
            Predicate::And(items) | Predicate::Or(items) => items.iter().all(Predicate::is_fully_structured),
            Predicate::Not(inner) => inner.is_fully_structured(),
            Predicate::Opaque(_) => false,
            _ => true,
        }
    }

    fn pick_is_null(c: &QueryComparers) -> &WordComparer { &c.is_null }
    fn pick_is_not_null(c: &QueryComparers) -> &WordComparer { &c.is_not_null }
    fn pick_like(c: &QueryComparers) -> &WordComparer { &c.like }
    fn pick_not_like(c: &QueryComparers) -> &WordComparer { &c.not_like }
    fn pick_in(c: &QueryComparers) -> &WordComparer { &c.r#in }
    fn pick_not_in(c: &QueryComparers) -> &WordComparer { &c.not_in }

    fn has_empty_in_list(text: &str) -> bool {
        [Self::pick_not_in as Pick, Self::pick_in as Pick].into_iter().any(|pick| {
            Self::find_keyword(text, pick).is_some_and(|(start, length)| {
                let parser = QueryParser::new(text);
                let list_text = parser.text_from_range(start + length, parser.length);
                ClauseCollector::strip_wrapping_parentheses(&list_text).is_some_and(|inner| inner.is_empty())
            })
        })
    }

    fn column_operand(text: &str) -> Option<String> {
        match Operand::parse(text)? {
            Operand::Column(name) => Some(name),
            Operand::Literal(_) => None,
        }
    }

    fn find_keyword(text: &str, pick: Pick) -> Option<(usize, usize)> {
        let mut parser = QueryParser::new(text);
        while !parser.eof() {
            if parser.is_top_level() {
                if let Some(length) = pick(&parser.comparers).matches(&parser) {
                    return Some((parser.position, length));
                }
            }
            parser.advance();
        }
        None
    }

    /// Splits on a top-level connective. With `between_aware`, the `AND` of a
    /// `BETWEEN x AND y` stays inside its condition.
    fn split_on(text: &str, pick: Pick, between_aware: bool) -> Vec<String> {
        let mut parser = QueryParser::new(text);
        let mut parts = vec![];
        let mut pivot = 0;
        let mut open_between = false;
        while !parser.eof() {
            if parser.is_top_level() {
                if between_aware && parser.comparers.between.compare(&parser) {
                    open_between = true;
                }
                if let Some(length) = pick(&parser.comparers).matches(&parser) {
                    if open_between {
                        open_between = false;
                    } else {
                        parts.push(parser.text_from_pivot(pivot).trim().to_string());
                        parser.jump(length);
                        pivot = parser.position;
                        continue;
                    }
                }
            }
            parser.advance();
        }
        parts.push(parser.text_from_pivot(pivot).trim().to_string());
        parts
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::And(items) => {
                let parts = items
                    .iter()
                    .map(|item| match item {
                        Predicate::Or(_) => format!("({item})"),
                        _ => item.to_string(),
                    })
                    .collect::<Vec<_>>();
                write!(f, "{}", parts.join(" AND "))
            }
            Predicate::Or(items) => {
                let parts = items.iter().map(|item| item.to_string()).collect::<Vec<_>>();
                write!(f, "{}", parts.join(" OR "))
            }
            Predicate::Not(inner) => match inner.as_ref() {
                Predicate::And(_) | Predicate::Or(_) => write!(f, "NOT ({inner})"),
                _ => write!(f, "NOT {inner}"),
            },
            Predicate::Compare { left, op, right } => write!(f, "{left} {op} {right}"),
            Predicate::IsNull { column, negated } => {
                write!(f, "{column} IS {}NULL", if *negated { "NOT " } else { "" })
            }
            Predicate::InList { column, list, negated } => {
                let items = list.iter().map(|item| item.to_string()).collect::<Vec<_>>();
                write!(f, "{column} {}IN ({})", if *negated { "NOT " } else { "" }, items.join(", "))
            }
            Predicate::Like { column, pattern, negated } => {
                let pattern = Literal::Text(pattern.clone());
                write!(f, "{column} {}LIKE {pattern}", if *negated { "NOT " } else { "" })
            }
            Predicate::Opaque(text) => write!(f, "{text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::{ComparatorOp, Literal, Operand, Predicate};

    #[test]
    pub fn test_predicate_single_equal() {
        let result = Predicate::parse("status='active'").expect("Failed to parse predicate");

        match result {
            Predicate::Compare { left, op, right } => {
                assert_eq!(left, Operand::Column("status".into()));
                assert_eq!(op, ComparatorOp::Eq);
                assert_eq!(right, Operand::Literal(Literal::Text("active".into())));
            }
            _ => panic!(),
        }
    }

    #[test]
    pub fn test_predicate_and_or_precedence() {
        let result = Predicate::parse("a > 1 AND b < 2 OR c = 3").expect("Failed to parse predicate");

        match result {
            Predicate::Or(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(&items[0], Predicate::And(parts) if parts.len() == 2));
            }
            _ => panic!(),
        }
    }

    #[test]
    pub fn test_predicate_parenthesized_group() {
        let result = Predicate::parse("A.Age > 16 AND (B.city = 'Porto' OR B.city LIKE 'Mat%')").expect("Failed to parse predicate");

        match result {
            Predicate::And(items) => {
                assert_eq!(items.len(), 2);
                assert!(matches!(&items[1], Predicate::Or(parts) if parts.len() == 2));
            }
            _ => panic!(),
        }
    }

    #[test]
    pub fn test_predicate_between_stays_whole() {
        let result = Predicate::parse("x BETWEEN 1 AND 5 AND y = 2").expect("Failed to parse predicate");

        match result {
            Predicate::And(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0], Predicate::Opaque("x BETWEEN 1 AND 5".into()));
            }
            _ => panic!(),
        }
    }

    #[test]
    pub fn test_predicate_null_checks() {
        assert_eq!(
            Predicate::parse("email IS NOT NULL").expect("Failed to parse predicate"),
            Predicate::IsNull { column: "email".into(), negated: true }
        );
        assert_eq!(
            Predicate::parse("email is null").expect("Failed to parse predicate"),
            Predicate::IsNull { column: "email".into(), negated: false }
        );
    }

    #[test]
    pub fn test_predicate_in_list() {
        assert_eq!(
            Predicate::parse("region NOT IN ('eu', 'us')").expect("Failed to parse predicate"),
            Predicate::InList {
                column: "region".into(),
                list: vec![Literal::Text("eu".into()), Literal::Text("us".into())],
                negated: true,
            }
        );
    }

    #[test]
    pub fn test_predicate_subquery_is_opaque() {
        let result = Predicate::parse("id IN (SELECT ref_id FROM other)").expect("Failed to parse predicate");

        assert_eq!(result, Predicate::Opaque("id IN (SELECT ref_id FROM other)".into()));
        assert!(!result.is_fully_structured());
    }

    #[test]
    pub fn test_predicate_not() {
        let result = Predicate::parse("NOT (a = 1 OR b = 2)").expect("Failed to parse predicate");

        assert!(matches!(&result, Predicate::Not(inner) if matches!(inner.as_ref(), Predicate::Or(_))));
        assert_eq!(result.to_string(), "NOT (a = 1 OR b = 2)");
    }

    #[test]
    pub fn test_predicate_display() {
        let result = Predicate::parse("(a = 1 OR b = 'x') AND c LIKE 'q%'").expect("Failed to parse predicate");

        assert_eq!(result.to_string(), "(a = 1 OR b = 'x') AND c LIKE 'q%'");
    }

    #[test]
    pub fn test_predicate_rejects_dangling_connectives() {
        assert_eq!(Predicate::parse("c = 1 OR"), Err("Missing operand for OR"));
        assert_eq!(Predicate::parse("AND c = 1"), Err("Missing operand for AND"));
        assert_eq!(Predicate::parse("a = 1 OR (b = 2 AND)"), Err("Missing operand for AND"));
        assert_eq!(Predicate::parse("NOT"), Err("Missing operand for NOT"));
        assert_eq!(Predicate::parse("()"), Err("Empty condition"));
    }

    #[test]
    pub fn test_predicate_rejects_empty_in_list() {
        assert_eq!(Predicate::parse("region IN ()"), Err("Empty IN list"));
        assert_eq!(Predicate::parse("region NOT IN ( )"), Err("Empty IN list"));
        assert!(Predicate::parse("region IN ('()')").is_ok());
    }
}
