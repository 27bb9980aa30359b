use crate::parser::{ast::JoinKind, Phase, QueryParser, WordComparer};

#[derive(Debug)]
pub struct QueryComparers {
    pub with: WordComparer,
    pub recursive: WordComparer,
    pub select: WordComparer,
    pub distinct: WordComparer,
    pub all: WordComparer,
    pub alias: WordComparer,
    pub from: WordComparer,
    pub join_keywords: Vec<(WordComparer, JoinKind)>,
    pub on: WordComparer,
    pub using: WordComparer,
    pub r#where: WordComparer,
    pub group_by: WordComparer,
    pub having: WordComparer,
    pub order_by: WordComparer,
    pub limit: WordComparer,
    pub offset: WordComparer,
    pub set_operations: Vec<WordComparer>,
    pub over: WordComparer,
    pub and: WordComparer,
    pub or: WordComparer,
    pub not: WordComparer,
    pub between: WordComparer,
    pub like: WordComparer,
    pub not_like: WordComparer,
    pub is_null: WordComparer,
    pub is_not_null: WordComparer,
    pub r#in: WordComparer,
    pub not_in: WordComparer,
    pub b_true: WordComparer,
    pub b_false: WordComparer,
    pub null: WordComparer,
}

impl Default for QueryComparers {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryComparers {
    pub fn new() -> Self {
        let clause = |word: &str| WordComparer::new(word).with_any_delimiter_postfix().with_eof();

        Self {
            with: clause("WITH"),
            recursive: clause("RECURSIVE"),
            select: clause("SELECT"),
            distinct: clause("DISTINCT"),
            all: clause("ALL"),
            alias: WordComparer::new("AS").with_any_delimiter_postfix(),
            from: clause("FROM"),
            // longest spellings first so `LEFT OUTER JOIN` never reads as `LEFT`
            join_keywords: vec![
                (clause("INNER JOIN"), JoinKind::Inner),
                (clause("LEFT OUTER JOIN"), JoinKind::Left),
                (clause("LEFT JOIN"), JoinKind::Left),
                (clause("RIGHT OUTER JOIN"), JoinKind::Right),
                (clause("RIGHT JOIN"), JoinKind::Right),
                (clause("FULL OUTER JOIN"), JoinKind::Full),
                (clause("FULL JOIN"), JoinKind::Full),
                (clause("CROSS JOIN"), JoinKind::Cross),
                (clause("NATURAL JOIN"), JoinKind::Natural),
                (clause("JOIN"), JoinKind::Inner),
            ],
            on: clause("ON"),
            using: clause("USING"),
            r#where: clause("WHERE"),
            group_by: clause("GROUP BY"),
            having: clause("HAVING"),
            order_by: clause("ORDER BY"),
            limit: clause("LIMIT"),
            offset: clause("OFFSET"),
            set_operations: vec![
                clause("UNION ALL"),
                clause("UNION"),
                clause("INTERSECT"),
                clause("EXCEPT"),
            ],
            over: clause("OVER"),
            and: clause("AND"),
            or: clause("OR"),
            not: clause("NOT"),
            between: clause("BETWEEN"),
            like: clause("LIKE"),
            not_like: clause("NOT LIKE"),
            is_null: clause("IS NULL"),
            is_not_null: clause("IS NOT NULL"),
            r#in: WordComparer::new("IN").with_any_delimiter_postfix(),
            not_in: WordComparer::new("NOT IN").with_any_delimiter_postfix(),
            b_true: clause("TRUE"),
            b_false: clause("FALSE"),
            null: clause("NULL"),
        }
    }

    /// Join keyword at the cursor with its matched length.
    pub fn join_at(&self, parser: &QueryParser) -> Option<(JoinKind, usize)> {
        self.join_keywords
            .iter()
            .find_map(|(comparer, kind)| comparer.matches(parser).map(|length| (*kind, length)))
    }

    /// Clause keyword at the cursor, if any.
    ///
    /// `FROM` preceded by `DISTINCT` belongs to `IS DISTINCT FROM` and is not a clause.
    pub fn clause_at(&self, parser: &QueryParser) -> Option<Phase> {
        if self.order_by.compare(parser) {
            return Some(Phase::OrderBy);
        }
        if self.having.compare(parser) {
            return Some(Phase::Having);
        }
        if self.group_by.compare(parser) {
            return Some(Phase::Aggregates);
        }
        if self.r#where.compare(parser) {
            return Some(Phase::Criteria);
        }
        if self.join_at(parser).is_some() {
            return Some(Phase::Joins);
        }
        if self.from.compare(parser) && !parser.previous_word().eq_ignore_ascii_case("DISTINCT") {
            return Some(Phase::Collections);
        }
        if self.limit.compare(parser) || self.offset.compare(parser) {
            return Some(Phase::LimitAndOffset);
        }
        if self.set_operations.iter().any(|comparer| comparer.compare(parser)) {
            return Some(Phase::SetOperation);
        }

        None
    }
}
