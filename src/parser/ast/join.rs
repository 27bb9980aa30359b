use serde::{Deserialize, Serialize};

use crate::parser::{ast::{ClauseCollector, Collection, Predicate}, ParseError, Phase, QueryParser};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    Natural,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinDescriptor {
    pub kind: JoinKind,
    pub target: Collection,
    pub condition: Option<Predicate>,
}

impl JoinDescriptor {
    /// Reads consecutive join clauses while the parser stays in the `Joins` phase.
    pub fn parse(parser: &mut QueryParser) -> Result<Vec<JoinDescriptor>, ParseError> {
        let mut joins: Vec<JoinDescriptor> = vec![];
        while parser.phase == Phase::Joins {
            let pivot = parser.position;
            let Some((kind, length)) = parser.comparers.join_at(parser) else {
                return ParseError::new("Invalid join type", pivot, parser).err();
            };
            parser.jump(length);
            parser.next_non_whitespace();

            let target_text = ClauseCollector::collect_until(parser, &|p| {
                p.comparers.on.compare(p) || p.comparers.using.compare(p)
            });
            if target_text.is_empty() {
                return ParseError::new("Join without target", pivot, parser).err();
            }
            let target = Collection::parse(&target_text);

            let condition_pivot = parser.position;
            let condition = if let Some(length) = parser.comparers.on.matches(parser) {
                parser.jump(length);
                let text = ClauseCollector::collect(parser);
                if text.is_empty() {
                    return ParseError::new("Join condition is empty", condition_pivot, parser).err();
                }
                match Predicate::parse(&text) {
                    Ok(condition) => Some(condition),
                    Err(message) => return ParseError::new(message, condition_pivot, parser).err(),
                }
            } else if let Some(length) = parser.comparers.using.matches(parser) {
                parser.jump(length);
                let text = ClauseCollector::collect(parser);
                if text.is_empty() {
                    return ParseError::new("Join USING list is empty", condition_pivot, parser).err();
                }
                Some(Predicate::Opaque(format!("USING {}", ClauseCollector::normalize(&text))))
            } else {
                None
            };

            joins.push(JoinDescriptor { kind, target, condition });

            let next_pivot = parser.position;
            if !parser.check_next_phase() {
                return ParseError::new("Unexpected token after join", next_pivot, parser).err();
            }
        }

        Ok(joins)
    }

    /// Raw text the join contributes, for invocation scanning.
    pub fn text(&self) -> String {
        match &self.condition {
            Some(condition) => format!("{} {}", self.target.render(), condition),
            None => self.target.render(),
        }
    }
}
