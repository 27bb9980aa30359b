/// Clause currently being read by the [`QueryParser`](crate::parser::QueryParser).
///
/// Phases only move forward, except `Joins` which may repeat once per join.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    #[default]
    Projection = 0,
    Collections = 1,
    Joins = 2,
    Criteria = 3,
    Aggregates = 4,
    Having = 5,
    OrderBy = 6,
    LimitAndOffset = 7,
    SetOperation = 8,
    EOF = 9,
}

impl Phase {
    /// Whether a clause keyword for `next` may follow a clause in `self`.
    pub fn accepts(&self, next: Phase) -> bool {
        match next {
            Phase::Joins => *self <= Phase::Joins && *self >= Phase::Collections,
            Phase::SetOperation => true,
            _ => next > *self,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::Phase;

    #[test]
    pub fn test_phase_moves_forward() {
        assert!(Phase::Projection.accepts(Phase::Collections));
        assert!(Phase::Collections.accepts(Phase::Criteria));
        assert!(!Phase::Criteria.accepts(Phase::Collections));
        assert!(!Phase::Having.accepts(Phase::Aggregates));
    }

    #[test]
    pub fn test_phase_joins_repeat() {
        assert!(Phase::Collections.accepts(Phase::Joins));
        assert!(Phase::Joins.accepts(Phase::Joins));
        assert!(!Phase::Projection.accepts(Phase::Joins));
        assert!(!Phase::Criteria.accepts(Phase::Joins));
    }

    #[test]
    pub fn test_phase_set_operation_anywhere() {
        assert!(Phase::OrderBy.accepts(Phase::SetOperation));
        assert!(Phase::Criteria.accepts(Phase::SetOperation));
    }
}
