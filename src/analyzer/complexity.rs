use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parser::ast::ParsedQuery;

/// Coarse cost class of a statement. Ordering follows cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComplexityTier {
    Simple,
    Moderate,
    Complex,
    VeryComplex,
}

impl ComplexityTier {
    pub const ALL: [ComplexityTier; 4] = [
        ComplexityTier::Simple,
        ComplexityTier::Moderate,
        ComplexityTier::Complex,
        ComplexityTier::VeryComplex,
    ];

    pub fn from_score(score: usize) -> Self {
        match score {
            0 => Self::Simple,
            1..=2 => Self::Moderate,
            3..=5 => Self::Complex,
            _ => Self::VeryComplex,
        }
    }

    pub fn ordinal(&self) -> u32 {
        *self as u32
    }

    /// Number of tier steps between two tiers.
    pub fn distance(&self, other: ComplexityTier) -> u32 {
        self.ordinal().abs_diff(other.ordinal())
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => write!(f, "Simple"),
            Self::Moderate => write!(f, "Moderate"),
            Self::Complex => write!(f, "Complex"),
            Self::VeryComplex => write!(f, "VeryComplex"),
        }
    }
}

pub struct ComplexityClassifier;

impl ComplexityClassifier {
    /// One point per subquery, join, window invocation and aggregate
    /// invocation, plus one each for a `GROUP BY` and a `HAVING`.
    pub fn score(query: &ParsedQuery) -> usize {
        query.subqueries.len()
            + query.joins.len()
            + query.window_functions.len()
            + query.aggregate_functions.len()
            + usize::from(!query.group_by.is_empty())
            + usize::from(query.having_expr.is_some())
    }

    pub fn classify(query: &ParsedQuery) -> ComplexityTier {
        ComplexityTier::from_score(Self::score(query))
    }
}
