use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Outcome of a predicate under SQL three-valued logic. Only `True` keeps a
/// row; comparisons involving NULL yield `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    pub fn from_bool(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }

    pub fn is_true(&self) -> bool {
        *self == Self::True
    }

    pub fn not(&self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }

    /// `False` dominates, then `Unknown`.
    pub fn and(&self, other: Self) -> Self {
        if *self == Self::False || other == Self::False {
            Self::False
        } else if *self == Self::Unknown || other == Self::Unknown {
            Self::Unknown
        } else {
            Self::True
        }
    }

    /// `True` dominates, then `Unknown`.
    pub fn or(&self, other: Self) -> Self {
        self.not().and(other.not()).not()
    }
}

impl Display for Truth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::True => "TRUE",
            Self::False => "FALSE",
            Self::Unknown => "UNKNOWN",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::ast::Truth;

    #[test]
    pub fn test_unknown_propagation() {
        assert_eq!(Truth::Unknown.and(Truth::True), Truth::Unknown);
        assert_eq!(Truth::Unknown.and(Truth::False), Truth::False);
        assert_eq!(Truth::Unknown.or(Truth::True), Truth::True);
        assert_eq!(Truth::Unknown.or(Truth::False), Truth::Unknown);
        assert_eq!(Truth::Unknown.not(), Truth::Unknown);
    }

    #[test]
    pub fn test_only_true_keeps_a_row() {
        assert!(Truth::from_bool(true).is_true());
        assert!(!Truth::Unknown.is_true());
        assert_eq!(Truth::False.or(Truth::False).to_string(), "FALSE");
    }
}
