use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::ParseError;

/// Failures raised while turning a batch of statements into a plan.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AnalysisError {
    #[error("query {query_id} could not be parsed: {detail}")]
    ParseFailure { query_id: String, detail: String },

    #[error("incompatible group requested: {reason}")]
    IncompatibleGroupRequested { reason: String },

    #[error("batch has no valid queries ({} rejected): {}", .rejected.len(), describe(.rejected))]
    EmptyBatch { rejected: Vec<AnalysisError> },
}

fn describe(errors: &[AnalysisError]) -> String {
    errors.iter().map(|error| error.to_string()).collect::<Vec<_>>().join("; ")
}

impl AnalysisError {
    pub fn parse_failure(query_id: &str, error: &ParseError) -> Self {
        Self::ParseFailure { query_id: query_id.to_string(), detail: error.to_string() }
    }

    /// Query the error belongs to, when it belongs to a single one.
    pub fn query_id(&self) -> Option<&str> {
        match self {
            Self::ParseFailure { query_id, .. } => Some(query_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{analyzer::AnalysisError, parser::ast::ParsedQuery};

    #[test]
    pub fn test_parse_failure_carries_query_id() {
        let error = ParsedQuery::parse("q9", "SELECT a").expect_err("Failed to reject query without FROM");
        let error = AnalysisError::parse_failure("q9", &error);

        assert_eq!(error.query_id(), Some("q9"));
        assert!(error.to_string().starts_with("query q9 could not be parsed: Missing FROM clause"));
    }

    #[test]
    pub fn test_serialized_shape() {
        let error = AnalysisError::EmptyBatch {
            rejected: vec![AnalysisError::ParseFailure { query_id: "q1".into(), detail: "Expected SELECT".into() }],
        };
        let json = serde_json::to_value(&error).expect("Failed to serialize error");

        assert_eq!(
            json,
            serde_json::json!({
                "kind": "emptyBatch",
                "rejected": [{ "kind": "parseFailure", "queryId": "q1", "detail": "Expected SELECT" }]
            })
        );
    }

    #[test]
    pub fn test_empty_batch_lists_every_rejection() {
        let error = AnalysisError::EmptyBatch {
            rejected: vec![
                AnalysisError::ParseFailure { query_id: "q1".into(), detail: "Missing FROM clause".into() },
                AnalysisError::ParseFailure { query_id: "q2".into(), detail: "Expected SELECT".into() },
            ],
        };

        assert_eq!(
            error.to_string(),
            "batch has no valid queries (2 rejected): query q1 could not be parsed: Missing FROM clause; \
             query q2 could not be parsed: Expected SELECT"
        );
    }
}
