use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{analyzer::AnalysisError, parser::ast::ParsedQuery};

/// One statement as submitted, before parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuery {
    pub id: String,
    pub sql: String,
}

impl RawQuery {
    pub fn new(id: &str, sql: &str) -> Self {
        Self { id: id.to_string(), sql: sql.to_string() }
    }

    /// Numbers statements `q1`, `q2`, … in submission order.
    pub fn from_texts(texts: &[&str]) -> Vec<RawQuery> {
        texts
            .iter()
            .enumerate()
            .map(|(index, sql)| RawQuery::new(&format!("q{}", index + 1), sql))
            .collect()
    }
}

/// Batch files accept bare statements and `{ "id", "sql" }` objects alike.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Text(String),
    Query(RawQuery),
}

impl BatchEntry {
    pub fn from_json(text: &str) -> Result<Vec<RawQuery>, serde_json::Error> {
        let entries: Vec<BatchEntry> = serde_json::from_str(text)?;
        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| match entry {
                BatchEntry::Text(sql) => RawQuery { id: format!("q{}", index + 1), sql },
                BatchEntry::Query(query) => query,
            })
            .collect())
    }
}

/// Parse outcome of a whole batch.
#[derive(Debug, Clone, Default)]
pub struct BatchAnalysis {
    pub queries: Vec<ParsedQuery>,
    pub errors: Vec<AnalysisError>,
    /// Every submitted id in submission order, parsed or not.
    pub order: Vec<String>,
}

impl BatchAnalysis {
    /// Parses every statement; failures are collected and never stop the batch.
    pub fn analyze(batch: &[RawQuery]) -> BatchAnalysis {
        let mut analysis = BatchAnalysis::default();
        let mut seen: IndexSet<&str> = IndexSet::new();

        for raw in batch.iter() {
            if !seen.insert(raw.id.as_str()) {
                warn!(query_id = %raw.id, "duplicate query id");
                analysis.errors.push(AnalysisError::ParseFailure {
                    query_id: raw.id.clone(),
                    detail: "duplicate query id".to_string(),
                });
                continue;
            }
            analysis.order.push(raw.id.clone());

            match ParsedQuery::parse(&raw.id, &raw.sql) {
                Ok(query) => analysis.queries.push(query),
                Err(error) => {
                    debug!(query_id = %raw.id, error = %error, "query rejected");
                    analysis.errors.push(AnalysisError::parse_failure(&raw.id, &error));
                }
            }
        }

        analysis
    }

    pub fn query(&self, id: &str) -> Option<&ParsedQuery> {
        self.queries.iter().find(|query| query.id == id)
    }
}
