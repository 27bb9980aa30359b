use std::future::Future;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::executor::{Check, CheckOutcome};

/// Failure reported by an execution or verification backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Tabular result of one statement.
///
/// Only the shape is serialized; rows stay in process for verification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultHandle {
    pub row_count: u64,
    pub columns: Vec<String>,
    #[serde(skip)]
    pub rows: Vec<Map<String, Value>>,
}

impl ResultHandle {
    pub fn from_rows(columns: Vec<String>, rows: Vec<Map<String, Value>>) -> Self {
        Self { row_count: rows.len() as u64, columns, rows }
    }
}

/// Runs one SQL statement. Must support predicate-less full scans.
pub trait ExecutionBackend: Send + Sync + 'static {
    fn execute(&self, sql: &str) -> impl Future<Output = Result<ResultHandle, BackendError>> + Send;
}

/// Evaluates declarative checks over a result.
pub trait VerificationBackend: Send + Sync + 'static {
    fn verify(
        &self,
        handle: &ResultHandle,
        checks: &[Check],
    ) -> impl Future<Output = Result<IndexMap<String, CheckOutcome>, BackendError>> + Send;
}
