use std::{path::Path, sync::{Arc, RwLock}};

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
    executor::{eval::Eval, BackendError, ExecutionBackend, ResultHandle},
    parser::ast::{Collection, ColumnExpr, ParsedQuery, Truth},
};

pub type Rows = Vec<Map<String, Value>>;

/// Named JSON tables shared between clones of a [`MemoryBackend`].
pub type Tables = Arc<RwLock<IndexMap<String, Rows>>>;

/// In-process execution backend over named tables of JSON rows.
///
/// It runs the statements the consolidator emits: one table, a projection of
/// plain identifiers or `*`, and an optional filter built only from
/// structured predicates. Anything else is reported as a backend error.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    tables: Tables,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a document of the form `{ "table": [ {row}, … ], … }`.
    pub fn from_json(document: Value) -> Result<Self, BackendError> {
        let Value::Object(entries) = document else {
            return Err(BackendError::new("dataset must be an object of tables"));
        };
        let backend = Self::new();
        for (name, rows) in entries {
            let Value::Array(items) = rows else {
                return Err(BackendError::new(format!("table {name} must be an array of rows")));
            };
            let rows = items
                .into_iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row),
                    _ => Err(BackendError::new(format!("table {name} contains a row that is not an object"))),
                })
                .collect::<Result<Rows, BackendError>>()?;
            backend.insert_table(&name, rows)?;
        }
        Ok(backend)
    }

    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BackendError::new(format!("cannot read dataset {}: {e}", path.display())))?;
        let document: Value = serde_json::from_str(&text)
            .map_err(|e| BackendError::new(format!("cannot decode dataset {}: {e}", path.display())))?;
        Self::from_json(document)
    }

    pub fn insert_table(&self, name: &str, rows: Rows) -> Result<(), BackendError> {
        let mut tables = self.tables.write().map_err(|_| BackendError::new("dataset lock poisoned"))?;
        tables.insert(name.to_string(), rows);
        Ok(())
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables
            .read()
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Runs one statement synchronously.
    pub fn run(&self, sql: &str) -> Result<ResultHandle, BackendError> {
        let query = ParsedQuery::parse("statement", sql).map_err(|e| BackendError::new(format!("cannot parse statement: {e}")))?;
        Self::ensure_supported(&query)?;

        let tables = self.tables.read().map_err(|_| BackendError::new("dataset lock poisoned"))?;
        let Some(rows) = tables
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(&query.source_table))
            .map(|(_, rows)| rows)
        else {
            return Err(BackendError::new(format!("unknown table {}", query.source_table)));
        };

        let columns = Self::output_columns(&query, rows);
        let selected = rows
            .iter()
            .filter(|row| match &query.where_expr {
                Some(predicate) => Eval::eval_predicate3(predicate, row) == Truth::True,
                None => true,
            })
            .map(|row| Self::project(&query, row))
            .collect::<Rows>();

        debug!(table = %query.source_table, scanned = rows.len(), returned = selected.len(), "statement executed in memory");
        Ok(ResultHandle::from_rows(columns, selected))
    }

    fn ensure_supported(query: &ParsedQuery) -> Result<(), BackendError> {
        let unsupported = |what: &str| -> Result<(), BackendError> {
            Err(BackendError::new(format!("{what} is not supported by the in-memory backend")))
        };

        if !matches!(query.source, Collection::Table { .. }) {
            return unsupported("a non-table source");
        }
        if !query.joins.is_empty() {
            return unsupported("JOIN");
        }
        if !query.subqueries.is_empty() || !query.opaque_fragments.is_empty() {
            return unsupported("a nested query");
        }
        if query.collapses_rows() || !query.window_functions.is_empty() {
            return unsupported("aggregation");
        }
        if query.shapes_rows() {
            return unsupported("DISTINCT, ORDER BY, LIMIT or OFFSET");
        }
        if query.columns.iter().any(|column| matches!(column, ColumnExpr::Computed(_))) {
            return unsupported("a computed column");
        }
        if query.where_expr.as_ref().is_some_and(|predicate| !predicate.is_fully_structured()) {
            return unsupported("this filter");
        }
        Ok(())
    }

    fn output_columns(query: &ParsedQuery, rows: &Rows) -> Vec<String> {
        let mut columns = IndexSet::new();
        for column in query.columns.iter() {
            if column.is_wildcard() {
                rows.iter().flat_map(|row| row.keys()).for_each(|key| {
                    columns.insert(key.clone());
                });
            } else if let Some(name) = column.output_name() {
                columns.insert(name);
            }
        }
        columns.into_iter().collect()
    }

    fn project(query: &ParsedQuery, row: &Map<String, Value>) -> Map<String, Value> {
        let mut projected = Map::new();
        for column in query.columns.iter() {
            if column.is_wildcard() {
                projected.extend(row.iter().map(|(key, value)| (key.clone(), value.clone())));
            } else if let Some(name) = column.output_name() {
                projected.insert(name, Eval::column_value(column.text(), row));
            }
        }
        projected
    }
}

impl ExecutionBackend for MemoryBackend {
    async fn execute(&self, sql: &str) -> Result<ResultHandle, BackendError> {
        self.run(sql)
    }
}
