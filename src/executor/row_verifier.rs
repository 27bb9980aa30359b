use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::executor::{eval::Eval, BackendError, Check, CheckKind, CheckOutcome, JsonPrimitive, ResultHandle, VerificationBackend};

/// Verification over the rows carried by a [`ResultHandle`].
///
/// Checks whose column is not part of the result are left out of the outcome
/// map. An empty result passes every check with a metric of 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowVerifier;

impl RowVerifier {
    pub fn evaluate(handle: &ResultHandle, check: &Check) -> CheckOutcome {
        let values = handle
            .rows
            .iter()
            .map(|row| Eval::column_value(&check.column, row))
            .collect::<Vec<_>>();
        let metric = Self::metric(&check.kind, &values);
        CheckOutcome::new(check.status_for(metric), metric)
    }

    fn metric(kind: &CheckKind, values: &[Value]) -> f64 {
        if values.is_empty() {
            return 1.0;
        }
        let present = values.iter().filter(|value| !value.is_null()).collect::<Vec<_>>();

        let ratio = |hits: usize, total: usize| if total == 0 { 1.0 } else { hits as f64 / total as f64 };

        match kind {
            CheckKind::Completeness => ratio(present.len(), values.len()),
            CheckKind::TypeConformance { expected } => {
                let hits = present
                    .iter()
                    .filter(|value| expected.accepts(JsonPrimitive::of_value(value)))
                    .count();
                ratio(hits, present.len())
            }
            CheckKind::Positivity => {
                let hits = present
                    .iter()
                    .filter(|value| value.as_f64().is_some_and(|number| number > 0.0))
                    .count();
                ratio(hits, present.len())
            }
            CheckKind::Range { min, max } => {
                let hits = present
                    .iter()
                    .filter_map(|value| value.as_f64())
                    .filter(|number| min.is_none_or(|min| *number >= min) && max.is_none_or(|max| *number <= max))
                    .count();
                ratio(hits, present.len())
            }
        }
    }
}

impl VerificationBackend for RowVerifier {
    async fn verify(&self, handle: &ResultHandle, checks: &[Check]) -> Result<IndexMap<String, CheckOutcome>, BackendError> {
        let mut outcomes = IndexMap::new();
        for check in checks.iter() {
            if !handle.columns.iter().any(|column| check.targets(column)) {
                continue;
            }
            let outcome = Self::evaluate(handle, check);
            debug!(check = %check.id, status = ?outcome.status, metric = %outcome.metric, "check evaluated");
            outcomes.insert(check.id.clone(), outcome);
        }
        Ok(outcomes)
    }
}
