use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Coarse classification of JSON value shapes, used by type-conformance checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JsonPrimitive {
    Null,
    Bool,
    Int,
    Float,
    String,
    Object,
    Array,
}

impl JsonPrimitive {
    pub fn of_value(v: &Value) -> JsonPrimitive {
        match v {
            Value::Null => JsonPrimitive::Null,
            Value::Bool(_) => JsonPrimitive::Bool,
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    JsonPrimitive::Int
                } else {
                    JsonPrimitive::Float
                }
            }
            Value::String(_) => JsonPrimitive::String,
            Value::Array(_) => JsonPrimitive::Array,
            Value::Object(_) => JsonPrimitive::Object,
        }
    }

    /// Whether a value of shape `actual` satisfies `self`. Integers satisfy `Float`.
    pub fn accepts(&self, actual: JsonPrimitive) -> bool {
        *self == actual || (*self == JsonPrimitive::Float && actual == JsonPrimitive::Int)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckKind {
    /// Share of non-null values.
    Completeness,
    /// Share of non-null values of the expected shape.
    TypeConformance { expected: JsonPrimitive },
    /// Share of non-null numeric values above zero.
    Positivity,
    /// Share of non-null numeric values inside `[min, max]`.
    Range {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
}

fn default_pass_ratio() -> f64 {
    1.0
}

fn default_warn_ratio() -> f64 {
    0.95
}

/// A declarative data-quality check on one result column.
///
/// The check metric is a ratio in `[0, 1]`; at or above `pass_ratio` it
/// passes, at or above `warn_ratio` it warns, otherwise it fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub id: String,
    pub column: String,
    #[serde(flatten)]
    pub kind: CheckKind,
    #[serde(default = "default_pass_ratio")]
    pub pass_ratio: f64,
    #[serde(default = "default_warn_ratio")]
    pub warn_ratio: f64,
}

impl Check {
    pub fn new(id: &str, column: &str, kind: CheckKind) -> Self {
        Self {
            id: id.to_string(),
            column: column.to_string(),
            kind,
            pass_ratio: default_pass_ratio(),
            warn_ratio: default_warn_ratio(),
        }
    }

    pub fn with_thresholds(mut self, pass_ratio: f64, warn_ratio: f64) -> Self {
        self.pass_ratio = pass_ratio;
        self.warn_ratio = warn_ratio;
        self
    }

    /// Whether `name` (possibly qualified) refers to this check's column.
    pub fn targets(&self, name: &str) -> bool {
        let bare = |text: &str| text.rsplit('.').next().unwrap_or(text).to_lowercase();
        bare(&self.column) == bare(name)
    }

    pub fn status_for(&self, metric: f64) -> CheckStatus {
        if metric >= self.pass_ratio {
            CheckStatus::Passed
        } else if metric >= self.warn_ratio {
            CheckStatus::Warning
        } else {
            CheckStatus::Failed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckStatus {
    Passed,
    Warning,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    pub status: CheckStatus,
    pub metric: OrderedFloat<f64>,
}

impl CheckOutcome {
    pub fn new(status: CheckStatus, metric: f64) -> Self {
        Self { status, metric: OrderedFloat(metric) }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::executor::{Check, CheckKind, CheckStatus, JsonPrimitive};

    #[test]
    pub fn test_json_primitive_classification() {
        assert_eq!(JsonPrimitive::of_value(&json!(1)), JsonPrimitive::Int);
        assert_eq!(JsonPrimitive::of_value(&json!(1.5)), JsonPrimitive::Float);
        assert!(JsonPrimitive::Float.accepts(JsonPrimitive::Int));
        assert!(!JsonPrimitive::Int.accepts(JsonPrimitive::Float));
    }

    #[test]
    pub fn test_status_thresholds() {
        let check = Check::new("c1", "amount", CheckKind::Completeness).with_thresholds(0.99, 0.9);

        assert_eq!(check.status_for(1.0), CheckStatus::Passed);
        assert_eq!(check.status_for(0.95), CheckStatus::Warning);
        assert_eq!(check.status_for(0.5), CheckStatus::Failed);
    }

    #[test]
    pub fn test_check_targets_ignore_qualifier_and_case() {
        let check = Check::new("c1", "Amount", CheckKind::Positivity);

        assert!(check.targets("o.amount"));
        assert!(!check.targets("amount_total"));
    }

    #[test]
    pub fn test_check_from_toml() {
        let check: Check = toml::from_str(
            r#"
            id = "amount-range"
            column = "amount"
            kind = "range"
            min = 0.0
            max = 100.0
            warn_ratio = 0.8
            "#,
        )
        .expect("Failed to read check");

        assert_eq!(check.kind, crate::executor::CheckKind::Range { min: Some(0.0), max: Some(100.0) });
        assert_eq!(check.pass_ratio, 1.0);
        assert_eq!(check.warn_ratio, 0.8);
    }
}
