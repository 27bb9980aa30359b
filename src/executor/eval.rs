use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::parser::ast::{ComparatorOp, Literal, Operand, Predicate, Truth};

/// Row-level evaluation of predicates with SQL three-valued logic.
pub struct Eval;

impl Eval {
    pub fn literal_value(literal: &Literal) -> Value {
        match literal {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Text(s) => Value::String(s.clone()),
            Literal::Number(raw) => match raw.parse::<i64>() {
                Ok(i) => Value::Number(serde_json::Number::from(i)),
                Err(_) => raw
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            },
        }
    }

    /// Column lookup: exact key first, then the unqualified name, ignoring case.
    pub fn column_value(name: &str, row: &Map<String, Value>) -> Value {
        if let Some(value) = row.get(name) {
            return value.clone();
        }
        let bare = name.rsplit('.').next().unwrap_or(name).trim_matches(|ch| ch == '"' || ch == '`');
        row.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(bare))
            .map(|(_, value)| value.clone())
            .unwrap_or(Value::Null)
    }

    pub fn eval_operand(operand: &Operand, row: &Map<String, Value>) -> Value {
        match operand {
            Operand::Column(name) => Self::column_value(name, row),
            Operand::Literal(literal) => Self::literal_value(literal),
        }
    }

    /// `Opaque` leaves evaluate to `Unknown`; callers that need exact results
    /// check [`Predicate::is_fully_structured`] first.
    pub fn eval_predicate3(predicate: &Predicate, row: &Map<String, Value>) -> Truth {
        match predicate {
            Predicate::And(v) => v.iter().fold(Truth::True, |acc, x| acc.and(Self::eval_predicate3(x, row))),
            Predicate::Or(v) => v.iter().fold(Truth::False, |acc, x| acc.or(Self::eval_predicate3(x, row))),
            Predicate::Not(inner) => Self::eval_predicate3(inner, row).not(),
            Predicate::Compare { left, op, right } => {
                let l = Self::eval_operand(left, row);
                let r = Self::eval_operand(right, row);
                Self::lit_cmp3(&l, *op, &r)
            }
            Predicate::IsNull { column, negated } => {
                let t = Truth::from_bool(Self::column_value(column, row).is_null());
                if *negated { t.not() } else { t }
            }
            Predicate::InList { column, list, negated } => {
                let v = Self::column_value(column, row);
                if v.is_null() {
                    return Truth::Unknown;
                }
                let mut found = false;
                let mut has_null = false;
                for e in list {
                    let ev = Self::literal_value(e);
                    if ev.is_null() { has_null = true; continue; }
                    if Self::value_equal(&v, &ev) { found = true; break; }
                }
                let t = if found { Truth::True } else if has_null { Truth::Unknown } else { Truth::False };
                if *negated { t.not() } else { t }
            }
            Predicate::Like { column, pattern, negated } => {
                let t = match Self::column_value(column, row) {
                    Value::String(s) => Truth::from_bool(Self::eval_like(&s, pattern)),
                    _ => Truth::Unknown,
                };
                if *negated { t.not() } else { t }
            }
            Predicate::Opaque(_) => Truth::Unknown,
        }
    }

    /// `%` matches any run, `_` any single character. No escape character.
    pub fn eval_like(value: &str, pattern: &str) -> bool {
        let mut regex = String::from("^");
        for ch in pattern.chars() {
            match ch {
                '%' => regex.push_str(".*"),
                '_' => regex.push('.'),
                c => regex.push_str(&regex::escape(&c.to_string())),
            }
        }
        regex.push('$');
        regex::Regex::new(&regex).map(|re| re.is_match(value)).unwrap_or(false)
    }

    fn lit_cmp3(l: &Value, op: ComparatorOp, r: &Value) -> Truth {
        if l.is_null() || r.is_null() { return Truth::Unknown; }
        let ord = match (l, r) {
            (Value::Bool(a), Value::Bool(b)) => match op {
                ComparatorOp::Eq => return Truth::from_bool(a == b),
                ComparatorOp::NotEq => return Truth::from_bool(a != b),
                _ => return Truth::Unknown,
            },
            (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        };
        let Some(ord) = ord else {
            return Truth::Unknown;
        };
        Truth::from_bool(match op {
            ComparatorOp::Eq => ord == Ordering::Equal,
            ComparatorOp::NotEq => ord != Ordering::Equal,
            ComparatorOp::Lt => ord == Ordering::Less,
            ComparatorOp::LtEq => ord != Ordering::Greater,
            ComparatorOp::Gt => ord == Ordering::Greater,
            ComparatorOp::GtEq => ord != Ordering::Less,
        })
    }

    fn value_equal(a: &Value, b: &Value) -> bool {
        use serde_json::Value::*;
        match (a, b) {
            (Null, Null) => true,
            (Bool(x), Bool(y)) => x == y,
            (Number(x), Number(y)) => x.as_f64() == y.as_f64(),
            (String(x), String(y)) => x == y,
            _ => false,
        }
    }
}
