//! Filter evaluation and sorting over raw rows

use crate::row::{field, RawRow};
use quarry_core::{Condition, Operator, SortDirection, SortSpec};
use serde_json::Value;
use std::cmp::Ordering;

/// Check a row against every condition (logical AND)
pub fn matches(row: &RawRow, filters: &[Condition]) -> bool {
    filters.iter().all(|condition| evaluate(row, condition))
}

fn evaluate(row: &RawRow, condition: &Condition) -> bool {
    let actual = field(row, &condition.field);
    let expected = &condition.value;

    match condition.op {
        Operator::Eq => loosely_equal(actual, expected),
        Operator::Ne => !loosely_equal(actual, expected),
        Operator::Lt => compare(actual, expected) == Some(Ordering::Less),
        Operator::Lte => matches!(compare(actual, expected), Some(Ordering::Less | Ordering::Equal)),
        Operator::Gt => compare(actual, expected) == Some(Ordering::Greater),
        Operator::Gte => {
            matches!(compare(actual, expected), Some(Ordering::Greater | Ordering::Equal))
        }
        Operator::Contains => text_test(actual, expected, |a, e| a.contains(e)),
        Operator::ContainsI => {
            text_test(actual, expected, |a, e| a.to_lowercase().contains(&e.to_lowercase()))
        }
        Operator::StartsWith => text_test(actual, expected, |a, e| a.starts_with(e)),
        Operator::EndsWith => text_test(actual, expected, |a, e| a.ends_with(e)),
        Operator::In => match expected {
            Value::Array(options) => options.iter().any(|o| loosely_equal(actual, o)),
            single => loosely_equal(actual, single),
        },
        Operator::Null => actual.is_null() == truthy(expected),
        Operator::NotNull => actual.is_null() != truthy(expected),
    }
}

/// Equality that treats numbers by value and numeric strings as numbers
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Number(a), Value::String(b)) | (Value::String(b), Value::Number(a)) => {
            b.parse::<f64>().ok() == a.as_f64()
        }
        _ => actual == expected,
    }
}

fn compare(actual: &Value, expected: &Value) -> Option<Ordering> {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn text_test(actual: &Value, expected: &Value, test: impl Fn(&str, &str) -> bool) -> bool {
    let expected = match expected {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match actual {
        Value::String(s) => test(s, &expected),
        Value::Null => false,
        other => test(&other.to_string(), &expected),
    }
}

/// `$null` and `$notNull` take a boolean, defaulting to true
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s != "false",
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::Null => true,
        _ => true,
    }
}

/// Sort rows in place: by the requested field, otherwise by identifier
///
/// Ties on the sort field fall back to identifier order; nulls sort last
/// regardless of direction.
pub fn sort_rows(rows: &mut [RawRow], sort: Option<&SortSpec>) {
    rows.sort_by(|a, b| {
        let by_field = match sort {
            Some(spec) => {
                let (x, y) = (field(a, &spec.field), field(b, &spec.field));
                match (x.is_null(), y.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => {
                        let ordering = compare(x, y).unwrap_or(Ordering::Equal);
                        match spec.direction {
                            SortDirection::Asc => ordering,
                            SortDirection::Desc => ordering.reverse(),
                        }
                    }
                }
            }
            None => Ordering::Equal,
        };
        by_field.then_with(|| field(a, "id").as_u64().cmp(&field(b, "id").as_u64()))
    });
}
