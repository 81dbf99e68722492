//! In-memory operator evaluation. Used both by
//! full-scan mode and by the in-memory residue of partial-index mode.

use std::cmp::Ordering;

use chrono::DateTime;
use serde_json::Value;
use tessera_core::{Condition, Operator, ParsedQuery};

/// Whether `doc_fields` satisfies every condition of `query` (all fields,
/// all conditions per field, AND-ed together).
pub fn evaluate(query: &ParsedQuery, doc_fields: &serde_json::Map<String, Value>) -> bool {
    query.fields().all(|field| {
        let field_value = doc_fields.get(field).filter(|v| !v.is_null());
        query
            .conditions_for(field)
            .iter()
            .all(|c| evaluate_condition(field_value, c))
    })
}

fn evaluate_condition(field_value: Option<&Value>, condition: &Condition) -> bool {
    match condition.op {
        Operator::Eq => field_value.is_some_and(|v| values_equal(v, &condition.value)),
        Operator::Gt => compare(field_value, &condition.value) == Some(Ordering::Greater),
        Operator::Gte => matches!(
            compare(field_value, &condition.value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Operator::Lt => compare(field_value, &condition.value) == Some(Ordering::Less),
        Operator::Lte => matches!(
            compare(field_value, &condition.value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Operator::In => field_value.is_some_and(|v| {
            condition
                .value
                .as_array()
                .is_some_and(|set| set.iter().any(|x| values_equal(x, v)))
        }),
        // Absent field: NIN also returns false. Missing fields satisfy
        // neither a positive nor a negative membership test.
        Operator::Nin => field_value.is_some_and(|v| {
            condition
                .value
                .as_array()
                .is_some_and(|set| !set.iter().any(|x| values_equal(x, v)))
        }),
        Operator::Between => field_value.is_some_and(|v| {
            condition
                .between_bounds()
                .is_some_and(|(low, high)| {
                    let above_low = compare_values(v, low);
                    let below_high = compare_values(v, high);
                    matches!(above_low, Some(Ordering::Greater | Ordering::Equal))
                        && matches!(below_high, Some(Ordering::Less | Ordering::Equal))
                })
        }),
        Operator::Exists => {
            let want = condition.value.as_bool().unwrap_or(false);
            field_value.is_some() == want
        }
    }
}

fn compare(field_value: Option<&Value>, operand: &Value) -> Option<Ordering> {
    compare_values(field_value?, operand)
}

/// Equality with ISO-8601 normalization: if both sides parse as RFC 3339
/// timestamps, compare as epoch milliseconds so that differing-but-
/// equivalent textual forms (trailing zeros, explicit `+00:00` vs `Z`)
/// are still equal.
fn values_equal(a: &Value, b: &Value) -> bool {
    if let (Value::String(sa), Value::String(sb)) = (a, b) {
        if let (Ok(ta), Ok(tb)) = (DateTime::parse_from_rfc3339(sa), DateTime::parse_from_rfc3339(sb)) {
            return ta.timestamp_millis() == tb.timestamp_millis();
        }
    }
    a == b
}

/// Natural comparison on numbers, timestamps, or strings. Mixed types (or
/// numbers that don't fit `f64`) return `None`, which callers treat as a
/// failed predicate rather than an error.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(na), Value::Number(nb)) => na.as_f64()?.partial_cmp(&nb.as_f64()?),
        (Value::String(sa), Value::String(sb)) => {
            match (DateTime::parse_from_rfc3339(sa), DateTime::parse_from_rfc3339(sb)) {
                (Ok(ta), Ok(tb)) => Some(ta.cmp(&tb)),
                _ => Some(sa.cmp(sb)),
            }
        }
        _ => None,
    }
}
