//! Turns a predicate object into a [`ParsedQuery`].

use serde_json::Value;
use tessera_core::{Condition, Operator, ParsedQuery, QueryError};

/// Parse a predicate object mapping field names to either a scalar
/// (implicit equality) or a nested object of `$operator` clauses.
///
/// A scalar collapses to `{ op: Eq, value }`. A nested object yields one
/// condition per `$operator` key; when multiple operators are co-specified
/// on the same field (e.g. `{ age: { $gte: 18, $lt: 30 } }`), all resulting
/// conditions are recorded and must all hold.
pub fn parse(predicate: &Value) -> Result<ParsedQuery, QueryError> {
    let obj = predicate
        .as_object()
        .ok_or_else(|| QueryError::Validation {
            reason: "predicate must be a JSON object".to_string(),
        })?;

    let mut query = ParsedQuery::new();
    for (field, value) in obj {
        match value {
            Value::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => {
                for (keyword, operand) in ops {
                    let op = Operator::from_keyword(keyword).ok_or_else(|| QueryError::Validation {
                        reason: format!("unrecognized operator {keyword:?} on field {field:?}"),
                    })?;
                    if op == Operator::Between && operand.as_array().map(Vec::len) != Some(2) {
                        return Err(QueryError::Validation {
                            reason: format!(
                                "$between on field {field:?} must be a 2-element [low, high] array"
                            ),
                        });
                    }
                    if matches!(op, Operator::In | Operator::Nin) && !operand.is_array() {
                        return Err(QueryError::Validation {
                            reason: format!(
                                "{keyword} on field {field:?} must be an array"
                            ),
                        });
                    }
                    query.add(field.clone(), Condition::new(op, operand.clone()));
                }
            }
            scalar => query.add(field.clone(), Condition::new(Operator::Eq, scalar.clone())),
        }
    }
    Ok(query)
}
