//! The parsed, structured form of a query predicate, produced by the query
//! parser and consumed by the planner and executor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single comparison operator recognized inside a predicate object.
///
/// `Exists` tests field presence rather than value, and, like `Nin`, has
/// no representation in the server-side tag-filter grammar, so the planner
/// always evaluates it in-memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Between,
    Exists,
}

impl Operator {
    /// Parse the `$`-prefixed operator keyword used in predicate JSON
    /// (e.g. `"$gte"`), or `None` for an unrecognized keyword.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "$eq" => Some(Self::Eq),
            "$gt" => Some(Self::Gt),
            "$gte" => Some(Self::Gte),
            "$lt" => Some(Self::Lt),
            "$lte" => Some(Self::Lte),
            "$in" => Some(Self::In),
            "$nin" => Some(Self::Nin),
            "$between" => Some(Self::Between),
            "$exists" => Some(Self::Exists),
            _ => None,
        }
    }

    /// Whether this operator has a direct equivalent in the server-side
    /// tag-filter grammar. `Nin` and `Exists` do not: the filter dialect is
    /// conjunction-of-comparisons only, with no negation and no presence
    /// test. `In` also does not: a multi-value membership test is a
    /// disjunction of equalities, and the dialect has no disjunction, so
    /// `$in` forces a full scan. All three are always evaluated in-memory
    /// after a broader server-side fetch.
    pub fn is_server_filterable(self) -> bool {
        !matches!(self, Self::In | Self::Nin | Self::Exists)
    }
}

/// One condition within a field's condition list: an operator plus its
/// operand. `Between`'s operand is always a two-element `[low, high]`
/// array; `In`/`Nin`'s operand is always an array; `Exists`'s operand is
/// always a JSON boolean; the rest take a scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub op: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(op: Operator, value: Value) -> Self {
        Self { op, value }
    }

    /// The `[low, high]` pair for a `Between` condition, inclusive of both
    /// ends.
    pub fn between_bounds(&self) -> Option<(&Value, &Value)> {
        if self.op != Operator::Between {
            return None;
        }
        let arr = self.value.as_array()?;
        match arr.as_slice() {
            [low, high] => Some((low, high)),
            _ => None,
        }
    }
}

/// A fully-parsed query predicate: field name to the (possibly multiple)
/// conditions applied to it. Multiple conditions on the same field are
/// implicitly AND-ed, matching the predicate object's JSON shape where a
/// field can map to either a scalar (shorthand for `$eq`) or an object of
/// `$operator: operand` pairs.
///
/// A `BTreeMap` keeps field iteration order deterministic, which matters
/// for compound-index tie-breaking in the planner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParsedQuery(pub BTreeMap<String, Vec<Condition>>);

impl ParsedQuery {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn add(&mut self, field: impl Into<String>, condition: Condition) {
        self.0.entry(field.into()).or_default().push(condition);
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn conditions_for(&self, field: &str) -> &[Condition] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every condition across every field is server-filterable: an
    /// all-filterable predicate is eligible for the tag-filter fast path;
    /// anything else forces a broader fetch followed by in-memory
    /// evaluation.
    pub fn is_fully_server_filterable(&self) -> bool {
        self.0
            .values()
            .flatten()
            .all(|c| c.op.is_server_filterable())
    }
}
