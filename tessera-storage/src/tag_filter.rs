//! The server-side tag-filter grammar: a conjunction of atoms over blob
//! tags, each a byte-lexicographic comparison. This is the only
//! predicate language the real object store's tag search understands:
//! no disjunction, no negation, conjunction-only.

use std::collections::BTreeMap;
use std::fmt;

/// A comparison operator in the tag-filter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl fmt::Display for TagOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        };
        write!(f, "{s}")
    }
}

/// One atom of the conjunction: either a single comparison or an inclusive
/// `BETWEEN ... AND ...` range (`$between` is always inclusive of both ends).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagAtom {
    Compare {
        field: String,
        op: TagOp,
        value: String,
    },
    Between {
        field: String,
        low: String,
        high: String,
    },
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

impl fmt::Display for TagAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compare { field, op, value } => {
                write!(f, "\"{field}\" {op} {}", quote(value))
            }
            Self::Between { field, low, high } => {
                write!(f, "\"{field}\" BETWEEN {} AND {}", quote(low), quote(high))
            }
        }
    }
}

impl TagAtom {
    fn field(&self) -> &str {
        match self {
            Self::Compare { field, .. } => field,
            Self::Between { field, .. } => field,
        }
    }

    /// Whether `tags` (the object's full tag map) satisfies this atom,
    /// using the same byte-lexicographic comparison the real server search
    /// uses.
    fn matches(&self, tags: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Compare { field, op, value } => match tags.get(field) {
                Some(tag_value) => match op {
                    TagOp::Eq => tag_value == value,
                    TagOp::Gt => tag_value.as_str() > value.as_str(),
                    TagOp::Gte => tag_value.as_str() >= value.as_str(),
                    TagOp::Lt => tag_value.as_str() < value.as_str(),
                    TagOp::Lte => tag_value.as_str() <= value.as_str(),
                },
                None => false,
            },
            Self::Between { field, low, high } => match tags.get(field) {
                Some(tag_value) => {
                    tag_value.as_str() >= low.as_str() && tag_value.as_str() <= high.as_str()
                }
                None => false,
            },
        }
    }
}

/// A conjunction of [`TagAtom`]s, the whole tag-filter expression passed
/// to [`crate::ObjectStore::find_by_tags`], rendered as atoms separated
/// by ` AND `.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    atoms: Vec<TagAtom>,
}

impl TagFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, atom: TagAtom) -> &mut Self {
        self.atoms.push(atom);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn atoms(&self) -> &[TagAtom] {
        &self.atoms
    }

    /// The set of fields this filter constrains, for planner
    /// compound-index tie-breaking bookkeeping.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.atoms.iter().map(TagAtom::field)
    }

    /// Evaluate this filter against one object's full tag map. Every atom
    /// must hold (conjunction-only dialect).
    pub fn matches(&self, tags: &BTreeMap<String, String>) -> bool {
        self.atoms.iter().all(|a| a.matches(tags))
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.atoms.iter().map(TagAtom::to_string).collect();
        write!(f, "{}", rendered.join(" AND "))
    }
}
