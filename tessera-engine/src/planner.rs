//! Query planner: mode selection. Translates a parsed predicate plus the
//! collection's index catalog into one of three execution strategies,
//! pushing as much of the predicate down to the server-side tag filter as
//! the dialect can express.

use std::collections::BTreeSet;

use tessera_core::{Condition, IndexDefinition, Operator, ParsedQuery};
use tessera_storage::{TagAtom, TagFilter, TagOp};

/// The execution strategy chosen for one `find`/`count` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Empty predicate: enumerate the container.
    Listing,
    /// Every field is indexed and every operator is server-filterable: the
    /// whole predicate becomes one tag-filter expression. `covering_index`
    /// names a compound index whose field set exactly matches this query's,
    /// if one exists (tie-breaking bookkeeping only, every tag is still
    /// probed independently).
    TagFilter {
        filter: TagFilter,
        covering_index: Option<String>,
    },
    /// Some fields are indexed and filterable, others are not: the indexed
    /// subset narrows the candidate set server-side, the rest is applied
    /// in-memory over the fetched documents.
    Partial {
        filter: TagFilter,
        residual_fields: Vec<String>,
    },
    /// Nothing in the predicate is server-filterable: enumerate the whole
    /// container and evaluate in memory.
    FullScan,
}

/// Choose an [`ExecutionMode`] for `query` against `catalog`.
pub fn plan(query: &ParsedQuery, catalog: &IndexDefinition) -> ExecutionMode {
    if query.is_empty() {
        return ExecutionMode::Listing;
    }

    let mut filter = TagFilter::new();
    let mut servable_fields: Vec<String> = Vec::new();
    let mut residual_fields: Vec<String> = Vec::new();

    for field in query.fields() {
        let conditions = query.conditions_for(field);
        let indexed = catalog.indexed_fields.contains(field);
        let hashed = catalog.hashed_fields.contains(field);
        let all_filterable = conditions.iter().all(|c| c.op.is_server_filterable());
        // Hashed tags support equality only.
        let hashed_compatible =
            !hashed || (conditions.len() == 1 && conditions[0].op == Operator::Eq);

        let atoms = if indexed && all_filterable && hashed_compatible {
            build_atoms(field, conditions, hashed)
        } else {
            None
        };

        match atoms {
            Some(atoms) => {
                for atom in atoms {
                    filter.push(atom);
                }
                servable_fields.push(field.to_string());
            }
            None => residual_fields.push(field.to_string()),
        }
    }

    if servable_fields.is_empty() {
        ExecutionMode::FullScan
    } else if residual_fields.is_empty() {
        // Every field ended up servable, so the query as a whole must be
        // fully server-filterable; this is how mode selection reaches
        // `TagFilter` rather than falling back to `Partial`.
        debug_assert!(query.is_fully_server_filterable());
        let covering_index = find_covering_index(catalog, &servable_fields, query);
        ExecutionMode::TagFilter {
            filter,
            covering_index,
        }
    } else {
        ExecutionMode::Partial {
            filter,
            residual_fields,
        }
    }
}

/// Build the tag-filter atoms for one field's conditions, or `None` if any
/// condition's operand has no tag encoding. The planner falls the whole
/// field back to in-memory evaluation rather than push down a partial,
/// possibly-wrong filter.
fn build_atoms(field: &str, conditions: &[Condition], hashed: bool) -> Option<Vec<TagAtom>> {
    let mut atoms = Vec::with_capacity(conditions.len());
    for condition in conditions {
        match condition.op {
            Operator::Eq => {
                let value = if hashed {
                    tessera_codec::hash(condition.value.as_str()?)
                } else {
                    tessera_codec::encode(&condition.value)?
                };
                atoms.push(TagAtom::Compare {
                    field: field.to_string(),
                    op: TagOp::Eq,
                    value,
                });
            }
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                let value = tessera_codec::encode(&condition.value)?;
                let op = match condition.op {
                    Operator::Gt => TagOp::Gt,
                    Operator::Gte => TagOp::Gte,
                    Operator::Lt => TagOp::Lt,
                    Operator::Lte => TagOp::Lte,
                    _ => unreachable!(),
                };
                atoms.push(TagAtom::Compare {
                    field: field.to_string(),
                    op,
                    value,
                });
            }
            Operator::Between => {
                let (low, high) = condition.between_bounds()?;
                let low = tessera_codec::encode(low)?;
                let high = tessera_codec::encode(high)?;
                atoms.push(TagAtom::Between {
                    field: field.to_string(),
                    low,
                    high,
                });
            }
            // In/Nin/Exists are never server-filterable (caller already
            // excludes them via `is_server_filterable`).
            Operator::In | Operator::Nin | Operator::Exists => return None,
        }
    }
    Some(atoms)
}

/// Find a compound index whose field set exactly equals `servable_fields`,
/// when every one of those fields carries a single `$eq` condition.
/// Bookkeeping only; every tag in `filter` is already probed independently
/// regardless of the result.
fn find_covering_index(
    catalog: &IndexDefinition,
    servable_fields: &[String],
    query: &ParsedQuery,
) -> Option<String> {
    let all_eq = servable_fields.iter().all(|field| {
        let conditions = query.conditions_for(field);
        conditions.len() == 1 && conditions[0].op == Operator::Eq
    });
    if !all_eq {
        return None;
    }
    let field_set: BTreeSet<&str> = servable_fields.iter().map(String::as_str).collect();
    catalog
        .indexes
        .values()
        .find(|spec| spec.fields.iter().map(String::as_str).collect::<BTreeSet<_>>() == field_set)
        .map(|spec| spec.identifier())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::IndexSpec;

    fn catalog_with(indexed: &[&str], unique: &[&str], hashed: &[&str]) -> IndexDefinition {
        let mut cat = IndexDefinition::default();
        for f in indexed {
            cat.indexed_fields.insert(f.to_string());
        }
        for f in unique {
            cat.unique_fields.insert(f.to_string());
        }
        for f in hashed {
            cat.hashed_fields.insert(f.to_string());
        }
        cat
    }

    #[test]
    fn empty_predicate_is_listing_mode() {
        let query = tessera_query::parse(&serde_json::json!({})).unwrap();
        let mode = plan(&query, &IndexDefinition::default());
        assert_eq!(mode, ExecutionMode::Listing);
    }

    #[test]
    fn fully_indexed_equality_predicate_is_tag_filter_mode() {
        let catalog = catalog_with(&["age", "city"], &[], &[]);
        let query =
            tessera_query::parse(&serde_json::json!({"age": 30, "city": "NYC"})).unwrap();
        let mode = plan(&query, &catalog);
        assert!(matches!(mode, ExecutionMode::TagFilter { .. }));
    }

    #[test]
    fn compound_index_covering_query_is_recorded() {
        let mut catalog = catalog_with(&["age", "city"], &[], &[]);
        catalog.apply_create_index(&["age".to_string(), "city".to_string()], false, false);
        let query =
            tessera_query::parse(&serde_json::json!({"age": 30, "city": "NYC"})).unwrap();
        match plan(&query, &catalog) {
            ExecutionMode::TagFilter { covering_index, .. } => {
                assert_eq!(covering_index.as_deref(), Some("age_city"));
            }
            other => panic!("expected TagFilter mode, got {other:?}"),
        }
    }

    #[test]
    fn mixed_indexed_and_unindexed_fields_is_partial_mode() {
        let catalog = catalog_with(&["age"], &[], &[]);
        let query =
            tessera_query::parse(&serde_json::json!({"age": 30, "prof": "Eng"})).unwrap();
        match plan(&query, &catalog) {
            ExecutionMode::Partial {
                residual_fields, ..
            } => assert_eq!(residual_fields, vec!["prof".to_string()]),
            other => panic!("expected Partial mode, got {other:?}"),
        }
    }

    #[test]
    fn entirely_unindexed_predicate_is_full_scan() {
        let query = tessera_query::parse(&serde_json::json!({"prof": "Eng"})).unwrap();
        let mode = plan(&query, &IndexDefinition::default());
        assert_eq!(mode, ExecutionMode::FullScan);
    }

    #[test]
    fn in_operator_on_indexed_field_forces_full_scan() {
        let catalog = catalog_with(&["tag"], &[], &[]);
        let query =
            tessera_query::parse(&serde_json::json!({"tag": {"$in": ["a", "b"]}})).unwrap();
        let mode = plan(&query, &catalog);
        assert_eq!(mode, ExecutionMode::FullScan);
    }

    #[test]
    fn nin_on_indexed_field_forces_full_scan() {
        let catalog = catalog_with(&["tag"], &[], &[]);
        let query =
            tessera_query::parse(&serde_json::json!({"tag": {"$nin": ["a"]}})).unwrap();
        assert_eq!(plan(&query, &catalog), ExecutionMode::FullScan);
    }

    #[test]
    fn hashed_field_equality_is_tag_filterable() {
        let catalog = catalog_with(&["email"], &["email"], &["email"]);
        let query = tessera_query::parse(&serde_json::json!({"email": "a@b.com"})).unwrap();
        let mode = plan(&query, &catalog);
        match mode {
            ExecutionMode::TagFilter { filter, .. } => {
                assert!(filter.to_string().contains(&tessera_codec::hash("a@b.com")));
            }
            other => panic!("expected TagFilter mode, got {other:?}"),
        }
    }

    #[test]
    fn hashed_field_range_query_is_not_tag_filterable() {
        let catalog = catalog_with(&["email"], &["email"], &["email"]);
        let query = tessera_query::parse(&serde_json::json!({"email": {"$gt": "a"}})).unwrap();
        assert_eq!(plan(&query, &catalog), ExecutionMode::FullScan);
    }

    #[test]
    fn between_on_indexed_numeric_field_is_tag_filterable() {
        let catalog = catalog_with(&["age"], &[], &[]);
        let query =
            tessera_query::parse(&serde_json::json!({"age": {"$between": [26, 34]}})).unwrap();
        assert!(matches!(plan(&query, &catalog), ExecutionMode::TagFilter { .. }));
    }
}
