//! Query executor: runs an [`ExecutionMode`] against the object store,
//! fetching and filtering documents with pagination.

use serde_json::Map;
use tessera_core::{Document, DocumentId, EngineResult, IndexDefinition, ParsedQuery, StoreError};
use tessera_storage::{ListedObject, ObjectStore};
use tracing::warn;

use crate::planner::{plan, ExecutionMode};

/// Blobs whose name begins with `__` are system-reserved and skipped by
/// every listing and search.
fn is_system_name(name: &str) -> bool {
    name.starts_with("__")
}

async fn candidate_names(
    store: &dyn ObjectStore,
    container: &str,
    mode: &ExecutionMode,
) -> EngineResult<Vec<String>> {
    let hits: Vec<ListedObject> = match mode {
        ExecutionMode::Listing | ExecutionMode::FullScan => store.list(container, None).await?,
        ExecutionMode::TagFilter { filter, .. } | ExecutionMode::Partial { filter, .. } => {
            store.find_by_tags(container, filter).await?
        }
    };
    Ok(hits.into_iter().map(|h| h.name).collect())
}

fn needs_residual_evaluation(mode: &ExecutionMode) -> bool {
    matches!(mode, ExecutionMode::Partial { .. } | ExecutionMode::FullScan)
}

async fn fetch_fields(
    store: &dyn ObjectStore,
    container: &str,
    name: &str,
) -> Option<Map<String, serde_json::Value>> {
    match store.get(container, name).await {
        Ok(got) => match serde_json::from_slice::<Map<String, serde_json::Value>>(&got.bytes) {
            Ok(fields) => Some(fields),
            Err(e) => {
                warn!(container, name, error = %e, "dropping hit with unparsable document body");
                None
            }
        },
        // A transient SDK error or a 404 between list/search and fetch is
        // logged and the hit dropped, not propagated.
        Err(StoreError::NotFound { .. }) => None,
        Err(StoreError::Transient { reason, .. }) => {
            warn!(container, name, reason, "dropping hit after transient fetch error");
            None
        }
        Err(other) => {
            warn!(container, name, error = %other, "dropping hit after fetch error");
            None
        }
    }
}

/// Run `query` against `container`, returning the page `[offset, offset +
/// limit)` of matching documents in the store's listing order, plus the
/// [`ExecutionMode`] that was used (diagnostic only).
pub async fn find(
    store: &dyn ObjectStore,
    container: &str,
    catalog: &IndexDefinition,
    query: &ParsedQuery,
    offset: usize,
    limit: usize,
) -> EngineResult<(Vec<Document>, ExecutionMode)> {
    let mode = plan(query, catalog);
    let names = candidate_names(store, container, &mode).await?;
    let target = offset.saturating_add(limit);
    let needs_eval = needs_residual_evaluation(&mode);

    let mut results = Vec::new();
    let mut produced = 0usize;

    for name in names {
        if is_system_name(&name) {
            continue;
        }
        if produced >= target {
            break;
        }
        let Some(fields) = fetch_fields(store, container, &name).await else {
            continue;
        };
        if needs_eval && !tessera_query::evaluate(query, &fields) {
            continue;
        }
        produced += 1;
        if produced > offset {
            let id = fields
                .get("id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or(&name)
                .to_string();
            results.push(Document::new(DocumentId::from_raw(id), fields));
        }
    }

    Ok((results, mode))
}

/// `count(collection, query)`: the same plan/execute pipeline as [`find`],
/// materializing document bodies only
/// when a residual in-memory predicate needs them, returning the total
/// match count with no pagination applied.
pub async fn count(
    store: &dyn ObjectStore,
    container: &str,
    catalog: &IndexDefinition,
    query: &ParsedQuery,
) -> EngineResult<usize> {
    let mode = plan(query, catalog);
    let names = candidate_names(store, container, &mode).await?;
    let needs_eval = needs_residual_evaluation(&mode);

    let mut total = 0usize;
    for name in names {
        if is_system_name(&name) {
            continue;
        }
        if !needs_eval {
            total += 1;
            continue;
        }
        let Some(fields) = fetch_fields(store, container, &name).await else {
            continue;
        };
        if tessera_query::evaluate(query, &fields) {
            total += 1;
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tessera_storage::{InMemoryObjectStore, PutOptions};

    async fn seed(store: &InMemoryObjectStore, container: &str, docs: &[(&str, serde_json::Value, &[(&str, &str)])]) {
        store.ensure_container(container).await.unwrap();
        for (id, fields, tags) in docs {
            let mut obj = fields.as_object().unwrap().clone();
            obj.insert("id".to_string(), serde_json::Value::String(id.to_string()));
            let tag_map = tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
            store
                .put(
                    container,
                    id,
                    serde_json::to_vec(&obj).unwrap(),
                    PutOptions::new().with_tags(tag_map),
                )
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn listing_mode_paginates_in_natural_order() {
        let store = InMemoryObjectStore::new();
        seed(
            &store,
            "items",
            &[
                ("1", serde_json::json!({}), &[]),
                ("2", serde_json::json!({}), &[]),
                ("3", serde_json::json!({}), &[]),
                ("4", serde_json::json!({}), &[]),
                ("5", serde_json::json!({}), &[]),
            ],
        )
        .await;
        let query = tessera_query::parse(&serde_json::json!({})).unwrap();
        let (docs, mode) = find(&store, "items", &IndexDefinition::default(), &query, 2, 2)
            .await
            .unwrap();
        assert_eq!(mode, ExecutionMode::Listing);
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["3", "4"]);
    }

    #[tokio::test]
    async fn listing_mode_skips_system_blobs() {
        let store = InMemoryObjectStore::new();
        seed(
            &store,
            "items",
            &[
                ("__collection_indexes", serde_json::json!({}), &[]),
                ("1", serde_json::json!({}), &[]),
            ],
        )
        .await;
        let query = tessera_query::parse(&serde_json::json!({})).unwrap();
        let (docs, _) = find(&store, "items", &IndexDefinition::default(), &query, 0, 10)
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id.as_str(), "1");
    }

    #[tokio::test]
    async fn tag_filter_mode_on_fully_indexed_query() {
        let store = InMemoryObjectStore::new();
        seed(
            &store,
            "people",
            &[
                ("1", serde_json::json!({"age": 30, "city": "NYC"}), &[("age", ".0000000000000000030"), ("city", "NYC")]),
                ("2", serde_json::json!({"age": 30, "city": "LA"}), &[("age", ".0000000000000000030"), ("city", "LA")]),
                ("3", serde_json::json!({"age": 25, "city": "NYC"}), &[("age", ".0000000000000000025"), ("city", "NYC")]),
            ],
        )
        .await;
        let mut catalog = IndexDefinition::default();
        catalog.indexed_fields.insert("age".to_string());
        catalog.indexed_fields.insert("city".to_string());

        let query = tessera_query::parse(&serde_json::json!({"age": 30, "city": "NYC"})).unwrap();
        let (docs, mode) = find(&store, "people", &catalog, &query, 0, 10).await.unwrap();
        assert!(matches!(mode, ExecutionMode::TagFilter { .. }));
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id.as_str(), "1");
    }

    #[tokio::test]
    async fn partial_mode_narrows_then_filters_in_memory() {
        let store = InMemoryObjectStore::new();
        seed(
            &store,
            "people",
            &[
                ("1", serde_json::json!({"age": 30, "prof": "Eng"}), &[("age", ".0000000000000000030")]),
                ("2", serde_json::json!({"age": 30, "prof": "Des"}), &[("age", ".0000000000000000030")]),
                ("3", serde_json::json!({"age": 25, "prof": "Eng"}), &[("age", ".0000000000000000025")]),
            ],
        )
        .await;
        let mut catalog = IndexDefinition::default();
        catalog.indexed_fields.insert("age".to_string());

        let query = tessera_query::parse(&serde_json::json!({"age": 30, "prof": "Eng"})).unwrap();
        let (docs, mode) = find(&store, "people", &catalog, &query, 0, 10).await.unwrap();
        assert!(matches!(mode, ExecutionMode::Partial { .. }));
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id.as_str(), "1");
    }

    #[tokio::test]
    async fn count_matches_find_length_without_pagination() {
        let store = InMemoryObjectStore::new();
        seed(
            &store,
            "people",
            &[
                ("1", serde_json::json!({"age": 25}), &[]),
                ("2", serde_json::json!({"age": 30}), &[]),
                ("3", serde_json::json!({"age": 35}), &[]),
            ],
        )
        .await;
        let query = tessera_query::parse(&serde_json::json!({"age": {"$gte": 30}})).unwrap();
        let n = count(&store, "people", &IndexDefinition::default(), &query)
            .await
            .unwrap();
        assert_eq!(n, 2);
    }

    #[tokio::test]
    async fn between_query_is_inclusive_end_to_end() {
        let store = InMemoryObjectStore::new();
        seed(
            &store,
            "people",
            &[
                ("1", serde_json::json!({"age": 25}), &[("age", &tessera_codec::encode(&serde_json::json!(25)).unwrap())]),
                ("2", serde_json::json!({"age": 30}), &[("age", &tessera_codec::encode(&serde_json::json!(30)).unwrap())]),
                ("3", serde_json::json!({"age": 35}), &[("age", &tessera_codec::encode(&serde_json::json!(35)).unwrap())]),
            ],
        )
        .await;
        let mut catalog = IndexDefinition::default();
        catalog.indexed_fields.insert("age".to_string());
        let query = tessera_query::parse(&serde_json::json!({"age": {"$between": [26, 34]}})).unwrap();
        let (docs, _) = find(&store, "people", &catalog, &query, 0, 10).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id.as_str(), "2");
    }

    #[tokio::test]
    async fn unknown_arc_store_works_through_trait_object() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        store.ensure_container("x").await.unwrap();
        let query = tessera_query::parse(&serde_json::json!({})).unwrap();
        let (docs, _) = find(store.as_ref(), "x", &IndexDefinition::default(), &query, 0, 10)
            .await
            .unwrap();
        assert!(docs.is_empty());
    }
}
