//! Create/update/delete, recomputing the tag projection from the index
//! catalog and enforcing uniqueness with tag-filter probes before every
//! write.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tessera_core::{
    Document, DocumentId, EngineError, EngineResult, IndexDefinition, StoreError, MAX_TAG_VALUE_LEN,
};
use tessera_storage::{IndexCatalog, ObjectStore, PutOptions, TagAtom, TagFilter, TagOp};
use tracing::warn;

/// Recompute the tag projection for `fields` from `catalog.indexed_fields`.
/// A field absent or `null` on the document is not tagged; a field whose
/// value has no tag encoding, or whose encoding overflows the blob-tag
/// length limit, is skipped with a warning rather than failing the write
/// (data model invariant "a document is permitted to have fewer tags than
/// indexed fields").
pub fn compute_tags(fields: &Map<String, Value>, catalog: &IndexDefinition) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    for field in &catalog.indexed_fields {
        let Some(value) = fields.get(field).filter(|v| !v.is_null()) else {
            continue;
        };
        let encoded = if catalog.hashed_fields.contains(field) {
            value.as_str().map(tessera_codec::hash)
        } else {
            tessera_codec::encode(value)
        };
        match encoded {
            Some(tag) if tag.len() <= MAX_TAG_VALUE_LEN => {
                tags.insert(field.clone(), tag);
            }
            Some(tag) => warn!(
                field,
                len = tag.len(),
                "encoded tag value exceeds the {MAX_TAG_VALUE_LEN}-byte limit, write proceeds without tagging it"
            ),
            None => warn!(field, "value has no tag encoding, write proceeds without tagging it"),
        }
    }
    tags
}

/// Probe every unique field's computed tag via a server-side equality
/// filter. `exclude_id` is the current document's
/// own id on update, so a document does not collide with its own prior
/// tag value.
async fn check_uniqueness(
    store: &dyn ObjectStore,
    container: &str,
    catalog: &IndexDefinition,
    tags: &BTreeMap<String, String>,
    exclude_id: Option<&str>,
) -> EngineResult<()> {
    for field in &catalog.unique_fields {
        let Some(value) = tags.get(field) else {
            continue;
        };
        let mut filter = TagFilter::new();
        filter.push(TagAtom::Compare {
            field: field.clone(),
            op: TagOp::Eq,
            value: value.clone(),
        });
        let hits = store.find_by_tags(container, &filter).await?;
        let violated = hits.iter().any(|hit| Some(hit.name.as_str()) != exclude_id);
        if violated {
            return Err(EngineError::unique_violation(container, field.clone()));
        }
    }
    Ok(())
}

fn serialize_document(document: &Document) -> EngineResult<Vec<u8>> {
    serde_json::to_vec(document).map_err(|e| EngineError::validation(e.to_string()))
}

/// `create(collection, data, id?)`.
pub async fn create(
    store: &dyn ObjectStore,
    catalog: &IndexCatalog,
    container: &str,
    id: DocumentId,
    data: Map<String, Value>,
) -> EngineResult<Document> {
    let index_def = catalog.load_catalog(container).await?;
    let document = Document::new(id, data);
    let tags = compute_tags(&document.fields, &index_def);

    check_uniqueness(store, container, &index_def, &tags, None).await?;

    let bytes = serialize_document(&document)?;
    store
        .put(
            container,
            document.id.as_str(),
            bytes,
            PutOptions::new().with_tags(tags),
        )
        .await?;
    Ok(document)
}

/// `update(collection, id, data)`: full replacement of an existing
/// document's fields, keeping its id.
pub async fn update(
    store: &dyn ObjectStore,
    catalog: &IndexCatalog,
    container: &str,
    id: &str,
    data: Map<String, Value>,
) -> EngineResult<Document> {
    let existing = store.get(container, id).await.map_err(|e| match e {
        StoreError::NotFound { .. } => EngineError::not_found(container, id),
        other => other.into(),
    })?;
    let mut document: Document = serde_json::from_slice(&existing.bytes)
        .map_err(|e| EngineError::validation(format!("corrupt document blob: {e}")))?;
    document.replace_fields(data);

    let index_def = catalog.load_catalog(container).await?;
    let tags = compute_tags(&document.fields, &index_def);

    check_uniqueness(store, container, &index_def, &tags, Some(id)).await?;

    let bytes = serialize_document(&document)?;
    store
        .put(container, id, bytes, PutOptions::new().with_tags(tags))
        .await?;
    Ok(document)
}

/// `delete(collection, id)`: idempotent, silent success when the blob is
/// already absent.
pub async fn delete(store: &dyn ObjectStore, container: &str, id: &str) -> EngineResult<()> {
    store.delete(container, id).await?;
    Ok(())
}
