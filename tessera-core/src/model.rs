//! The document and index-catalog data model.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::identity::DocumentId;

/// A document: a JSON object plus its canonical `id`.
///
/// `id` always equals the blob name within its container; it
/// is also mirrored into the `"id"` key of the JSON body so that callers
/// reading the raw document see it like any other field. The wire form is
/// just `fields` (a single flat JSON object, `id` included) rather than a
/// `{id, fields}` envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Map<String, Value>,
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        let id = fields
            .get("id")
            .and_then(Value::as_str)
            .map(DocumentId::from_raw)
            .ok_or_else(|| D::Error::missing_field("id"))?;
        Ok(Self { id, fields })
    }
}

impl Document {
    /// Build a document from caller-supplied fields, assigning `id` and
    /// mirroring it into the field map's `"id"` key.
    pub fn new(id: DocumentId, mut fields: Map<String, Value>) -> Self {
        fields.insert("id".to_string(), Value::String(id.as_str().to_string()));
        Self { id, fields }
    }

    /// Look up a field's value, returning `None` if absent or JSON `null`.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    /// Replace this document's fields in place, keeping the same `id` (a
    /// full replacement, not a merge).
    pub fn replace_fields(&mut self, mut fields: Map<String, Value>) {
        fields.insert("id".to_string(), Value::String(self.id.as_str().to_string()));
        self.fields = fields;
    }
}

/// A single or compound index definition (one entry of `IndexDefinition.indexes`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Ordered field list. Order is significant: `[a,b]` and `[b,a]` are
    /// distinct indexes.
    pub fields: Vec<String>,
    pub unique: bool,
    /// Whether a single-field unique index materializes its tag as the
    /// SHA-256 hash of the value rather than the reversible escape, for
    /// fields such as `email`/`username` whose natural values may collide
    /// after escaping or overflow the 256-byte tag limit. Meaningless for
    /// compound indexes.
    #[serde(default)]
    pub hashed: bool,
}

impl IndexSpec {
    /// The compound-index identifier used as the `indexes` map key:
    /// `fields.join('_')`.
    pub fn identifier(&self) -> String {
        self.fields.join("_")
    }
}

/// Per-collection index metadata, persisted as the well-known
/// `__collection_indexes` blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    pub indexed_fields: BTreeSet<String>,
    pub unique_fields: BTreeSet<String>,
    /// Subset of `unique_fields` materialized as SHA-256 hashes rather than
    /// the reversible escape.
    #[serde(default)]
    pub hashed_fields: BTreeSet<String>,
    pub indexes: BTreeMap<String, IndexSpec>,
    /// The server entity tag backing this catalog snapshot. Runtime-only:
    /// never persisted inside the JSON payload.
    #[serde(skip)]
    pub etag: Option<String>,
}

impl Default for IndexDefinition {
    fn default() -> Self {
        Self {
            indexed_fields: BTreeSet::new(),
            unique_fields: BTreeSet::new(),
            hashed_fields: BTreeSet::new(),
            indexes: BTreeMap::new(),
            etag: None,
        }
    }
}

/// Why a proposed catalog mutation would violate an invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogInvariantError {
    #[error("{field:?} is in uniqueFields but not indexedFields")]
    UniqueNotIndexed { field: String },
    #[error("indexedFields would contain {count} fields, exceeding the cap of {limit}")]
    TagCapExceeded { count: usize, limit: usize },
}

impl IndexDefinition {
    /// Validate the "unique fields are indexed" and tag-cap invariants
    /// against a proposed cap.
    pub fn check_invariants(&self, max_indexed_fields: usize) -> Result<(), CatalogInvariantError> {
        for field in &self.unique_fields {
            if !self.indexed_fields.contains(field) {
                return Err(CatalogInvariantError::UniqueNotIndexed {
                    field: field.clone(),
                });
            }
        }
        if self.indexed_fields.len() > max_indexed_fields {
            return Err(CatalogInvariantError::TagCapExceeded {
                count: self.indexed_fields.len(),
                limit: max_indexed_fields,
            });
        }
        Ok(())
    }

    /// Apply a `createIndex(collection, fields, { unique, hashed })`
    /// mutation in-place, idempotently.
    ///
    /// - Single-field `fields` updates that field's single-field projection
    ///   (adds it to `indexedFields`, and to `uniqueFields`/`hashedFields`
    ///   if `unique`/`hashed`).
    /// - Multi-field `fields` adds/updates a compound definition keyed by
    ///   the joined field names, and marks each constituent field indexed.
    ///   `hashed` is only meaningful for single-field indexes.
    pub fn apply_create_index(&mut self, fields: &[String], unique: bool, hashed: bool) {
        for field in fields {
            self.indexed_fields.insert(field.clone());
        }
        if fields.len() == 1 {
            let field = &fields[0];
            if unique {
                self.unique_fields.insert(field.clone());
                if hashed {
                    self.hashed_fields.insert(field.clone());
                }
            }
        }
        let spec = IndexSpec {
            fields: fields.to_vec(),
            unique,
            hashed: hashed && unique && fields.len() == 1,
        };
        self.indexes.insert(spec.identifier(), spec);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_field_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,8}"
    }

    proptest! {
        /// `apply_create_index` must be idempotent: applying the same
        /// mutation twice, for any field list/unique/hashed combination,
        /// leaves the catalog unchanged after the first application.
        #[test]
        fn apply_create_index_is_idempotent_for_any_input(
            fields in proptest::collection::btree_set(arb_field_name(), 1..5),
            unique: bool,
            hashed: bool,
        ) {
            let fields: Vec<String> = fields.into_iter().collect();
            let mut catalog = IndexDefinition::default();
            catalog.apply_create_index(&fields, unique, hashed);
            let snapshot = catalog.clone();
            catalog.apply_create_index(&fields, unique, hashed);
            prop_assert_eq!(catalog, snapshot);
        }

        /// Every field named in the mutation ends up in `indexedFields`,
        /// regardless of how many fields or what unique/hashed flags.
        #[test]
        fn apply_create_index_always_indexes_every_named_field(
            fields in proptest::collection::btree_set(arb_field_name(), 1..5),
            unique: bool,
            hashed: bool,
        ) {
            let fields: Vec<String> = fields.into_iter().collect();
            let mut catalog = IndexDefinition::default();
            catalog.apply_create_index(&fields, unique, hashed);
            for field in &fields {
                prop_assert!(catalog.indexed_fields.contains(field));
            }
        }
    }
}
