//! Tessera Test Utils - Generators and Fixtures
//!
//! Proptest strategies for the Tessera data model plus a convenience
//! re-export of the in-memory [`ObjectStore`] reference implementation, so
//! downstream crates' test modules depend on one utility crate rather than
//! reaching into `tessera-storage`'s internals directly.

use serde_json::{Map, Value};
use tessera_core::{CollectionName, Document, DocumentId, IndexDefinition, IndexSpec};

pub use tessera_storage::InMemoryObjectStore;

/// Proptest strategies for generating Tessera entity types.
pub mod generators {
    use super::*;
    use proptest::collection::{btree_set, vec as pvec};
    use proptest::prelude::*;

    /// Generate a document id from a restricted alphabet, avoiding the
    /// blob-naming edge cases (empty names, `__`-prefixed system names)
    /// that are tested explicitly rather than fuzzed.
    pub fn arb_document_id() -> impl Strategy<Value = DocumentId> {
        "[a-z][a-z0-9]{2,15}".prop_map(DocumentId::from_raw)
    }

    /// Generate a raw collection name, pre-sanitization.
    pub fn arb_raw_collection_name() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9_ -]{0,40}"
    }

    /// Generate a sanitized [`CollectionName`].
    pub fn arb_collection_name() -> impl Strategy<Value = CollectionName> {
        arb_raw_collection_name().prop_map(|raw| CollectionName::sanitize(&raw))
    }

    /// Generate a field name drawn from the tag alphabet, used both as a
    /// document field and as an indexed field name.
    pub fn arb_field_name() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9_]{0,19}".prop_map(String::from)
    }

    /// Generate a JSON scalar that the tag codec can encode: a string
    /// within the tag-alphabet, a bounded integer, or a boolean. Excludes
    /// floats and nested structures, which `tessera_codec::encode` does
    /// not support.
    pub fn arb_tag_encodable_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            "[A-Za-z0-9 .\\-/:_]{1,32}".prop_map(Value::String),
            (-1_000_000i64..1_000_000i64).prop_map(|n| Value::Number(n.into())),
            any::<bool>().prop_map(Value::Bool),
        ]
    }

    /// Generate a document body: a handful of fields with tag-encodable
    /// values, keyed by distinct generated field names.
    pub fn arb_document_fields() -> impl Strategy<Value = Map<String, Value>> {
        pvec((arb_field_name(), arb_tag_encodable_value()), 0..6).prop_map(|pairs| {
            let mut map = Map::new();
            for (k, v) in pairs {
                map.insert(k, v);
            }
            map
        })
    }

    /// Generate a complete [`Document`] with a fresh id.
    pub fn arb_document() -> impl Strategy<Value = Document> {
        (arb_document_id(), arb_document_fields()).prop_map(|(id, fields)| Document::new(id, fields))
    }

    /// Generate a single-field [`IndexSpec`], unique and hashed flags
    /// independently chosen.
    pub fn arb_index_spec() -> impl Strategy<Value = IndexSpec> {
        (arb_field_name(), any::<bool>(), any::<bool>()).prop_map(|(field, unique, hashed)| {
            IndexSpec {
                fields: vec![field],
                unique,
                hashed: hashed && unique,
            }
        })
    }

    /// Generate a plausible [`IndexDefinition`] respecting the tag-cap
    /// invariant: at most `max_fields` indexed fields, with
    /// `uniqueFields`/`hashedFields` drawn from that set.
    pub fn arb_index_definition(max_fields: usize) -> impl Strategy<Value = IndexDefinition> {
        btree_set(arb_field_name(), 0..=max_fields).prop_flat_map(|fields| {
            let field_vec: Vec<String> = fields.iter().cloned().collect();
            let unique_strategy = if field_vec.is_empty() {
                Just(Vec::<String>::new()).boxed()
            } else {
                pvec(prop::sample::select(field_vec.clone()), 0..=field_vec.len())
                    .prop_map(|mut v| {
                        v.sort();
                        v.dedup();
                        v
                    })
                    .boxed()
            };
            (Just(field_vec), unique_strategy).prop_map(|(indexed, unique)| {
                let mut def = IndexDefinition::default();
                for field in &indexed {
                    def.indexed_fields.insert(field.clone());
                }
                for field in &unique {
                    def.apply_create_index(std::slice::from_ref(field), true, false);
                }
                def
            })
        })
    }
}
