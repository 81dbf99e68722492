//! Property tests over the generators in `tessera-test-utils`, exercising
//! the universally-quantified operator invariants against arbitrarily
//! generated document bodies rather than hand-picked examples.

use proptest::prelude::*;
use tessera_test_utils::generators::{arb_document_fields, arb_field_name, arb_tag_encodable_value};

proptest! {
    /// EQ semantics: a field's own value, fed back as an `$eq` query
    /// against the document it came from, must always match.
    #[test]
    fn eq_query_is_reflexive_for_any_present_field(
        field in arb_field_name(),
        value in arb_tag_encodable_value(),
    ) {
        let mut doc = serde_json::Map::new();
        doc.insert(field.clone(), value.clone());
        let query = tessera_query::parse(&serde_json::json!({ (field.clone()): value })).unwrap();
        prop_assert!(tessera_query::evaluate(&query, &doc));
    }

    /// Every operator besides `$nin` returns false against a field that is
    /// absent from the document entirely, regardless of what other
    /// tag-encodable fields the document carries.
    #[test]
    fn absent_field_never_satisfies_eq(
        present_fields in arb_document_fields(),
        probed_field in arb_field_name(),
        probed_value in arb_tag_encodable_value(),
    ) {
        prop_assume!(!present_fields.contains_key(&probed_field));
        let query = tessera_query::parse(&serde_json::json!({ (probed_field.clone()): probed_value })).unwrap();
        prop_assert!(!tessera_query::evaluate(&query, &present_fields));
    }

    /// `$between` is inclusive on both ends: using the same numeric value
    /// as the field, the low bound, and the high bound must always match.
    #[test]
    fn between_matches_when_value_equals_either_bound(n in -1_000_000i64..1_000_000i64) {
        let mut doc = serde_json::Map::new();
        doc.insert("n".to_string(), serde_json::json!(n));
        let at_low = tessera_query::parse(&serde_json::json!({"n": {"$between": [n, n + 1000]}})).unwrap();
        let at_high = tessera_query::parse(&serde_json::json!({"n": {"$between": [n - 1000, n]}})).unwrap();
        prop_assert!(tessera_query::evaluate(&at_low, &doc));
        prop_assert!(tessera_query::evaluate(&at_high, &doc));
    }
}
