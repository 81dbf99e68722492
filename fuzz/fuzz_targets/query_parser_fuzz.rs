//! Fuzz test for the Tessera query parser.
//!
//! Feeds arbitrary bytes, reinterpreted as JSON, through `tessera_query::parse`
//! to find panics or non-terminating behavior on malformed predicates.
//!
//! Run with: cargo +nightly fuzz run query_parser_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(input) {
            // The parser must never panic, only return Ok or a
            // QueryError::Validation.
            let _ = tessera_query::parse(&value);
        }
    }
});
