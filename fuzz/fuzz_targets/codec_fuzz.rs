//! Fuzz test for the Tessera tag codec.
//!
//! This fuzz target tests `encode_reversible`/`decode_reversible` with
//! arbitrary byte sequences to find:
//! - Panics or crashes
//! - Round-trip failures for any valid UTF-8 string
//!
//! Run with: cargo +nightly fuzz run codec_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use tessera_codec::{decode_reversible, encode_reversible};

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let encoded = encode_reversible(input);

        // Every unescaped character the encoder can emit is in the tag
        // alphabet; `decode_reversible` must never panic on its own output.
        let decoded = decode_reversible(&encoded);
        assert_eq!(
            decoded.as_deref(),
            Ok(input),
            "round trip through encode_reversible/decode_reversible must be lossless"
        );

        // decode_reversible must never panic on arbitrary input either,
        // whether or not it was produced by the encoder.
        let _ = decode_reversible(input);
    }
});
